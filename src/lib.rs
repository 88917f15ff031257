//! Core library for the Forge scripting language: indentation block parsing,
//! statement classification, and an asynchronous tree-walking executor.

pub mod ast;
pub mod block;
pub mod diagnostics;
pub mod environment;
pub mod lexer;
pub mod loader;
pub mod parser;
pub mod runtime;
pub mod stdlib;
pub mod value;

pub use diagnostics::{Diagnostic, DiagnosticKind, ForgeError};
pub use loader::{FsModuleLoader, ModuleLoader, NativeModule};
pub use runtime::{ExecutionContext, Interpreter, OutputBuffer};
pub use value::{NativeFunction, Value};
