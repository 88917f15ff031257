//! Resolution of `load from <folder> <target>` directives.
//!
//! The executor only sees [`ModuleSource`] values: parsed statements to run
//! in the current environment, or host-provided bindings to merge into it.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use tracing::debug;

use crate::{
    ast::{LoadTarget, Stmt},
    diagnostics::{Diagnostic, ForgeError, Result},
    parser,
    value::{NativeFunction, Value},
};

pub const SCRIPT_EXTENSION: &str = "forge";

/// Bindings exported by a host library.
#[derive(Clone, Default)]
pub struct NativeModule {
    pub functions: Vec<NativeFunction>,
    pub values: IndexMap<String, Value>,
}

impl NativeModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn function(mut self, function: NativeFunction) -> Self {
        self.functions.push(function);
        self
    }

    pub fn value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.insert(name.into(), value);
        self
    }
}

pub enum ModuleSource {
    Script { path: PathBuf, statements: Vec<Stmt> },
    Native { name: String, module: NativeModule },
}

pub trait ModuleLoader {
    fn resolve(&self, folder: &str, target: &LoadTarget) -> Result<Vec<ModuleSource>>;
}

/// Reads `.forge` files below `root` and serves host libraries registered
/// under `<folder>/<file>`.
pub struct FsModuleLoader {
    root: PathBuf,
    natives: IndexMap<String, IndexMap<String, NativeModule>>,
}

impl FsModuleLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            natives: IndexMap::new(),
        }
    }

    pub fn register_native(
        &mut self,
        folder: impl Into<String>,
        file: impl Into<String>,
        module: NativeModule,
    ) {
        self.natives
            .entry(folder.into())
            .or_default()
            .insert(file.into(), module);
    }

    fn load_file(&self, folder: &str, dir: &Path, file: &str) -> Result<ModuleSource> {
        if let Some(module) = self.natives.get(folder).and_then(|files| files.get(file)) {
            return Ok(ModuleSource::Native {
                name: format!("{folder}/{file}"),
                module: module.clone(),
            });
        }
        let path = dir.join(file);
        if !path.is_file() {
            return Err(Diagnostic::io(format!("File \"{}\" not found", path.display())).into());
        }
        if !has_script_extension(file) {
            return Err(Diagnostic::io(format!("Unsupported file type: \"{file}\"")).into());
        }
        let source = fs::read_to_string(&path).map_err(|err| io_error(&path, err))?;
        let statements = parser::parse_program(&source).map_err(|diag| {
            ForgeError::from(diag.with_note(format!("in module `{}`", path.display())))
        })?;
        Ok(ModuleSource::Script { path, statements })
    }
}

impl ModuleLoader for FsModuleLoader {
    fn resolve(&self, folder: &str, target: &LoadTarget) -> Result<Vec<ModuleSource>> {
        let dir = self.root.join(folder);
        let natives = self.natives.get(folder);
        let on_disk = dir.is_dir();
        if !on_disk && natives.is_none() {
            return Err(Diagnostic::io(format!("Module folder \"{folder}\" not found")).into());
        }

        let files = match target {
            LoadTarget::File(file) => vec![file.clone()],
            LoadTarget::All => {
                let mut files = if on_disk {
                    collect_script_files(&dir)?
                } else {
                    Vec::new()
                };
                if let Some(natives) = natives {
                    files.extend(natives.keys().cloned());
                }
                files.sort();
                files.dedup();
                files
            }
        };
        debug!(folder, ?files, "resolving module inclusion");
        files
            .iter()
            .map(|file| self.load_file(folder, &dir, file))
            .collect()
    }
}

fn collect_script_files(dir: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|err| io_error(dir, err))? {
        let entry = entry.map_err(|err| io_error(dir, err))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.path().is_file() && has_script_extension(&name) {
            files.push(name);
        }
    }
    Ok(files)
}

fn has_script_extension(file: &str) -> bool {
    Path::new(file).extension().and_then(|ext| ext.to_str()) == Some(SCRIPT_EXTENSION)
}

fn io_error(path: &Path, err: io::Error) -> ForgeError {
    let mut diagnostic = Diagnostic::io(format!("`load` failed for `{}`: {err}", path.display()));
    if let Some(code) = err.raw_os_error() {
        diagnostic = diagnostic.with_note(format!("os error code: {code}"));
    }
    ForgeError::from(diagnostic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticKind;
    use tempfile::tempdir;

    fn names(sources: &[ModuleSource]) -> Vec<String> {
        sources
            .iter()
            .map(|source| match source {
                ModuleSource::Script { path, .. } => path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                ModuleSource::Native { name, .. } => name.clone(),
            })
            .collect()
    }

    #[test]
    fn all_merges_disk_scripts_and_natives_in_name_order() {
        let dir = tempdir().unwrap();
        let libs = dir.path().join("libs");
        fs::create_dir_all(&libs).unwrap();
        fs::write(libs.join("b.forge"), "y = 2\n").unwrap();
        fs::write(libs.join("a.forge"), "x = 1\n").unwrap();
        fs::write(libs.join("notes.txt"), "ignored").unwrap();

        let mut loader = FsModuleLoader::new(dir.path());
        loader.register_native("libs", "ab.host", NativeModule::new());
        let sources = loader.resolve("libs", &LoadTarget::All).unwrap();
        assert_eq!(names(&sources), vec!["a.forge", "libs/ab.host", "b.forge"]);
    }

    #[test]
    fn missing_folder_is_an_io_error() {
        let dir = tempdir().unwrap();
        let loader = FsModuleLoader::new(dir.path());
        let err = loader
            .resolve("nowhere", &LoadTarget::All)
            .err()
            .expect("missing folder must fail");
        assert_eq!(err.kind(), DiagnosticKind::Io);
        assert!(err.to_string().contains("Module folder \"nowhere\" not found"));
    }

    #[test]
    fn missing_and_unsupported_files() {
        let dir = tempdir().unwrap();
        let libs = dir.path().join("libs");
        fs::create_dir_all(&libs).unwrap();
        fs::write(libs.join("data.txt"), "x").unwrap();
        let loader = FsModuleLoader::new(dir.path());

        let missing = loader
            .resolve("libs", &LoadTarget::File("gone.forge".into()))
            .err()
            .expect("missing file must fail");
        assert!(missing.to_string().contains("gone.forge"));

        let unsupported = loader
            .resolve("libs", &LoadTarget::File("data.txt".into()))
            .err()
            .expect("unsupported file must fail");
        assert!(unsupported.to_string().contains("Unsupported file type"));
    }

    #[test]
    fn parse_errors_name_the_module() {
        let dir = tempdir().unwrap();
        let libs = dir.path().join("libs");
        fs::create_dir_all(&libs).unwrap();
        fs::write(libs.join("bad.forge"), "x = 1\nnonsense here\n").unwrap();
        let loader = FsModuleLoader::new(dir.path());
        let err = loader
            .resolve("libs", &LoadTarget::File("bad.forge".into()))
            .err()
            .expect("bad module must fail");
        assert_eq!(err.kind(), DiagnosticKind::Parse);
        assert_eq!(err.line(), Some(2));
        assert!(err.to_string().contains("bad.forge"));
    }
}
