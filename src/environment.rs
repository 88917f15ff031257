use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;

use crate::{
    diagnostics::{Diagnostic, ForgeError, Result},
    value::{Callable, Value},
};

pub type EnvironmentRef = Rc<RefCell<Environment>>;

/// One scope in the chain: variables and functions live in separate tables.
#[derive(Debug, Default)]
pub struct Environment {
    parent: Option<EnvironmentRef>,
    bindings: IndexMap<String, Value>,
    functions: IndexMap<String, Callable>,
}

impl Environment {
    pub fn new() -> EnvironmentRef {
        Rc::new(RefCell::new(Self::default()))
    }

    pub fn with_parent(parent: EnvironmentRef) -> EnvironmentRef {
        Rc::new(RefCell::new(Self {
            parent: Some(parent),
            bindings: IndexMap::new(),
            functions: IndexMap::new(),
        }))
    }

    /// Binds `name` in this scope regardless of outer declarations (parameters).
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn define_function(&mut self, name: impl Into<String>, callable: Callable) {
        self.functions.insert(name.into(), callable);
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn get(env: &EnvironmentRef, name: &str) -> Result<Value> {
        let mut current = Rc::clone(env);
        loop {
            let parent = {
                let scope = current.borrow();
                if let Some(value) = scope.bindings.get(name) {
                    return Ok(value.clone());
                }
                scope.parent.clone()
            };
            match parent {
                Some(parent) => current = parent,
                None => {
                    return Err(ForgeError::from(Diagnostic::name(format!(
                        "Variable \"{name}\" is not defined"
                    ))));
                }
            }
        }
    }

    /// Writes to the nearest scope that already declares `name`; otherwise
    /// declares it in `env` itself.
    pub fn set(env: &EnvironmentRef, name: &str, value: Value) {
        let owner = Self::owner_of(env, name).unwrap_or_else(|| Rc::clone(env));
        owner.borrow_mut().bindings.insert(name.to_string(), value);
    }

    pub fn has(env: &EnvironmentRef, name: &str) -> bool {
        Self::owner_of(env, name).is_some()
    }

    pub fn get_function(env: &EnvironmentRef, name: &str) -> Result<Callable> {
        let mut current = Rc::clone(env);
        loop {
            let parent = {
                let scope = current.borrow();
                if let Some(callable) = scope.functions.get(name) {
                    return Ok(callable.clone());
                }
                scope.parent.clone()
            };
            match parent {
                Some(parent) => current = parent,
                None => {
                    return Err(ForgeError::from(Diagnostic::name(format!(
                        "Function \"{name}\" is not defined"
                    ))));
                }
            }
        }
    }

    fn owner_of(env: &EnvironmentRef, name: &str) -> Option<EnvironmentRef> {
        let mut current = Rc::clone(env);
        loop {
            let parent = {
                let scope = current.borrow();
                if scope.bindings.contains_key(name) {
                    break;
                }
                scope.parent.clone()
            };
            current = parent?;
        }
        Some(current)
    }
}
