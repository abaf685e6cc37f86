use std::{collections::HashMap, fmt, sync::Arc};

use crate::{Error, Result};

use super::builtin;

/// An assertion function: `actual` is the value at the assertion's path, `args` the
/// evaluated arguments. `Err` carries the failure reason shown to the user.
pub trait Function: Send + Sync {
    fn call(&self, actual: &serde_json::Value, args: &[serde_json::Value]) -> std::result::Result<(), String>;
}

impl<F> Function for F
where
    F: Fn(&serde_json::Value, &[serde_json::Value]) -> std::result::Result<(), String> + Send + Sync,
{
    fn call(&self, actual: &serde_json::Value, args: &[serde_json::Value]) -> std::result::Result<(), String> {
        self(actual, args)
    }
}

/// Name-keyed assertion functions. Built once at startup, then shared read-only.
#[derive(Clone, Default)]
pub struct Registry {
    functions: HashMap<String, Arc<dyn Function>>,
}

impl Registry {
    /// Empty registry.
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Registry holding `eq`, `ne`, `gt`, `gte`, `lt`, `lte`, `is`, `has` and `len`.
    pub fn with_builtins() -> Result<Registry> {
        let mut registry = Registry::new();
        builtin::install(&mut registry)?;
        Ok(registry)
    }

    /// Register `function` under `name`. Registering a name twice is an error.
    pub fn register(&mut self, name: impl Into<String>, function: impl Function + 'static) -> Result<()> {
        let name = name.into();
        if self.functions.contains_key(&name) {
            return Err(Error::DuplicateFunction(name));
        }
        self.functions.insert(name, Arc::new(function));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Function> {
        self.functions.get(name).map(|f| f.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.functions.keys().collect::<Vec<_>>();
        names.sort();
        f.debug_struct("Registry").field("functions", &names).finish()
    }
}
