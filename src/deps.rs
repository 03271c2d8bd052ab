//! Dependency registry consulted when command sets are constructed.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{CommandError, Result};

struct Registered {
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

/// (type × key) → singleton table. Registration is write-once per pair.
#[derive(Default)]
pub struct Dependencies {
    table: HashMap<(TypeId, String), Registered>,
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.table.iter().map(|((_, key), r)| format!("{}[{key}]", r.type_name)))
            .finish()
    }
}

impl Dependencies {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `instance` under its type name.
    pub fn register<T: Any + Send + Sync>(&mut self, instance: T) -> Result<()> {
        self.register_arc(type_name::<T>(), Arc::new(instance))
    }

    /// Register `instance` under an explicit key.
    pub fn register_keyed<T: Any + Send + Sync>(&mut self, key: &str, instance: T) -> Result<()> {
        self.register_arc(key, Arc::new(instance))
    }

    /// Register an already shared instance. Fails if `(T, key)` is taken,
    /// leaving the existing registration in place.
    pub fn register_arc<T: Any + Send + Sync>(&mut self, key: &str, instance: Arc<T>) -> Result<()> {
        let slot = (TypeId::of::<T>(), key.to_string());
        if self.table.contains_key(&slot) {
            return Err(CommandError::DuplicateDependency {
                type_name: type_name::<T>().to_string(),
                key: key.to_string(),
            });
        }
        self.table.insert(
            slot,
            Registered {
                type_name: type_name::<T>(),
                value: instance,
            },
        );
        Ok(())
    }

    #[must_use]
    pub fn contains<T: Any + Send + Sync>(&self, key: &str) -> bool {
        self.table.contains_key(&(TypeId::of::<T>(), key.to_string()))
    }

    #[must_use]
    pub fn lookup<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.table
            .get(&(TypeId::of::<T>(), key.to_string()))
            .and_then(|r| Arc::clone(&r.value).downcast::<T>().ok())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Read-only view handed to a command set while it is being constructed.
/// Lookups that miss name the set being built.
pub struct Injector<'a> {
    deps: &'a Dependencies,
    target: &'a str,
}

impl<'a> Injector<'a> {
    #[must_use]
    pub const fn new(deps: &'a Dependencies, target: &'a str) -> Self {
        Self { deps, target }
    }

    #[must_use]
    pub const fn target(&self) -> &str {
        self.target
    }

    /// The instance registered under `T`'s type name.
    pub fn get<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        self.get_keyed(type_name::<T>())
    }

    /// The instance registered under `key`. An empty key means the type name.
    pub fn get_keyed<T: Any + Send + Sync>(&self, key: &str) -> Result<Arc<T>> {
        let key = if key.is_empty() { type_name::<T>() } else { key };
        self.deps
            .lookup::<T>(key)
            .ok_or_else(|| CommandError::MissingDependency {
                type_name: type_name::<T>().to_string(),
                key: key.to_string(),
                target: self.target.to_string(),
            })
    }
}
