// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! A bounded cache of compiled definitions, keyed by module.

use std::sync::{Arc, Mutex, PoisonError};

use kterm::hashmap::HashMap;
use kterm::rule::Definition;

/// Names a module whose definition is compiled at most once while cached.
pub type ModuleId = String;

/// Default number of definitions kept.
pub const DEFAULT_CAPACITY: usize = 20;

/// Keeps the most recently used compiled definitions. Once more than
/// `capacity` are cached, the least recently used one is dropped; sessions
/// still holding it are unaffected.
pub struct DefinitionRegistry {
    capacity: usize,
    /// ordered from least to most recently used
    cache: Mutex<HashMap<ModuleId, Arc<Definition>>>,
}

impl Default for DefinitionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl DefinitionRegistry {
    /// A registry holding at most `capacity` definitions (at least one).
    pub fn new(capacity: usize) -> Self {
        DefinitionRegistry {
            capacity: capacity.max(1),
            cache: Mutex::new(HashMap::default()),
        }
    }

    /// The cached definition of `module`, marking it as recently used.
    pub fn get(&self, module: &str) -> Option<Arc<Definition>> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let def = cache.shift_remove(module)?;
        cache.insert(module.to_string(), def.clone());
        Some(def)
    }

    /// The definition of `module`, compiling it with `compile` on a miss.
    /// Compilation happens under the registry lock, so concurrent requests
    /// for one module compile it once. A failed compilation caches nothing.
    pub fn get_or_compile<F, E>(&self, module: &str, compile: F) -> Result<Arc<Definition>, E>
    where
        F: FnOnce() -> Result<Definition, E>,
    {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(def) = cache.shift_remove(module) {
            log::debug!("definition cache hit for {module}");
            cache.insert(module.to_string(), def.clone());
            return Ok(def);
        }
        log::debug!("definition cache miss for {module}, compiling");
        let def = Arc::new(compile()?);
        cache.insert(module.to_string(), def.clone());
        while cache.len() > self.capacity {
            if let Some((evicted, _)) = cache.shift_remove_index(0) {
                log::debug!("evicted definition of {evicted}");
            }
        }
        Ok(def)
    }

    /// Number of cached definitions.
    pub fn len(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `module` is cached, without affecting recency.
    pub fn contains(&self, module: &str) -> bool {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kterm::sorts::{Signature, SortError};
    use std::cell::Cell;

    fn compile() -> Result<Definition, SortError> {
        Definition::new(Signature::with_builtins(), vec![])
    }

    #[test]
    fn test_compiles_once() {
        let registry = DefinitionRegistry::new(2);
        let calls = Cell::new(0);
        let counted = || {
            calls.set(calls.get() + 1);
            compile()
        };
        let a = registry.get_or_compile("a", counted).unwrap();
        let b = registry.get_or_compile("a", counted).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_lru_eviction() {
        let registry = DefinitionRegistry::new(2);
        registry.get_or_compile("a", compile).unwrap();
        registry.get_or_compile("b", compile).unwrap();
        // touching a makes b the least recently used
        assert!(registry.get("a").is_some());
        registry.get_or_compile("c", compile).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("a"));
        assert!(!registry.contains("b"));
        assert!(registry.contains("c"));
    }

    #[test]
    fn test_failed_compilation() {
        let registry = DefinitionRegistry::default();
        let result: Result<_, &str> = registry.get_or_compile("broken", || Err("parse error"));
        assert_eq!(result.err(), Some("parse error"));
        assert!(registry.is_empty());
    }
}
