//! Mapper instances behind opaque handles.
//!
//! This is the layer a foreign-call boundary talks to: it passes JSON and
//! strings in, gets a single result or error back, and refers to mappers by
//! [`Handle`]. Handles are never reused within one registry.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use log::info;

use crate::{
    config::ConfigurationError,
    context::Context,
    error::{Error, Result},
    mapper::Mapper,
    tracker::QueryInfo,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub u64);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub struct Registry {
    next: AtomicU64,
    instances: Mutex<HashMap<Handle, Arc<RwLock<Mapper>>>>,
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            next: AtomicU64::new(1),
            instances: Mutex::new(HashMap::new()),
        }
    }

    fn instances(&self) -> MutexGuard<'_, HashMap<Handle, Arc<RwLock<Mapper>>>> {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn get(&self, handle: Handle) -> Result<Arc<RwLock<Mapper>>> {
        self.instances()
            .get(&handle)
            .cloned()
            .ok_or(Error::InstanceNotFound(handle))
    }

    fn insert(&self, mapper: Mapper) -> Handle {
        let handle = Handle(self.next.fetch_add(1, Ordering::Relaxed));
        self.instances()
            .insert(handle, Arc::new(RwLock::new(mapper)));
        info!("created mapper instance {handle}");
        handle
    }

    pub fn create(&self) -> Handle {
        self.insert(Mapper::new())
    }

    /// Nothing is registered when the configuration is invalid.
    pub fn create_with_config(&self, json: &str) -> Result<Handle> {
        let mapper = Mapper::from_json(json)?;
        Ok(self.insert(mapper))
    }

    pub fn free(&self, handle: Handle) -> Result<()> {
        match self.instances().remove(&handle) {
            Some(_) => {
                info!("freed mapper instance {handle}");
                Ok(())
            }
            None => Err(Error::InstanceNotFound(handle)),
        }
    }

    pub fn len(&self) -> usize {
        self.instances().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn load_mappings(&self, handle: Handle, json: &str) -> Result<()> {
        let mapper = self.get(handle)?;
        let mut mapper = mapper.write().unwrap_or_else(PoisonError::into_inner);
        mapper.load_mappings_json(json)
    }

    pub fn map_query(&self, handle: Handle, query: &str) -> Result<String> {
        let mapper = self.get(handle)?;
        let mapper = mapper.read().unwrap_or_else(PoisonError::into_inner);
        mapper.map_query(query)
    }

    /// `context_json` is a JSON object of context values; an invalid one is
    /// reported as a configuration error.
    pub fn map_query_with_context(
        &self,
        handle: Handle,
        query: &str,
        context_json: &str,
    ) -> Result<String> {
        let context = Context::from_json(context_json)
            .map_err(|err| Error::Configuration(ConfigurationError::Json(err.to_string())))?;
        let mapper = self.get(handle)?;
        let mapper = mapper.read().unwrap_or_else(PoisonError::into_inner);
        mapper.map_query_with_context(query, &context)
    }

    pub fn discover_query(&self, handle: Handle, query: &str) -> Result<QueryInfo> {
        let mapper = self.get(handle)?;
        let mapper = mapper.read().unwrap_or_else(PoisonError::into_inner);
        mapper.discover_query(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_not_reused() {
        let registry = Registry::new();
        let first = registry.create();
        registry.free(first).unwrap();
        let second = registry.create();
        assert_ne!(first, second);
        assert_eq!(
            registry.map_query(first, "search a=1"),
            Err(Error::InstanceNotFound(first))
        );
    }

    #[test]
    fn invalid_config_registers_nothing() {
        let registry = Registry::new();
        assert!(registry.create_with_config(r#"{"version": ""}"#).is_err());
        assert!(registry.is_empty());
    }
}
