use crate::{
    db::Store,
    error::{Error, ErrorClass, ErrorOrigin},
};
use parking_lot::{RwLock, const_rwlock};
use std::{collections::BTreeMap, sync::Arc};
use thiserror::Error as ThisError;

// Process-wide registry consulted by relationship resolution.
static GLOBAL: RwLock<StoreRegistry> = const_rwlock(StoreRegistry::new());

///
/// StoreRegistryError
///

#[derive(Debug, ThisError)]
pub enum StoreRegistryError {
    #[error("store for '{0}' not found")]
    StoreNotFound(String),

    #[error("store for '{0}' already registered")]
    StoreAlreadyRegistered(String),
}

impl StoreRegistryError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::StoreNotFound(_) => ErrorClass::NotFound,
            Self::StoreAlreadyRegistered(_) => ErrorClass::Config,
        }
    }
}

impl From<StoreRegistryError> for Error {
    fn from(err: StoreRegistryError) -> Self {
        Self::new(err.class(), ErrorOrigin::Store, err.to_string())
    }
}

///
/// StoreRegistry
///
/// Entity name → store. The process-wide instance backs [`register_store`]
/// and [`store_for`]; standalone instances are plain maps.
///

#[derive(Default)]
pub struct StoreRegistry {
    stores: BTreeMap<&'static str, Arc<dyn Store>>,
}

impl StoreRegistry {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stores: BTreeMap::new(),
        }
    }

    /// Registered entity names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.stores.keys().copied()
    }

    /// Register a store under its model's entity name.
    pub fn register_store(&mut self, store: Arc<dyn Store>) -> Result<(), Error> {
        let name = store.model().entity_name;
        if self.stores.contains_key(name) {
            return Err(StoreRegistryError::StoreAlreadyRegistered(name.to_string()).into());
        }

        self.stores.insert(name, store);
        Ok(())
    }

    /// Register a store, returning whichever one it displaced.
    pub fn replace_store(&mut self, store: Arc<dyn Store>) -> Option<Arc<dyn Store>> {
        self.stores.insert(store.model().entity_name, store)
    }

    pub fn remove_store(&mut self, entity_name: &str) -> Option<Arc<dyn Store>> {
        self.stores.remove(entity_name)
    }

    #[must_use]
    pub fn get_store(&self, entity_name: &str) -> Option<Arc<dyn Store>> {
        self.stores.get(entity_name).cloned()
    }

    pub fn try_get_store(&self, entity_name: &str) -> Result<Arc<dyn Store>, Error> {
        self.get_store(entity_name)
            .ok_or_else(|| StoreRegistryError::StoreNotFound(entity_name.to_string()).into())
    }
}

/// Make `store` the process-wide store for its model.
pub fn register_store(store: Arc<dyn Store>) -> Option<Arc<dyn Store>> {
    let name = store.model().entity_name;
    tracing::debug!(entity = name, "register store");

    GLOBAL.write().replace_store(store)
}

pub fn unregister_store(entity_name: &str) -> Option<Arc<dyn Store>> {
    GLOBAL.write().remove_store(entity_name)
}

/// Process-wide store for an entity name, if registered.
#[must_use]
pub fn store_for(entity_name: &str) -> Option<Arc<dyn Store>> {
    GLOBAL.read().get_store(entity_name)
}

///
/// TESTS
///
