//! TOML configuration for store construction and key normalization.
//!
//! ```toml
//! [store]
//! backend = "sqlite"      # or "memory"
//! path = "data/food.db"   # omitted: in-memory database
//!
//! [validation]
//! strict_relationships = true
//!
//! [uuid]
//! allow_none = true
//! allow_empty = true
//! ```
//!
//! Every table and key is optional.

use crate::{
    db::{MemoryStore, SqliteStore, Store},
    error::Error,
    model::EntityModel,
    types::uuid::UuidOptions,
};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

///
/// Config
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub store: StoreConfig,
    pub validation: ValidationConfig,
    pub uuid: UuidConfig,
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;

        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| Error::config(format!("cannot read {}: {err}", path.display())))?;

        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), Error> {
        if let Some(path) = &self.store.path {
            if self.store.backend == Backend::Memory {
                return Err(Error::config("store.path is only valid for the sqlite backend"));
            }
            if path.as_os_str().is_empty() {
                return Err(Error::config("store.path must not be empty"));
            }
        }

        Ok(())
    }

    /// Primary-key normalization switches.
    #[must_use]
    pub const fn uuid_options(&self) -> UuidOptions {
        UuidOptions {
            allow_none: self.uuid.allow_none,
            allow_empty: self.uuid.allow_empty,
            raise_on_error: true,
        }
    }

    /// Reject models that relax relationship checks when strictness is
    /// required.
    pub fn check_model(&self, model: &EntityModel) -> Result<(), Error> {
        if self.validation.strict_relationships && !model.strict {
            return Err(Error::config(format!(
                "{} disables strict relationship checks",
                model.entity_name
            )));
        }

        Ok(())
    }

    /// Open the configured backend for `model`.
    pub fn open_store(&self, model: &'static EntityModel) -> Result<Arc<dyn Store>, Error> {
        self.check_model(model)?;

        let store: Arc<dyn Store> = match (self.store.backend, &self.store.path) {
            (Backend::Memory, _) => {
                Arc::new(MemoryStore::new(model).with_uuid_options(self.uuid_options()))
            }
            (Backend::Sqlite, Some(path)) => {
                Arc::new(SqliteStore::open(path, model)?.with_uuid_options(self.uuid_options()))
            }
            (Backend::Sqlite, None) => Arc::new(
                SqliteStore::open_in_memory(model)?.with_uuid_options(self.uuid_options()),
            ),
        };
        tracing::debug!(entity = model.entity_name, backend = ?self.store.backend, "opened store");

        Ok(store)
    }
}

///
/// Backend
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Memory,
    Sqlite,
}

///
/// StoreConfig
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub backend: Backend,
    pub path: Option<PathBuf>,
}

///
/// ValidationConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationConfig {
    pub strict_relationships: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            strict_relationships: true,
        }
    }
}

///
/// UuidConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct UuidConfig {
    pub allow_none: bool,
    pub allow_empty: bool,
}

impl Default for UuidConfig {
    fn default() -> Self {
        Self {
            allow_none: true,
            allow_empty: true,
        }
    }
}

///
/// TESTS
///
