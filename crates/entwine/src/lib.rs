//! ## Crate layout
//! - `core`: schema descriptors, values, entities, the transformer, record
//!   filtering, stores, permission middleware and observability.
//!
//! The `prelude` module carries the vocabulary needed to declare models and
//! move entities through a store.

pub use entwine_core as core;

pub use entwine_core::{
    config::Config,
    error::{Error, ErrorClass, ErrorOrigin},
};

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
///

pub mod prelude {
    pub use entwine_core::prelude::*;
}
