//! ## Crate layout
//! - `config`: TOML configuration (`CasdbConfig`).
//! - `core`: values, predicate trees, the predicate wire codec, conditional
//!   mutations, the apply executor, storage boundary, and observability.
//! - `error`: public error type for callers and process boundaries.
//!
//! The `prelude` module carries the vocabulary needed to declare tables,
//! build upsert statements with guards, and inspect outcomes.

pub use casdb_config as config;
pub use casdb_core as core;

pub mod error;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use error::Error;

use casdb_config::CasdbConfig;
use casdb_core::db::{DbSession, store::MemoryRowStore};
use std::path::Path;

/// Session over the in-memory reference storage engine.
pub type MemorySession = DbSession<MemoryRowStore>;

/// Open an in-memory session configured from `config`.
pub fn open_in_memory(config: &CasdbConfig) -> Result<MemorySession, Error> {
    Ok(DbSession::in_memory(config)?)
}

/// Load a TOML configuration file and open an in-memory session with it.
pub fn open_in_memory_from_file(path: impl AsRef<Path>) -> Result<MemorySession, Error> {
    let config = CasdbConfig::load(path).map_err(casdb_core::error::InternalError::from)?;

    open_in_memory(&config)
}

///
/// Prelude
///

pub mod prelude {
    pub use crate::{
        Error, MemorySession,
        core::{
            db::{DbSession, executor::ApplyOutcome, store::Row},
            prelude::*,
        },
    };
}
