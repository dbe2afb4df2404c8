mod memory;


use crate::{
    db::{
        mutation::RowKey,
        predicate::{FieldPresence, RowState},
    },
    error::InternalError,
    value::Value,
};
use casdb_config::{DEFAULT_LOCK_TIMEOUT_MS, StoreConfig};
use derive_more::Deref;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, time::Duration};
use thiserror::Error as ThisError;

// re-exports
pub use memory::MemoryRowStore;

///
/// StoreError
///
/// Storage-engine failures. All of them are transient: the caller may
/// resubmit the original mutation unchanged.
///

#[derive(Debug, ThisError)]
pub enum StoreError {
    #[error("row lock on {table}/{key} not acquired within {waited_ms}ms")]
    LockTimeout {
        table: String,
        key: RowKey,
        waited_ms: u64,
    },

    #[error("storage unavailable: {message}")]
    Unavailable { message: String },
}

impl StoreError {
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout { .. } | Self::Unavailable { .. })
    }
}

impl From<StoreError> for InternalError {
    fn from(err: StoreError) -> Self {
        Self::store_unavailable(err.to_string())
    }
}

///
/// Row
///
/// Current column values of one stored row. Columns that were never written
/// and columns that were cleared with NULL are both simply absent.
///

#[derive(Clone, Debug, Default, Deref, Deserialize, Eq, PartialEq, Serialize)]
pub struct Row(BTreeMap<String, Value>);

impl Row {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Overlay column writes onto this row. A NULL write clears the column.
    pub fn merge<'a>(&mut self, values: impl IntoIterator<Item = (&'a String, &'a Value)>) {
        for (column, value) in values {
            if value.is_null() {
                self.0.remove(column);
            } else {
                self.0.insert(column.clone(), value.clone());
            }
        }
    }

    /// Copy of `current` (or an empty row) with `values` merged in.
    #[must_use]
    pub fn merged<'a>(
        current: Option<&Self>,
        values: impl IntoIterator<Item = (&'a String, &'a Value)>,
    ) -> Self {
        let mut row = current.cloned().unwrap_or_default();
        row.merge(values);
        row
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Self::new();
        for (column, value) in iter {
            let value = value.into();
            if !value.is_null() {
                row.0.insert(column.into(), value);
            }
        }
        row
    }
}

impl RowState for Row {
    fn field(&self, column: &str) -> FieldPresence<'_> {
        self.0
            .get(column)
            .map_or(FieldPresence::Missing, FieldPresence::Present)
    }
}

///
/// RowWrite
///
/// Decision returned from inside the row lock.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RowWrite {
    Keep,
    Put(Row),
}

///
/// RowStore
///
/// Storage-engine boundary used by the apply site.
///
/// `apply_if` must run `decide` while holding an exclusive lock on that row
/// and install the returned image before releasing it, so read-evaluate-write
/// is atomic with respect to every other `apply_if` on the same row. Distinct
/// rows must not serialize on each other.
///

pub trait RowStore: Send + Sync {
    fn read(&self, table: &str, key: &RowKey) -> Result<Option<Row>, StoreError>;

    fn apply_if<T, F>(&self, table: &str, key: &RowKey, decide: F) -> Result<T, StoreError>
    where
        F: FnOnce(Option<&Row>) -> (RowWrite, T);
}

///
/// StoreOptions
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StoreOptions {
    pub lock_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
        }
    }
}

impl From<&StoreConfig> for StoreOptions {
    fn from(config: &StoreConfig) -> Self {
        Self {
            lock_timeout: Duration::from_millis(config.lock_timeout_ms),
        }
    }
}
