use crate::db::{
    mutation::RowKey,
    store::{Row, RowStore, RowWrite, StoreError, StoreOptions},
};
use parking_lot::{Mutex, RwLock};
use std::{collections::HashMap, sync::Arc, time::Duration};

type RowSlot = Arc<Mutex<Option<Row>>>;

///
/// MemoryRowStore
///
/// In-memory storage engine with one lock per row. The table map lock is
/// held only long enough to find or create a row slot; evaluation and the
/// write happen under the row's own mutex. Slots left empty by a skipped
/// write are released again.
///

#[derive(Debug, Default)]
pub struct MemoryRowStore {
    tables: RwLock<HashMap<String, HashMap<RowKey, RowSlot>>>,
    options: StoreOptions,
}

impl MemoryRowStore {
    #[must_use]
    pub fn new(options: StoreOptions) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            options,
        }
    }

    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        self.options.lock_timeout
    }

    /// Number of rows currently holding data in `table`.
    #[must_use]
    pub fn row_count(&self, table: &str) -> usize {
        let slots: Vec<RowSlot> = self
            .tables
            .read()
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default();

        slots.iter().filter(|slot| slot.lock().is_some()).count()
    }

    fn existing_slot(&self, table: &str, key: &RowKey) -> Option<RowSlot> {
        self.tables.read().get(table)?.get(key).cloned()
    }

    fn slot(&self, table: &str, key: &RowKey) -> RowSlot {
        if let Some(slot) = self.existing_slot(table, key) {
            return slot;
        }

        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .entry(key.clone())
            .or_default()
            .clone()
    }

    // Drop a slot that ended up holding no row. Clones are only handed out
    // under the table map lock, so a strong count of two (map plus caller)
    // means no other writer is waiting on it.
    fn release_empty_slot(&self, table: &str, key: &RowKey, slot: &RowSlot) {
        let mut tables = self.tables.write();
        let Some(rows) = tables.get_mut(table) else {
            return;
        };
        let unused = rows.get(key).is_some_and(|current| {
            Arc::ptr_eq(current, slot)
                && Arc::strong_count(slot) == 2
                && slot.try_lock().is_some_and(|guard| guard.is_none())
        });

        if unused {
            rows.remove(key);
            if rows.is_empty() {
                tables.remove(table);
            }
        }
    }

    #[cfg(test)]
    pub(in crate::db::store) fn slot_count(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, HashMap::len)
    }

    fn timeout_error(&self, table: &str, key: &RowKey) -> StoreError {
        StoreError::LockTimeout {
            table: table.to_string(),
            key: key.clone(),
            waited_ms: u64::try_from(self.options.lock_timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl RowStore for MemoryRowStore {
    fn read(&self, table: &str, key: &RowKey) -> Result<Option<Row>, StoreError> {
        let Some(slot) = self.existing_slot(table, key) else {
            return Ok(None);
        };

        let guard = slot
            .try_lock_for(self.options.lock_timeout)
            .ok_or_else(|| self.timeout_error(table, key))?;

        Ok(guard.clone())
    }

    fn apply_if<T, F>(&self, table: &str, key: &RowKey, decide: F) -> Result<T, StoreError>
    where
        F: FnOnce(Option<&Row>) -> (RowWrite, T),
    {
        let slot = self.slot(table, key);
        let mut guard = slot
            .try_lock_for(self.options.lock_timeout)
            .ok_or_else(|| self.timeout_error(table, key))?;

        let (write, out) = decide(guard.as_ref());
        let empty = match write {
            RowWrite::Put(row) => {
                *guard = Some(row);
                false
            }
            RowWrite::Keep => guard.is_none(),
        };
        drop(guard);

        if empty {
            self.release_empty_slot(table, key, &slot);
        }

        Ok(out)
    }
}
