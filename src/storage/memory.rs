use std::time::Duration;
use chrono::Utc;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;
use crate::analysis::normalize::FacetKey;
use crate::core::error::{Error, Result};
use crate::core::stats::StoreStats;
use crate::core::types::{CollectionScope, Facet, FacetRecord};
use crate::storage::context::OpContext;
use crate::storage::table::FacetTable;
use crate::storage::{FacetQuery, FacetStore};

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Process-local facet store
pub struct MemoryFacetStore {
    table: RwLock<FacetTable>,
    lock_timeout: Duration,
}

impl MemoryFacetStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        MemoryFacetStore {
            table: RwLock::new(FacetTable::new()),
            lock_timeout,
        }
    }

    fn read(&self, ctx: &OpContext) -> Result<RwLockReadGuard<'_, FacetTable>> {
        ctx.check()?;
        self.table
            .try_read_until(ctx.lock_deadline(self.lock_timeout))
            .ok_or_else(|| Error::unavailable("timed out waiting for facet table read lock"))
    }

    fn write(&self, ctx: &OpContext) -> Result<RwLockWriteGuard<'_, FacetTable>> {
        ctx.check()?;
        self.table
            .try_write_until(ctx.lock_deadline(self.lock_timeout))
            .ok_or_else(|| Error::unavailable("timed out waiting for facet table write lock"))
    }
}

impl Default for MemoryFacetStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FacetStore for MemoryFacetStore {
    fn upsert(&self, record: &FacetRecord, ctx: &OpContext) -> Result<u64> {
        record.validate()?;
        let mut table = self.write(ctx)?;
        let upserted = table.upsert(record, Utc::now());
        debug!(id = %record.id, collection = %record.collection, counter = upserted.counter, created = upserted.created, "facet upserted");
        Ok(upserted.counter)
    }

    fn decrement(&self, id: &str, collection: &CollectionScope, ctx: &OpContext) -> Result<Option<u64>> {
        let key = FacetKey::new(id, collection.as_str());
        let mut table = self.write(ctx)?;
        let counter = table.decrement(&key);
        debug!(id, collection = %collection, counter = ?counter, "facet decremented");
        Ok(counter)
    }

    fn get(&self, id: &str, ctx: &OpContext) -> Result<Option<Facet>> {
        let table = self.read(ctx)?;
        Ok(table.get(id).cloned())
    }

    fn query(&self, query: &FacetQuery, ctx: &OpContext) -> Result<Vec<Facet>> {
        let table = self.read(ctx)?;
        Ok(table.query(query))
    }

    fn stats(&self) -> StoreStats {
        self.table.read().stats()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::storage::context::CancelToken;

    fn record(id: &str) -> FacetRecord {
        FacetRecord {
            id: id.to_string(),
            collection: CollectionScope::from("S2"),
            value: id.to_string(),
            facet_type: "platform".to_string(),
            parent_id: None,
            creator: Some("tester".to_string()),
            is_leaf: false,
        }
    }

    #[test]
    fn rejects_invalid_record_before_locking() {
        let store = MemoryFacetStore::new();
        let mut bad = record("x");
        bad.facet_type.clear();
        let err = store.upsert(&bad, &OpContext::background()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidRecord);
        assert_eq!(store.stats().rows, 0);
    }

    #[test]
    fn decrement_of_unknown_row_is_noop() {
        let store = MemoryFacetStore::new();
        let ctx = OpContext::background();
        assert_eq!(store.decrement("never", &CollectionScope::Global, &ctx).unwrap(), None);
        assert_eq!(store.stats().rows, 0);
    }

    #[test]
    fn cancelled_context_leaves_counters_untouched() {
        let store = MemoryFacetStore::new();
        store.upsert(&record("platform:spot"), &OpContext::background()).unwrap();

        let token = CancelToken::new();
        token.cancel();
        let ctx = OpContext::background().with_cancel(token);
        let err = store.upsert(&record("platform:spot"), &ctx).unwrap_err();
        assert_eq!(err.kind, ErrorKind::StoreUnavailable);

        let facet = store.get("platform:spot", &OpContext::background()).unwrap().unwrap();
        assert_eq!(facet.counter, 1);
    }

    #[test]
    fn write_lock_timeout_is_retryable() {
        let store = MemoryFacetStore::with_lock_timeout(Duration::from_millis(20));
        let _held = store.table.write();
        let err = store.upsert(&record("platform:spot"), &OpContext::background()).unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn concurrent_upserts_are_not_lost() {
        let store = Arc::new(MemoryFacetStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    let ctx = OpContext::background();
                    for _ in 0..250 {
                        store.upsert(&record("platform:spot"), &ctx).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let facet = store.get("platform:spot", &OpContext::background()).unwrap().unwrap();
        assert_eq!(facet.counter, 2000);
    }
}
