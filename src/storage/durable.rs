use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use chrono::Utc;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use crate::analysis::normalize::FacetKey;
use crate::core::error::{Error, Result};
use crate::core::stats::StoreStats;
use crate::core::types::{CollectionScope, Facet, FacetRecord};
use crate::storage::checkpoint::Checkpoint;
use crate::storage::context::OpContext;
use crate::storage::file_lock::FileLock;
use crate::storage::layout::StorageLayout;
use crate::storage::memory::DEFAULT_LOCK_TIMEOUT;
use crate::storage::table::FacetTable;
use crate::storage::wal::{Operation, SyncMode, WALEntry, WAL};
use crate::storage::{FacetQuery, FacetStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurableOptions {
    pub sync_mode: SyncMode,
    pub lock_timeout: Duration,
    /// Mutations between automatic checkpoints, 0 disables them
    pub checkpoint_interval: usize,
}

impl Default for DurableOptions {
    fn default() -> Self {
        DurableOptions {
            sync_mode: SyncMode::Batch,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            checkpoint_interval: 10_000,
        }
    }
}

struct DurableState {
    table: FacetTable,
    wal: WAL,
    ops_since_checkpoint: usize,
}

/// Facet store persisted as a checkpoint plus a write-ahead log.
///
/// Every mutation is appended to the log and applied to the table under the
/// same write lock; a failed append leaves the table untouched.
pub struct DurableFacetStore {
    state: RwLock<DurableState>,
    storage: StorageLayout,
    options: DurableOptions,
    _lock: FileLock,
}

impl DurableFacetStore {
    pub fn open(path: impl Into<PathBuf>, options: DurableOptions) -> Result<Self> {
        let storage = StorageLayout::new(path.into())?;
        let lock = FileLock::acquire(&storage)?;

        let (mut table, first_generation, mut next_lsn) = match Checkpoint::load(&storage)? {
            Some(checkpoint) => {
                info!(
                    rows = checkpoint.rows.len(),
                    taken_at = %checkpoint.timestamp,
                    "loaded facet checkpoint"
                );
                (FacetTable::from_rows(checkpoint.rows), checkpoint.wal_generation, checkpoint.next_lsn)
            }
            None => (FacetTable::new(), 0, 0),
        };

        let generations: Vec<u64> = WAL::find_wal_files(&storage)?
            .into_iter()
            .filter(|generation| *generation >= first_generation)
            .collect();

        let mut replayed = 0usize;
        for generation in &generations {
            for entry in WAL::read_entries(&storage.wal_path(*generation))? {
                if entry.lsn < next_lsn {
                    continue;
                }
                next_lsn = entry.lsn + 1;
                apply(&mut table, &entry);
                replayed += 1;
            }
        }

        // Never append behind a possibly torn tail: start a fresh generation.
        let generation = generations.last().map_or(first_generation, |last| last + 1);
        let wal = WAL::open(&storage, generation, next_lsn, options.sync_mode)?;

        info!(
            path = %storage.base_dir.display(),
            rows = table.len(),
            replayed,
            generation,
            "opened durable facet store"
        );

        Ok(DurableFacetStore {
            state: RwLock::new(DurableState {
                table,
                wal,
                ops_since_checkpoint: replayed,
            }),
            storage,
            options,
            _lock: lock,
        })
    }

    /// Fold the log into a new checkpoint and drop the covered log files.
    pub fn checkpoint(&self) -> Result<()> {
        let mut state = self.write(&OpContext::background())?;
        self.checkpoint_locked(&mut state)
    }

    /// Flush buffered log writes to disk.
    pub fn sync(&self) -> Result<()> {
        self.write(&OpContext::background())?.wal.sync()
    }

    /// The next log generation is opened before the checkpoint is written and
    /// only swapped in once the checkpoint is on disk, so a failed save leaves
    /// the current log in use and at most one empty log behind.
    fn checkpoint_locked(&self, state: &mut DurableState) -> Result<()> {
        let next = state.wal.open_next(&self.storage)?;

        let checkpoint = Checkpoint {
            wal_generation: next.generation,
            next_lsn: next.next_lsn,
            timestamp: Utc::now(),
            rows: state.table.rows().cloned().collect(),
        };
        checkpoint.save(&self.storage)?;
        state.wal = next;
        state.ops_since_checkpoint = 0;

        for generation in WAL::find_wal_files(&self.storage)? {
            if generation < checkpoint.wal_generation {
                fs::remove_file(self.storage.wal_path(generation))?;
            }
        }

        info!(rows = checkpoint.rows.len(), generation = checkpoint.wal_generation, "facet checkpoint written");
        Ok(())
    }

    /// Runs after a mutation has been applied, so a failure here must not be
    /// reported as a failed mutation. A failed attempt waits for another full
    /// interval before the next one.
    fn after_mutation(&self, state: &mut DurableState) {
        state.ops_since_checkpoint += 1;
        let interval = self.options.checkpoint_interval;
        if interval > 0 && state.ops_since_checkpoint >= interval {
            if let Err(e) = self.checkpoint_locked(state) {
                warn!(error = %e, "automatic facet checkpoint failed");
                state.ops_since_checkpoint = 0;
            }
        }
    }

    fn read(&self, ctx: &OpContext) -> Result<RwLockReadGuard<'_, DurableState>> {
        ctx.check()?;
        self.state
            .try_read_until(ctx.lock_deadline(self.options.lock_timeout))
            .ok_or_else(|| Error::unavailable("timed out waiting for facet store read lock"))
    }

    fn write(&self, ctx: &OpContext) -> Result<RwLockWriteGuard<'_, DurableState>> {
        ctx.check()?;
        self.state
            .try_write_until(ctx.lock_deadline(self.options.lock_timeout))
            .ok_or_else(|| Error::unavailable("timed out waiting for facet store write lock"))
    }
}

fn apply(table: &mut FacetTable, entry: &WALEntry) {
    match &entry.operation {
        Operation::Upsert(record) => {
            table.upsert(record, entry.timestamp);
        }
        Operation::Decrement { id, collection } => {
            table.decrement(&FacetKey::new(id, collection.as_str()));
        }
    }
}

impl FacetStore for DurableFacetStore {
    fn upsert(&self, record: &FacetRecord, ctx: &OpContext) -> Result<u64> {
        record.validate()?;
        let mut state = self.write(ctx)?;

        let entry = state.wal.append(Operation::Upsert(record.clone()))?;
        let upserted = state.table.upsert(record, entry.timestamp);
        debug!(id = %record.id, collection = %record.collection, counter = upserted.counter, created = upserted.created, lsn = entry.lsn, "facet upserted");

        self.after_mutation(&mut state);
        Ok(upserted.counter)
    }

    fn decrement(&self, id: &str, collection: &CollectionScope, ctx: &OpContext) -> Result<Option<u64>> {
        let key = FacetKey::new(id, collection.as_str());
        let mut state = self.write(ctx)?;

        // Absent rows and zero counters are left alone, nothing to log.
        match state.table.counter(&key) {
            None => return Ok(None),
            Some(0) => return Ok(Some(0)),
            Some(_) => {}
        }

        let entry = state.wal.append(Operation::Decrement {
            id: id.to_string(),
            collection: collection.clone(),
        })?;
        let counter = state.table.decrement(&key);
        debug!(id, collection = %collection, counter = ?counter, lsn = entry.lsn, "facet decremented");

        self.after_mutation(&mut state);
        Ok(counter)
    }

    fn get(&self, id: &str, ctx: &OpContext) -> Result<Option<Facet>> {
        let state = self.read(ctx)?;
        Ok(state.table.get(id).cloned())
    }

    fn query(&self, query: &FacetQuery, ctx: &OpContext) -> Result<Vec<Facet>> {
        let state = self.read(ctx)?;
        Ok(state.table.query(query))
    }

    fn stats(&self) -> StoreStats {
        let state = self.state.read();
        StoreStats {
            wal_generation: state.wal.generation,
            next_lsn: state.wal.next_lsn,
            ops_since_checkpoint: state.ops_since_checkpoint,
            ..state.table.stats()
        }
    }
}

impl Drop for DurableFacetStore {
    fn drop(&mut self) {
        if let Err(e) = self.state.get_mut().wal.sync() {
            warn!(error = %e, "failed to sync facet WAL on close");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    fn record(id: &str, collection: &str) -> FacetRecord {
        FacetRecord {
            id: id.to_string(),
            collection: CollectionScope::from(collection),
            value: id.rsplit(':').next().unwrap().to_string(),
            facet_type: "platform".to_string(),
            parent_id: None,
            creator: None,
            is_leaf: false,
        }
    }

    fn options() -> DurableOptions {
        DurableOptions {
            sync_mode: SyncMode::Immediate,
            checkpoint_interval: 0,
            ..DurableOptions::default()
        }
    }

    #[test]
    fn counters_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = OpContext::background();
        {
            let store = DurableFacetStore::open(dir.path(), options()).unwrap();
            store.upsert(&record("platform:spot", "S2"), &ctx).unwrap();
            store.upsert(&record("platform:spot", "S2"), &ctx).unwrap();
            store.upsert(&record("platform:spot", "S2"), &ctx).unwrap();
            store.decrement("platform:spot", &CollectionScope::from("S2"), &ctx).unwrap();
        }

        let store = DurableFacetStore::open(dir.path(), options()).unwrap();
        let facet = store.get("platform:spot", &ctx).unwrap().unwrap();
        assert_eq!(facet.counter, 2);
        assert_eq!(store.stats().next_lsn, 4);
    }

    #[test]
    fn checkpoint_plus_log_tail() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = OpContext::background();
        let created_at;
        {
            let store = DurableFacetStore::open(dir.path(), options()).unwrap();
            store.upsert(&record("platform:spot", "S2"), &ctx).unwrap();
            created_at = store.get("platform:spot", &ctx).unwrap().unwrap().created_at;
            store.checkpoint().unwrap();
            store.upsert(&record("platform:spot", "S2"), &ctx).unwrap();
            store.upsert(&record("platform:pleiades", "S2"), &ctx).unwrap();
        }

        let store = DurableFacetStore::open(dir.path(), options()).unwrap();
        let spot = store.get("platform:spot", &ctx).unwrap().unwrap();
        assert_eq!(spot.counter, 2);
        assert_eq!(spot.created_at, created_at);
        assert_eq!(store.get("platform:pleiades", &ctx).unwrap().unwrap().counter, 1);
        assert_eq!(store.stats().ops_since_checkpoint, 2);
    }

    #[test]
    fn automatic_checkpoint_removes_covered_logs() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = OpContext::background();
        let store = DurableFacetStore::open(dir.path(), DurableOptions {
            checkpoint_interval: 3,
            ..options()
        }).unwrap();
        for _ in 0..3 {
            store.upsert(&record("platform:spot", "S2"), &ctx).unwrap();
        }

        let storage = StorageLayout::new(dir.path().to_path_buf()).unwrap();
        assert!(storage.checkpoint_path().exists());
        assert_eq!(WAL::find_wal_files(&storage).unwrap(), vec![store.stats().wal_generation]);
        assert_eq!(store.stats().ops_since_checkpoint, 0);
    }

    #[test]
    fn decrement_without_row_logs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = OpContext::background();
        let store = DurableFacetStore::open(dir.path(), options()).unwrap();
        assert_eq!(store.decrement("ghost", &CollectionScope::Global, &ctx).unwrap(), None);
        assert_eq!(store.decrement("ghost", &CollectionScope::from("S2"), &ctx).unwrap(), None);
        let stats = store.stats();
        assert_eq!(stats.next_lsn, 0);
        assert_eq!(stats.ops_since_checkpoint, 0);

        let storage = StorageLayout::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(fs::metadata(storage.wal_path(stats.wal_generation)).unwrap().len(), 0);
    }

    #[test]
    fn second_open_of_same_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let _store = DurableFacetStore::open(dir.path(), options()).unwrap();
        let err = DurableFacetStore::open(dir.path(), options()).err().unwrap();
        assert_eq!(err.kind, ErrorKind::StoreUnavailable);
    }

    #[test]
    fn failing_checkpoint_keeps_log_files_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = OpContext::background();
        let storage = StorageLayout::new(dir.path().to_path_buf()).unwrap();
        // a directory in the way makes every checkpoint save fail
        fs::create_dir_all(storage.checkpoint_tmp_path()).unwrap();
        {
            let store = DurableFacetStore::open(dir.path(), DurableOptions {
                checkpoint_interval: 1,
                ..options()
            }).unwrap();
            for _ in 0..50 {
                store.upsert(&record("platform:spot", "S2"), &ctx).unwrap();
            }
            assert!(WAL::find_wal_files(&storage).unwrap().len() <= 2);
            assert!(!storage.checkpoint_path().exists());

            fs::remove_dir(storage.checkpoint_tmp_path()).unwrap();
            store.checkpoint().unwrap();
            assert_eq!(WAL::find_wal_files(&storage).unwrap(), vec![store.stats().wal_generation]);
        }

        let store = DurableFacetStore::open(dir.path(), options()).unwrap();
        assert_eq!(store.get("platform:spot", &ctx).unwrap().unwrap().counter, 50);
    }

    #[test]
    fn garbage_length_at_log_tail_still_opens() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = OpContext::background();
        let generation;
        {
            let store = DurableFacetStore::open(dir.path(), options()).unwrap();
            store.upsert(&record("platform:spot", "S2"), &ctx).unwrap();
            store.upsert(&record("platform:spot", "S2"), &ctx).unwrap();
            generation = store.stats().wal_generation;
        }

        let storage = StorageLayout::new(dir.path().to_path_buf()).unwrap();
        let mut file = fs::OpenOptions::new().append(true).open(storage.wal_path(generation)).unwrap();
        std::io::Write::write_all(&mut file, &[0xff; 8]).unwrap();
        drop(file);

        let store = DurableFacetStore::open(dir.path(), options()).unwrap();
        assert_eq!(store.get("platform:spot", &ctx).unwrap().unwrap().counter, 2);
        assert_eq!(store.stats().next_lsn, 2);
    }
}
