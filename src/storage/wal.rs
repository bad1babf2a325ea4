use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{CollectionScope, FacetRecord};
use crate::storage::layout::StorageLayout;

/// Frame header: payload length then CRC32 of the payload
const HEADER_LEN: usize = 8;

/// 10MB max per entry
const MAX_ENTRY_LEN: usize = 10_000_000;

/// Unsynced bytes tolerated in `SyncMode::Batch`
const BATCH_SYNC_BYTES: u64 = 1024 * 1024;

/// Write-ahead log of counter mutations
pub struct WAL {
    pub file: File,
    pub position: u64,
    pub sync_mode: SyncMode,
    pub generation: u64,
    pub next_lsn: u64,
    unsynced_bytes: u64,
    poisoned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    Immediate,  // fsync after every write
    Batch,      // fsync once per BATCH_SYNC_BYTES
    None,       // Let OS handle it
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WALEntry {
    pub lsn: u64,
    pub operation: Operation,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    Upsert(FacetRecord),
    Decrement { id: String, collection: CollectionScope },
}

impl WAL {
    pub fn open(storage: &StorageLayout, generation: u64, next_lsn: u64, sync_mode: SyncMode) -> Result<Self> {
        let path = storage.wal_path(generation);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        let position = file.metadata()?.len();

        Ok(WAL {
            file,
            position,
            sync_mode,
            generation,
            next_lsn,
            unsynced_bytes: 0,
            poisoned: false,
        })
    }

    /// Append one operation.
    ///
    /// If the write or its sync fails, the file is cut back to the last
    /// complete entry and `next_lsn` is restored, so a failed append never
    /// shows up on replay. A log that cannot be cut back refuses further
    /// appends.
    pub fn append(&mut self, operation: Operation) -> Result<WALEntry> {
        if self.poisoned {
            return Err(Error::new(ErrorKind::Internal, format!(
                "WAL generation {} holds an incomplete entry", self.generation
            )));
        }

        let entry = WALEntry {
            lsn: self.next_lsn,
            operation,
            timestamp: Utc::now(),
        };

        let data = bincode::serialize(&entry)?;
        let mut frame = Vec::with_capacity(HEADER_LEN + data.len());
        frame.extend_from_slice(&(data.len() as u32).to_le_bytes());
        frame.extend_from_slice(&crc32fast::hash(&data).to_le_bytes());
        frame.extend_from_slice(&data);

        let start_position = self.position;
        let start_lsn = self.next_lsn;

        if let Err(e) = self.file.write_all(&frame) {
            self.discard_from(start_position, start_lsn)?;
            return Err(Error::unavailable(format!("WAL append failed: {}", e)));
        }

        self.next_lsn += 1;
        self.position += frame.len() as u64;
        self.unsynced_bytes += frame.len() as u64;

        let synced = match self.sync_mode {
            SyncMode::Immediate => self.sync(),
            SyncMode::Batch if self.unsynced_bytes >= BATCH_SYNC_BYTES => self.sync(),
            _ => Ok(()),
        };
        if let Err(e) = synced {
            self.discard_from(start_position, start_lsn)?;
            return Err(Error::unavailable(format!("WAL sync failed: {}", e)));
        }

        Ok(entry)
    }

    /// Drop everything written at or after `position` and rewind the LSN.
    fn discard_from(&mut self, position: u64, lsn: u64) -> Result<()> {
        if let Err(e) = self.file.set_len(position) {
            self.poisoned = true;
            return Err(Error::new(ErrorKind::Internal, format!(
                "failed to roll back WAL generation {} to offset {}: {}",
                self.generation, position, e
            )));
        }
        self.unsynced_bytes = self.unsynced_bytes.saturating_sub(self.position.saturating_sub(position));
        self.position = position;
        self.next_lsn = lsn;
        Ok(())
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        self.unsynced_bytes = 0;
        Ok(())
    }

    /// Sync this log and open the following generation, continuing the LSN
    /// sequence. The current log stays in place until the caller swaps the
    /// returned one in; opening an existing empty file is harmless, so a
    /// retried attempt reuses it.
    pub fn open_next(&mut self, storage: &StorageLayout) -> Result<WAL> {
        self.sync()?;
        WAL::open(storage, self.generation + 1, self.next_lsn, self.sync_mode)
    }

    /// Read all intact entries of one log file.
    ///
    /// A torn tail stops the scan; entries failing their checksum are skipped.
    pub fn read_entries(path: &Path) -> Result<Vec<WALEntry>> {
        let bytes = fs::read(path)?;
        let mut entries = Vec::new();
        let mut offset = 0;

        while offset < bytes.len() {
            if bytes.len() - offset < HEADER_LEN {
                warn!(path = %path.display(), offset, "truncated WAL header, ignoring tail");
                break;
            }

            let len = u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]]) as usize;
            let crc = u32::from_le_bytes([bytes[offset + 4], bytes[offset + 5], bytes[offset + 6], bytes[offset + 7]]);

            let start = offset + HEADER_LEN;
            let end = start + len;
            if len > MAX_ENTRY_LEN || end > bytes.len() {
                warn!(path = %path.display(), offset, "truncated WAL entry, ignoring tail");
                break;
            }
            offset = end;

            let data = &bytes[start..end];
            if crc32fast::hash(data) != crc {
                warn!(path = %path.display(), offset = start, "WAL entry checksum mismatch, skipping");
                continue;
            }

            match bincode::deserialize::<WALEntry>(data) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(path = %path.display(), offset = start, error = %e, "failed to deserialize WAL entry, skipping"),
            }
        }

        Ok(entries)
    }

    /// Generations of all WAL files, ascending
    pub fn find_wal_files(storage: &StorageLayout) -> Result<Vec<u64>> {
        let mut generations = Vec::new();
        let wal_dir = storage.wal_dir();

        if wal_dir.exists() {
            for entry in fs::read_dir(wal_dir)? {
                let path = entry?.path();
                if path.extension().and_then(|s| s.to_str()) != Some("log") {
                    continue;
                }
                // wal_00000000.log
                let generation = path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .and_then(|stem| stem.strip_prefix("wal_"))
                    .and_then(|digits| digits.parse::<u64>().ok());
                if let Some(generation) = generation {
                    generations.push(generation);
                }
            }
        }

        generations.sort_unstable();
        Ok(generations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decrement(id: &str) -> Operation {
        Operation::Decrement { id: id.to_string(), collection: CollectionScope::Global }
    }

    #[test]
    fn entries_read_back_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageLayout::new(dir.path().to_path_buf()).unwrap();
        let mut wal = WAL::open(&storage, 0, 10, SyncMode::Immediate).unwrap();
        wal.append(decrement("a")).unwrap();
        wal.append(decrement("b")).unwrap();

        let entries = WAL::read_entries(&storage.wal_path(0)).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].lsn, 10);
        assert_eq!(entries[1].operation, decrement("b"));
    }

    #[test]
    fn torn_tail_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageLayout::new(dir.path().to_path_buf()).unwrap();
        let mut wal = WAL::open(&storage, 0, 0, SyncMode::None).unwrap();
        wal.append(decrement("a")).unwrap();
        wal.append(decrement("b")).unwrap();
        wal.sync().unwrap();

        let path = storage.wal_path(0);
        let len = fs::metadata(&path).unwrap().len();
        OpenOptions::new().write(true).open(&path).unwrap().set_len(len - 3).unwrap();

        let entries = WAL::read_entries(&path).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn corrupt_entry_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageLayout::new(dir.path().to_path_buf()).unwrap();
        let mut wal = WAL::open(&storage, 0, 0, SyncMode::None).unwrap();
        wal.append(decrement("a")).unwrap();
        wal.append(decrement("b")).unwrap();
        wal.sync().unwrap();

        let path = storage.wal_path(0);
        let mut bytes = fs::read(&path).unwrap();
        bytes[HEADER_LEN + 2] ^= 0xff;
        fs::write(&path, bytes).unwrap();

        let entries = WAL::read_entries(&path).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation, decrement("b"));
    }

    #[test]
    fn implausible_length_is_a_torn_tail() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageLayout::new(dir.path().to_path_buf()).unwrap();
        let mut wal = WAL::open(&storage, 0, 0, SyncMode::None).unwrap();
        wal.append(decrement("a")).unwrap();
        wal.sync().unwrap();

        let path = storage.wal_path(0);
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0xff; HEADER_LEN]).unwrap();

        let entries = WAL::read_entries(&path).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation, decrement("a"));
    }

    #[test]
    fn discarded_entry_is_not_replayed() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageLayout::new(dir.path().to_path_buf()).unwrap();
        let mut wal = WAL::open(&storage, 0, 0, SyncMode::None).unwrap();
        wal.append(decrement("a")).unwrap();
        let after_first = wal.position;
        wal.append(decrement("b")).unwrap();

        wal.discard_from(after_first, 1).unwrap();
        assert_eq!(wal.position, after_first);
        assert_eq!(wal.next_lsn, 1);

        let entry = wal.append(decrement("c")).unwrap();
        assert_eq!(entry.lsn, 1);
        let entries = WAL::read_entries(&storage.wal_path(0)).unwrap();
        assert_eq!(entries.iter().map(|e| e.operation.clone()).collect::<Vec<_>>(), vec![decrement("a"), decrement("c")]);
    }

    #[test]
    fn failed_append_that_cannot_be_rolled_back_refuses_writes() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageLayout::new(dir.path().to_path_buf()).unwrap();
        drop(WAL::open(&storage, 0, 0, SyncMode::None).unwrap());

        // read-only handle: both the write and the truncate fail
        let mut wal = WAL {
            file: File::open(storage.wal_path(0)).unwrap(),
            position: 0,
            sync_mode: SyncMode::Immediate,
            generation: 0,
            next_lsn: 5,
            unsynced_bytes: 0,
            poisoned: false,
        };

        let err = wal.append(decrement("a")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
        assert!(!err.is_transient());
        assert_eq!(wal.next_lsn, 5);
        assert_eq!(wal.position, 0);

        let err = wal.append(decrement("b")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
        assert_eq!(fs::metadata(storage.wal_path(0)).unwrap().len(), 0);
    }

    #[test]
    fn next_generation_and_discovery() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageLayout::new(dir.path().to_path_buf()).unwrap();
        let mut wal = WAL::open(&storage, 3, 0, SyncMode::Batch).unwrap();
        wal.append(decrement("a")).unwrap();
        let next = wal.open_next(&storage).unwrap();
        assert_eq!(next.generation, 4);
        assert_eq!(next.next_lsn, 1);
        assert_eq!(next.position, 0);
        assert_eq!(WAL::find_wal_files(&storage).unwrap(), vec![3, 4]);

        // a retried attempt reuses the empty file
        let again = wal.open_next(&storage).unwrap();
        assert_eq!(again.generation, 4);
        assert_eq!(WAL::find_wal_files(&storage).unwrap(), vec![3, 4]);
    }
}
