use std::fs::{self, File};
use std::io::Write;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::core::error::Result;
use crate::core::types::Facet;
use crate::storage::layout::StorageLayout;

/// Full copy of the facet table plus the WAL position it covers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// First WAL generation not folded into `rows`
    pub wal_generation: u64,
    pub next_lsn: u64,
    pub timestamp: DateTime<Utc>,
    pub rows: Vec<Facet>,
}

impl Checkpoint {
    /// Load checkpoint from disk
    pub fn load(storage: &StorageLayout) -> Result<Option<Self>> {
        let path = storage.checkpoint_path();
        if !path.exists() {
            return Ok(None);
        }

        let compressed = fs::read(path)?;
        let data = lz4_flex::decompress_size_prepended(&compressed)?;
        let checkpoint = bincode::deserialize(&data)?;
        Ok(Some(checkpoint))
    }

    /// Save checkpoint to disk, replacing the previous one atomically
    pub fn save(&self, storage: &StorageLayout) -> Result<()> {
        let data = bincode::serialize(self)?;
        let compressed = lz4_flex::compress_prepend_size(&data);

        let tmp_path = storage.checkpoint_tmp_path();
        let mut file = File::create(&tmp_path)?;
        file.write_all(&compressed)?;
        file.sync_all()?;
        fs::rename(tmp_path, storage.checkpoint_path())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{CollectionScope, FacetRecord};

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageLayout::new(dir.path().to_path_buf()).unwrap();
        assert!(Checkpoint::load(&storage).unwrap().is_none());

        let mut facet = Facet::from_record(FacetRecord::hashtag("flood"), Utc::now());
        facet.counter = 7;
        facet.collection = CollectionScope::from("S2");
        let checkpoint = Checkpoint {
            wal_generation: 2,
            next_lsn: 41,
            timestamp: Utc::now(),
            rows: vec![facet.clone()],
        };
        checkpoint.save(&storage).unwrap();

        let loaded = Checkpoint::load(&storage).unwrap().unwrap();
        assert_eq!(loaded.wal_generation, 2);
        assert_eq!(loaded.next_lsn, 41);
        assert_eq!(loaded.rows, vec![facet]);
        assert!(!storage.checkpoint_tmp_path().exists());
    }
}
