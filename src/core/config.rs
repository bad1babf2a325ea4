use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::builder::facet_builder::BuilderOptions;
use crate::core::error::Result;
use crate::storage::durable::DurableOptions;
use crate::storage::wal::SyncMode;
use crate::taxonomy::hierarchy::Taxonomy;
use crate::taxonomy::registry::TaxonomyRegistry;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FacetConfig {
    /// Durable store directory; in-memory store when unset
    pub storage_path: Option<PathBuf>,

    // Coverage thresholds, in percent
    pub min_rel_cov: f64,
    pub min_abs_cov: f64,

    pub lock_timeout_ms: u64,
    pub sync_mode: SyncMode,
    pub checkpoint_interval: usize,

    pub default_taxonomy: Taxonomy,
    pub collection_taxonomies: HashMap<String, Taxonomy>,
}

impl Default for FacetConfig {
    fn default() -> Self {
        let builder = BuilderOptions::default();
        let durable = DurableOptions::default();
        FacetConfig {
            storage_path: None,
            min_rel_cov: builder.min_rel_cov,
            min_abs_cov: builder.min_abs_cov,
            lock_timeout_ms: durable.lock_timeout.as_millis() as u64,
            sync_mode: durable.sync_mode,
            checkpoint_interval: durable.checkpoint_interval,
            default_taxonomy: Taxonomy::default_catalog(),
            collection_taxonomies: HashMap::new(),
        }
    }
}

impl FacetConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn builder_options(&self) -> BuilderOptions {
        BuilderOptions {
            min_rel_cov: self.min_rel_cov,
            min_abs_cov: self.min_abs_cov,
        }
    }

    pub fn durable_options(&self) -> DurableOptions {
        DurableOptions {
            sync_mode: self.sync_mode,
            lock_timeout: self.lock_timeout(),
            checkpoint_interval: self.checkpoint_interval,
        }
    }

    pub fn taxonomy_registry(&self) -> TaxonomyRegistry {
        self.collection_taxonomies.iter().fold(
            TaxonomyRegistry::new(self.default_taxonomy.clone()),
            |registry, (collection, taxonomy)| registry.with_collection(collection, taxonomy.clone()),
        )
    }
}
