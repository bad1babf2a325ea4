use std::sync::Arc;
use tracing::info;
use crate::builder::facet_builder::FacetBuilder;
use crate::core::config::FacetConfig;
use crate::core::error::Result;
use crate::core::stats::StoreStats;
use crate::core::types::{CollectionScope, Facet, FacetInput, FacetRecord, TAG_SEPARATOR};
use crate::pivot::aggregator::PivotAggregator;
use crate::pivot::results::Statistics;
use crate::storage::context::OpContext;
use crate::storage::durable::DurableFacetStore;
use crate::storage::memory::MemoryFacetStore;
use crate::storage::FacetStore;
use crate::taxonomy::registry::TaxonomyRegistry;

/// Entry point for the serving layer: registers and releases entry facets,
/// answers lookups and statistics.
pub struct FacetService {
    store: Arc<dyn FacetStore>,
    builder: FacetBuilder,
    aggregator: PivotAggregator,
    taxonomies: Arc<TaxonomyRegistry>,
}

impl FacetService {
    /// Durable store when `storage_path` is set, in-memory otherwise.
    pub fn open(config: FacetConfig) -> Result<Self> {
        let store: Arc<dyn FacetStore> = match &config.storage_path {
            Some(path) => Arc::new(DurableFacetStore::open(path.clone(), config.durable_options())?),
            None => Arc::new(MemoryFacetStore::with_lock_timeout(config.lock_timeout())),
        };
        info!(durable = config.storage_path.is_some(), "facet service ready");
        Ok(Self::with_store(store, &config))
    }

    pub fn with_store(store: Arc<dyn FacetStore>, config: &FacetConfig) -> Self {
        let taxonomies = Arc::new(config.taxonomy_registry());
        FacetService {
            aggregator: PivotAggregator::new(store.clone(), taxonomies.clone()),
            builder: FacetBuilder::new(config.builder_options()),
            store,
            taxonomies,
        }
    }

    pub fn store(&self) -> &Arc<dyn FacetStore> {
        &self.store
    }

    pub fn taxonomies(&self) -> &TaxonomyRegistry {
        &self.taxonomies
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    pub fn lookup_facet(&self, identifier: &str) -> Result<Option<Facet>> {
        self.lookup_facet_with_context(identifier, &OpContext::background())
    }

    pub fn lookup_facet_with_context(&self, identifier: &str, ctx: &OpContext) -> Result<Option<Facet>> {
        self.store.get(identifier, ctx)
    }

    pub fn get_statistics(&self, collection: Option<&str>, types: Option<&[String]>) -> Result<Statistics> {
        self.get_statistics_with_context(collection, types, &OpContext::background())
    }

    pub fn get_statistics_with_context(
        &self,
        collection: Option<&str>,
        types: Option<&[String]>,
        ctx: &OpContext,
    ) -> Result<Statistics> {
        self.aggregator.get_statistics(collection, types, ctx)
    }

    pub fn register_facets(
        &self,
        inputs: &[FacetInput],
        collection: &str,
        creator: Option<&str>,
    ) -> Result<Vec<FacetRecord>> {
        self.register_facets_with_context(inputs, collection, creator, &OpContext::background())
    }

    /// Build records for one entry and count each of them once.
    ///
    /// Input is fully validated before the first upsert. Records upserted
    /// before a store failure stay counted.
    pub fn register_facets_with_context(
        &self,
        inputs: &[FacetInput],
        collection: &str,
        creator: Option<&str>,
        ctx: &OpContext,
    ) -> Result<Vec<FacetRecord>> {
        let taxonomy = self.taxonomies.taxonomy_for(Some(collection));
        let scope = CollectionScope::from(collection);
        let records = self.builder.build_from_inputs(inputs, taxonomy, &scope, creator)?;

        for record in &records {
            self.store.upsert(record, ctx)?;
        }
        Ok(records)
    }

    pub fn release_facets<S: AsRef<str>>(&self, identifiers: &[S], collection: &str) -> Result<usize> {
        self.release_facets_with_context(identifiers, collection, &OpContext::background())
    }

    /// Uncount an entry's facets. Identifiers containing the tag separator
    /// are collection facets, bare ones are global hashtags.
    ///
    /// Returns how many existing rows were decremented.
    pub fn release_facets_with_context<S: AsRef<str>>(
        &self,
        identifiers: &[S],
        collection: &str,
        ctx: &OpContext,
    ) -> Result<usize> {
        let mut released = 0;
        for identifier in identifiers {
            let identifier = identifier.as_ref();
            let scope = if identifier.contains(TAG_SEPARATOR) {
                CollectionScope::from(collection)
            } else {
                CollectionScope::Global
            };
            if self.store.decrement(identifier, &scope, ctx)?.is_some() {
                released += 1;
            }
        }
        Ok(released)
    }
}
