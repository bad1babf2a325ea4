use std::sync::Arc;
use tracing::debug;
use crate::core::error::Result;
use crate::core::types::{CollectionScope, COLLECTION_TYPE};
use crate::pivot::results::{PivotEntry, PivotResult, Statistics};
use crate::storage::context::OpContext;
use crate::storage::{FacetQuery, FacetStore};
use crate::taxonomy::registry::TaxonomyRegistry;

/// Read-only statistics over a facet store
pub struct PivotAggregator {
    store: Arc<dyn FacetStore>,
    taxonomies: Arc<TaxonomyRegistry>,
}

impl PivotAggregator {
    pub fn new(store: Arc<dyn FacetStore>, taxonomies: Arc<TaxonomyRegistry>) -> Self {
        PivotAggregator { store, taxonomies }
    }

    /// Entry counts per value of each requested type.
    ///
    /// Without `types`, the root type of every hierarchy of the collection's
    /// taxonomy is used. `count` is the sum of the `collection` pivot; that
    /// pivot is dropped from `facets` when a collection was requested.
    pub fn get_statistics(
        &self,
        collection: Option<&str>,
        types: Option<&[String]>,
        ctx: &OpContext,
    ) -> Result<Statistics> {
        let types = match types {
            Some(types) => types.to_vec(),
            None => self.taxonomies.taxonomy_for(collection).root_types(),
        };

        let scope = collection.map(CollectionScope::from);
        let pivots = self.get_pivots(scope.as_ref(), &types, None, ctx)?;
        let statistics = counts(pivots, scope.is_some());

        debug!(collection = ?collection, types = ?types, count = statistics.count, "computed facet statistics");
        Ok(statistics)
    }

    /// Live facets of `types` grouped by type.
    ///
    /// Without a collection, rows of different collections carrying the same
    /// value are summed. Values are compared as stored, without normalization.
    pub fn get_pivots(
        &self,
        collection: Option<&CollectionScope>,
        types: &[String],
        parent_id: Option<&str>,
        ctx: &OpContext,
    ) -> Result<PivotResult> {
        let mut query = FacetQuery::new(types.to_vec());
        query.collection = collection.cloned();
        query.parent_id = parent_id.map(str::to_string);

        let mut pivots = PivotResult::new();
        for facet in self.store.query(&query, ctx)? {
            let entries = pivots.entry(facet.facet_type).or_default();
            if collection.is_none() {
                if let Some(entry) = entries.iter_mut().find(|e| e.value == facet.value) {
                    entry.count += facet.counter;
                    continue;
                }
            }
            entries.push(PivotEntry {
                value: facet.value,
                count: facet.counter,
            });
        }

        Ok(pivots)
    }
}

fn counts(pivots: PivotResult, scoped: bool) -> Statistics {
    let mut statistics = Statistics::default();
    for (facet_type, entries) in pivots {
        if entries.is_empty() {
            continue;
        }
        let values = statistics.facets.entry(facet_type).or_default();
        for entry in entries {
            *values.entry(entry.value).or_insert(0) += entry.count;
        }
    }

    if let Some(collections) = statistics.facets.get(COLLECTION_TYPE) {
        statistics.count = collections.values().sum();
        if scoped {
            statistics.facets.remove(COLLECTION_TYPE);
        }
    }

    statistics
}
