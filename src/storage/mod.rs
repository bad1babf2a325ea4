pub mod checkpoint;
pub mod context;
pub mod durable;
pub mod file_lock;
pub mod layout;
pub mod memory;
pub mod table;
pub mod wal;

use crate::core::error::Result;
use crate::core::stats::StoreStats;
use crate::core::types::{CollectionScope, Facet, FacetRecord};
use crate::storage::context::OpContext;

/// Range query over live facet rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacetQuery {
    /// Exact collection, or every collection (global rows included) when unset
    pub collection: Option<CollectionScope>,
    pub types: Vec<String>,
    pub parent_id: Option<String>,
}

impl FacetQuery {
    pub fn new(types: Vec<String>) -> Self {
        FacetQuery {
            collection: None,
            types,
            parent_id: None,
        }
    }

    pub fn types(types: &[&str]) -> Self {
        FacetQuery::new(types.iter().map(|t| t.to_string()).collect())
    }

    pub fn in_collection(mut self, collection: CollectionScope) -> Self {
        self.collection = Some(collection);
        self
    }

    pub fn with_parent(mut self, parent_id: &str) -> Self {
        self.parent_id = Some(parent_id.to_string());
        self
    }
}

/// Counter store behind the facet index.
///
/// `upsert` and `decrement` are each a single critical section of the store:
/// callers never read a counter and write it back themselves.
pub trait FacetStore: Send + Sync {
    /// Create the row with counter 1, or add 1 to it. Returns the new counter.
    fn upsert(&self, record: &FacetRecord, ctx: &OpContext) -> Result<u64>;

    /// Subtract 1, clamped at zero. `Ok(None)` when the row does not exist.
    fn decrement(&self, id: &str, collection: &CollectionScope, ctx: &OpContext) -> Result<Option<u64>>;

    fn get(&self, id: &str, ctx: &OpContext) -> Result<Option<Facet>>;

    fn query(&self, query: &FacetQuery, ctx: &OpContext) -> Result<Vec<Facet>>;

    fn stats(&self) -> StoreStats;
}
