pub mod core;
pub mod analysis;
pub mod taxonomy;
pub mod builder;
pub mod storage;
pub mod pivot;

pub use crate::core::config::FacetConfig;
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::service::FacetService;
pub use crate::core::types::{CollectionScope, Facet, FacetInput, FacetRecord, Keyword};
pub use crate::pivot::results::Statistics;
pub use crate::storage::context::{CancelToken, OpContext};
pub use crate::storage::FacetStore;

/*
┌──────────────────────────────────────────────────────────────────────────────────────┐
│                              FACETDB STRUCT ARCHITECTURE                              │
└──────────────────────────────────────────────────────────────────────────────────────┘

┌───────────────────────────────────── CORE LAYER ─────────────────────────────────────┐
│                                                                                      │
│  ┌──────────────────────────────────────────────────────────────────────────────┐    │
│  │                            struct FacetService                               │    │
│  │  store: Arc<dyn FacetStore>        // Memory or durable counter store         │    │
│  │  builder: FacetBuilder             // Keywords → records, coverage filter     │    │
│  │  aggregator: PivotAggregator       // Statistics over live rows               │    │
│  │  taxonomies: Arc<TaxonomyRegistry> // Hierarchies per collection              │    │
│  └──────────────────────────────────────────────────────────────────────────────┘    │
│                                                                                      │
│  ┌────────────────────┐  ┌─────────────────────┐  ┌────────────────────────────┐     │
│  │ struct FacetConfig │  │ struct Facet        │  │ enum FacetInput            │     │
│  │ • storage_path     │  │ • id, collection    │  │ • RawHashtag(String)       │     │
│  │ • min_rel_cov      │  │ • value, facet_type │  │ • Classified(Keyword)      │     │
│  │ • min_abs_cov      │  │ • parent_id         │  └────────────────────────────┘     │
│  │ • sync_mode        │  │ • counter, is_leaf  │  ┌────────────────────────────┐     │
│  │ • taxonomies       │  │ • creator           │  │ enum CollectionScope       │     │
│  └────────────────────┘  │ • created_at        │  │ • Global  ("*")            │     │
│                          └─────────────────────┘  │ • Collection(String)       │     │
│                                                   └────────────────────────────┘     │
└──────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── STORAGE LAYER ───────────────────────────────────┐
│                                                                                      │
│  trait FacetStore: upsert / decrement / get / query / stats                          │
│                                                                                      │
│  ┌─────────────────────────────┐     ┌─────────────────────────────────────────┐     │
│  │ struct MemoryFacetStore     │     │ struct DurableFacetStore                │     │
│  │ table: RwLock<FacetTable>   │     │ state: RwLock<{ FacetTable, WAL }>      │     │
│  └─────────────────────────────┘     │ storage: StorageLayout                  │     │
│                                      │ _lock: FileLock                         │     │
│  ┌─────────────────────────────┐     └─────────────────────────────────────────┘     │
│  │ struct FacetTable           │     ┌──────────────────┐  ┌──────────────────┐      │
│  │ BTreeMap<FacetKey, Facet>   │     │ struct WAL       │  │ struct Checkpoint│      │
│  │ key = normalized(id, coll)  │     │ [len][crc][data] │  │ lz4(bincode)     │      │
│  └─────────────────────────────┘     └──────────────────┘  └──────────────────┘      │
└──────────────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────── TAXONOMY / PIVOT LAYER ───────────────────────────────┐
│                                                                                      │
│  CategoryHierarchy [platform, instrument]   CategoryResolver::resolve → is_leaf      │
│  Taxonomy = Vec<CategoryHierarchy>          PivotAggregator::get_statistics          │
│  TaxonomyRegistry (default + per coll.)     Statistics { count, facets }             │
└──────────────────────────────────────────────────────────────────────────────────────┘
*/
