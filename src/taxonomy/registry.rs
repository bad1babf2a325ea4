use std::collections::HashMap;
use crate::analysis::normalize::normalize;
use crate::taxonomy::hierarchy::Taxonomy;

/// Taxonomies per collection, fixed at construction
#[derive(Debug, Clone)]
pub struct TaxonomyRegistry {
    default: Taxonomy,
    collections: HashMap<String, Taxonomy>,
}

impl TaxonomyRegistry {
    pub fn new(default: Taxonomy) -> Self {
        TaxonomyRegistry {
            default,
            collections: HashMap::new(),
        }
    }

    pub fn with_collection(mut self, collection: &str, taxonomy: Taxonomy) -> Self {
        self.collections.insert(normalize(collection), taxonomy);
        self
    }

    pub fn default_taxonomy(&self) -> &Taxonomy {
        &self.default
    }

    /// Taxonomy of `collection`, the default one when unset or unknown.
    pub fn taxonomy_for(&self, collection: Option<&str>) -> &Taxonomy {
        collection
            .and_then(|name| self.collections.get(&normalize(name)))
            .unwrap_or(&self.default)
    }
}

impl Default for TaxonomyRegistry {
    fn default() -> Self {
        TaxonomyRegistry::new(Taxonomy::default_catalog())
    }
}
