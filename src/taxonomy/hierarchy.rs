use serde::{Serialize, Deserialize};

/// Ordered parent -> child list of facet types, e.g. `[platform, instrument]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryHierarchy(pub Vec<String>);

impl CategoryHierarchy {
    pub fn new<S: AsRef<str>>(types: &[S]) -> Self {
        CategoryHierarchy(types.iter().map(|t| t.as_ref().to_string()).collect())
    }

    pub fn root(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn types(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// All hierarchies configured for one collection, in registration order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Taxonomy(pub Vec<CategoryHierarchy>);

impl Taxonomy {
    pub fn new(hierarchies: Vec<CategoryHierarchy>) -> Self {
        Taxonomy(hierarchies)
    }

    pub fn from_types(hierarchies: &[&[&str]]) -> Self {
        Taxonomy(hierarchies.iter().map(|h| CategoryHierarchy::new(*h)).collect())
    }

    pub fn hierarchies(&self) -> &[CategoryHierarchy] {
        &self.0
    }

    /// First type of every hierarchy, the default pivots of a statistics query.
    pub fn root_types(&self) -> Vec<String> {
        self.0.iter()
            .filter_map(|h| h.root())
            .map(str::to_string)
            .collect()
    }

    /// Taxonomy used when a collection declares none of its own.
    pub fn default_catalog() -> Self {
        Taxonomy::from_types(&[
            &["collection"][..],
            &["productType"],
            &["processingLevel"],
            &["platform", "instrument"],
            &["sensorType"],
            &["continent", "country", "region", "state"],
            &["year", "month", "day"],
            &["landcover"],
            &["hashtag"],
        ])
    }
}
