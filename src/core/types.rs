use std::fmt;
use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};
use crate::core::error::{Error, Result};

/// Separator between taxonomy path segments in a facet identifier
pub const TAG_SEPARATOR: char = ':';

/// Reserved collection name for global facet rows
pub const WILDCARD: &str = "*";

/// Type given to bare hashtag identifiers
pub const HASHTAG_TYPE: &str = "hashtag";

/// Pivot whose sum is the total entry count
pub const COLLECTION_TYPE: &str = "collection";

/// Where a facet counter is tracked: one collection, or all of them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CollectionScope {
    Global,
    Collection(String),
}

impl CollectionScope {
    pub fn as_str(&self) -> &str {
        match self {
            CollectionScope::Global => WILDCARD,
            CollectionScope::Collection(name) => name,
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, CollectionScope::Global)
    }
}

impl From<&str> for CollectionScope {
    fn from(name: &str) -> Self {
        if name == WILDCARD {
            CollectionScope::Global
        } else {
            CollectionScope::Collection(name.to_string())
        }
    }
}

impl From<String> for CollectionScope {
    fn from(name: String) -> Self {
        if name == WILDCARD {
            CollectionScope::Global
        } else {
            CollectionScope::Collection(name)
        }
    }
}

impl From<CollectionScope> for String {
    fn from(scope: CollectionScope) -> Self {
        match scope {
            CollectionScope::Global => WILDCARD.to_string(),
            CollectionScope::Collection(name) => name,
        }
    }
}

impl fmt::Display for CollectionScope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidate facet row handed to `FacetStore::upsert`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetRecord {
    pub id: String,
    pub collection: CollectionScope,
    pub value: String,
    #[serde(rename = "type")]
    pub facet_type: String,
    pub parent_id: Option<String>,
    pub creator: Option<String>,
    pub is_leaf: bool,
}

impl FacetRecord {
    /// A bare identifier is a global hashtag leaf.
    pub fn hashtag(id: &str) -> Self {
        FacetRecord {
            id: id.to_string(),
            collection: CollectionScope::Global,
            value: id.to_string(),
            facet_type: HASHTAG_TYPE.to_string(),
            parent_id: None,
            creator: None,
            is_leaf: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::invalid_record("facet record has an empty id"));
        }
        if self.facet_type.trim().is_empty() {
            return Err(Error::invalid_record(format!("facet {} has an empty type", self.id)));
        }
        Ok(())
    }
}

/// Stored facet row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facet {
    pub id: String,
    pub collection: CollectionScope,
    pub value: String,
    #[serde(rename = "type")]
    pub facet_type: String,
    pub parent_id: Option<String>,
    pub counter: u64,
    pub is_leaf: bool,
    pub creator: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Facet {
    pub fn from_record(record: FacetRecord, created_at: DateTime<Utc>) -> Self {
        Facet {
            id: record.id,
            collection: record.collection,
            value: record.value,
            facet_type: record.facet_type,
            parent_id: record.parent_id,
            counter: 1,
            is_leaf: record.is_leaf,
            creator: record.creator,
            created_at,
        }
    }
}

/// Classification keyword extracted from a catalog entry.
///
/// `value` is the relative coverage and `gcover` the absolute coverage,
/// both as percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keyword {
    pub id: String,
    #[serde(rename = "type")]
    pub facet_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub gcover: Option<f64>,
}

impl Keyword {
    pub fn new(id: &str, facet_type: &str, name: &str) -> Self {
        Keyword {
            id: id.to_string(),
            facet_type: facet_type.to_string(),
            name: Some(name.to_string()),
            parent_id: None,
            value: None,
            gcover: None,
        }
    }

    pub fn with_parent(mut self, parent_id: &str) -> Self {
        self.parent_id = Some(parent_id.to_string());
        self
    }

    pub fn with_coverage(mut self, relative: Option<f64>, absolute: Option<f64>) -> Self {
        self.value = relative;
        self.gcover = absolute;
        self
    }

    /// Label used for the facet: the name, else the last path segment of the id.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.id
                .rsplit(TAG_SEPARATOR)
                .next()
                .unwrap_or(&self.id)
                .to_string(),
        }
    }
}

/// Ingestion input: either a bare hashtag or a classified keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FacetInput {
    RawHashtag(String),
    Classified(Keyword),
}

impl FacetInput {
    pub fn id(&self) -> &str {
        match self {
            FacetInput::RawHashtag(id) => id,
            FacetInput::Classified(keyword) => &keyword.id,
        }
    }
}

impl From<&str> for FacetInput {
    fn from(id: &str) -> Self {
        FacetInput::RawHashtag(id.to_string())
    }
}

impl From<Keyword> for FacetInput {
    fn from(keyword: Keyword) -> Self {
        FacetInput::Classified(keyword)
    }
}
