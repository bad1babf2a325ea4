use serde::{Serialize, Deserialize};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;
use crate::core::types::WILDCARD;

/// Case- and accent-insensitive form used for identifier comparisons.
///
/// Decomposes to NFD, drops combining marks, then lower-cases. Whitespace is
/// kept as is.
pub fn normalize(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Unique key of a facet row: normalized id and normalized collection.
///
/// Ordering is by id first, so all scopes of one identifier are adjacent. The
/// wildcard scope (`*`) sorts ahead of every collection name through
/// `scoped`, whatever bytes the names start with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FacetKey {
    pub id: String,
    // field order drives the derived ordering
    pub scoped: bool,
    pub collection: String,
}

impl FacetKey {
    pub fn new(id: &str, collection: &str) -> Self {
        let collection = normalize(collection);
        FacetKey {
            id: normalize(id),
            scoped: collection != WILDCARD,
            collection,
        }
    }

    /// Smallest key for `id`, the start of its range in an ordered map
    pub fn first_for(id: String) -> Self {
        FacetKey { id, scoped: false, collection: String::new() }
    }
}
