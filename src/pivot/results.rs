use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

/// One value of a pivot with its entry count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotEntry {
    pub value: String,
    pub count: u64,
}

/// Per-type value counts, each list in store order (value descending)
pub type PivotResult = BTreeMap<String, Vec<PivotEntry>>;

/// Statistics response: total entry count and value counts per type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub count: u64,
    pub facets: BTreeMap<String, BTreeMap<String, u64>>,
}

impl Statistics {
    pub fn is_empty(&self) -> bool {
        self.count == 0 && self.facets.is_empty()
    }

    /// Count of `value` under `facet_type`, zero when absent
    pub fn count_of(&self, facet_type: &str, value: &str) -> u64 {
        self.facets
            .get(facet_type)
            .and_then(|values| values.get(value))
            .copied()
            .unwrap_or(0)
    }
}
