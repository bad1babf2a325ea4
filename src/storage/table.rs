use std::collections::BTreeMap;
use chrono::{DateTime, Utc};
use crate::analysis::normalize::{normalize, FacetKey};
use crate::core::stats::StoreStats;
use crate::core::types::{CollectionScope, Facet, FacetRecord};
use crate::storage::FacetQuery;

/// Outcome of an increment-or-create
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upserted {
    pub counter: u64,
    pub created: bool,
}

/// Facet rows keyed by normalized (id, collection).
///
/// Not synchronized; stores wrap it in a lock and mutate it only while
/// holding the write side.
#[derive(Debug, Default)]
pub struct FacetTable {
    rows: BTreeMap<FacetKey, Facet>,
}

impl FacetTable {
    pub fn new() -> Self {
        FacetTable::default()
    }

    pub fn from_rows(rows: Vec<Facet>) -> Self {
        let rows = rows.into_iter()
            .map(|facet| (FacetKey::new(&facet.id, facet.collection.as_str()), facet))
            .collect();
        FacetTable { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, key: &FacetKey) -> bool {
        self.rows.contains_key(key)
    }

    pub fn counter(&self, key: &FacetKey) -> Option<u64> {
        self.rows.get(key).map(|facet| facet.counter)
    }

    pub fn upsert(&mut self, record: &FacetRecord, now: DateTime<Utc>) -> Upserted {
        let key = FacetKey::new(&record.id, record.collection.as_str());
        match self.rows.get_mut(&key) {
            Some(facet) => {
                facet.counter += 1;
                Upserted { counter: facet.counter, created: false }
            }
            None => {
                self.rows.insert(key, Facet::from_record(record.clone(), now));
                Upserted { counter: 1, created: true }
            }
        }
    }

    /// Decrease by one, never below zero. `None` when the row does not exist.
    pub fn decrement(&mut self, key: &FacetKey) -> Option<u64> {
        self.rows.get_mut(key).map(|facet| {
            facet.counter = facet.counter.saturating_sub(1);
            facet.counter
        })
    }

    /// First row with this identifier: the global row if any, then
    /// collections in normalized name order.
    pub fn get(&self, id: &str) -> Option<&Facet> {
        let id = normalize(id);
        self.rows.range(FacetKey::first_for(id.clone())..)
            .next()
            .filter(|(key, _)| key.id == id)
            .map(|(_, facet)| facet)
    }

    /// Live rows matching `query`, ordered by type ascending then value descending.
    pub fn query(&self, query: &FacetQuery) -> Vec<Facet> {
        let collection = query.collection.as_ref().map(|c| normalize(c.as_str()));
        let parent = query.parent_id.as_deref().map(normalize);

        let mut facets: Vec<Facet> = self.rows.iter()
            .filter(|(_, facet)| facet.counter > 0)
            .filter(|(_, facet)| query.types.iter().any(|t| *t == facet.facet_type))
            .filter(|(key, _)| collection.as_ref().is_none_or(|c| key.collection == *c))
            .filter(|(_, facet)| match &parent {
                None => true,
                Some(parent) => facet.parent_id.as_deref().map(normalize).as_ref() == Some(parent),
            })
            .map(|(_, facet)| facet.clone())
            .collect();

        facets.sort_by(|a, b| {
            a.facet_type.cmp(&b.facet_type).then_with(|| b.value.cmp(&a.value))
        });
        facets
    }

    pub fn rows(&self) -> impl Iterator<Item = &Facet> {
        self.rows.values()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            rows: self.rows.len(),
            live_rows: self.rows.values().filter(|f| f.counter > 0).count(),
            global_rows: self.rows.values()
                .filter(|f| f.collection == CollectionScope::Global)
                .count(),
            ..StoreStats::default()
        }
    }
}
