use serde::{Serialize, Deserialize};
use tracing::trace;
use crate::core::error::{Error, Result};
use crate::core::types::{CollectionScope, Facet, FacetInput, FacetRecord, Keyword};
use crate::taxonomy::hierarchy::Taxonomy;
use crate::taxonomy::resolver::CategoryResolver;

/// Coverage thresholds, in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderOptions {
    pub min_rel_cov: f64,
    pub min_abs_cov: f64,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        BuilderOptions {
            min_rel_cov: 20.0,
            min_abs_cov: 20.0,
        }
    }
}

/// Turns entry keywords into facet records
#[derive(Debug, Clone, Default)]
pub struct FacetBuilder {
    options: BuilderOptions,
}

impl FacetBuilder {
    pub fn new(options: BuilderOptions) -> Self {
        FacetBuilder { options }
    }

    pub fn options(&self) -> &BuilderOptions {
        &self.options
    }

    pub fn build_from_keywords(
        &self,
        keywords: &[Keyword],
        taxonomy: &Taxonomy,
        collection: &CollectionScope,
    ) -> Result<Vec<FacetRecord>> {
        self.build_with_options(keywords, taxonomy, collection, &self.options)
    }

    /// Same as `build_from_keywords` with per-call thresholds.
    ///
    /// Every keyword is validated before any record is produced.
    pub fn build_with_options(
        &self,
        keywords: &[Keyword],
        taxonomy: &Taxonomy,
        collection: &CollectionScope,
        options: &BuilderOptions,
    ) -> Result<Vec<FacetRecord>> {
        for keyword in keywords {
            validate_keyword(keyword)?;
        }

        let mut records = Vec::with_capacity(keywords.len());
        for keyword in keywords {
            if !passes_coverage(keyword, options) {
                trace!(id = %keyword.id, value = ?keyword.value, gcover = ?keyword.gcover, "keyword below coverage thresholds");
                continue;
            }

            let resolution = CategoryResolver::resolve(taxonomy, &keyword.facet_type)?;
            records.push(FacetRecord {
                id: keyword.id.clone(),
                collection: collection.clone(),
                value: keyword.label(),
                facet_type: keyword.facet_type.clone(),
                parent_id: keyword.parent_id.clone(),
                creator: None,
                is_leaf: resolution.is_leaf,
            });
        }

        Ok(records)
    }

    /// Records for a mixed list of hashtags and keywords.
    ///
    /// Bare hashtags become global records; keywords are scoped to
    /// `collection` and filtered on coverage.
    pub fn build_from_inputs(
        &self,
        inputs: &[FacetInput],
        taxonomy: &Taxonomy,
        collection: &CollectionScope,
        creator: Option<&str>,
    ) -> Result<Vec<FacetRecord>> {
        let mut hashtags = Vec::new();
        let mut keywords = Vec::new();
        for input in inputs {
            match input {
                FacetInput::RawHashtag(id) => {
                    if id.trim().is_empty() {
                        return Err(Error::invalid_record("empty hashtag"));
                    }
                    hashtags.push(FacetRecord::hashtag(id));
                }
                FacetInput::Classified(keyword) => keywords.push(keyword.clone()),
            }
        }

        let mut records = self.build_from_keywords(&keywords, taxonomy, collection)?;
        records.extend(hashtags);
        if let Some(creator) = creator {
            for record in &mut records {
                record.creator = Some(creator.to_string());
            }
        }
        Ok(records)
    }
}

fn validate_keyword(keyword: &Keyword) -> Result<()> {
    if keyword.id.trim().is_empty() {
        return Err(Error::invalid_record("keyword has an empty id"));
    }
    if keyword.facet_type.trim().is_empty() {
        return Err(Error::invalid_record(format!("keyword {} has an empty type", keyword.id)));
    }
    Ok(())
}

/// Kept when relative coverage is absent or large enough, or when absolute
/// coverage is large enough.
fn passes_coverage(keyword: &Keyword, options: &BuilderOptions) -> bool {
    match keyword.value {
        None => true,
        Some(relative) if relative >= options.min_rel_cov => true,
        Some(_) => matches!(keyword.gcover, Some(absolute) if absolute >= options.min_abs_cov),
    }
}

/// Anything carrying a facet identifier
pub trait HasIdentifier {
    fn identifier(&self) -> &str;
}

impl HasIdentifier for FacetInput {
    fn identifier(&self) -> &str {
        self.id()
    }
}

impl HasIdentifier for FacetRecord {
    fn identifier(&self) -> &str {
        &self.id
    }
}

impl HasIdentifier for Facet {
    fn identifier(&self) -> &str {
        &self.id
    }
}

impl HasIdentifier for Keyword {
    fn identifier(&self) -> &str {
        &self.id
    }
}

impl HasIdentifier for String {
    fn identifier(&self) -> &str {
        self
    }
}

impl HasIdentifier for &str {
    fn identifier(&self) -> &str {
        self
    }
}

pub fn extract_identifiers<T: HasIdentifier>(items: &[T]) -> Vec<String> {
    items.iter().map(|item| item.identifier().to_string()).collect()
}
