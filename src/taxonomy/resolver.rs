use std::borrow::Cow;
use crate::core::error::{Error, Result};
use crate::taxonomy::hierarchy::{CategoryHierarchy, Taxonomy};

/// Position of a facet type within a taxonomy
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<'a> {
    pub hierarchy: Cow<'a, CategoryHierarchy>,
    pub is_leaf: bool,
}

pub struct CategoryResolver;

impl CategoryResolver {
    /// Find the hierarchy owning `facet_type`.
    ///
    /// Hierarchies are scanned from the last registered to the first, and each
    /// hierarchy from its deepest type upwards, so the last registered
    /// hierarchy wins when a type appears twice. A type found nowhere becomes
    /// its own single-level hierarchy and is always a leaf.
    pub fn resolve<'a>(taxonomy: &'a Taxonomy, facet_type: &str) -> Result<Resolution<'a>> {
        if facet_type.trim().is_empty() {
            return Err(Error::invalid_record("cannot resolve an empty facet type"));
        }

        for hierarchy in taxonomy.hierarchies().iter().rev() {
            let types = hierarchy.types();
            if let Some(position) = types.iter().rposition(|t| t == facet_type) {
                return Ok(Resolution {
                    hierarchy: Cow::Borrowed(hierarchy),
                    is_leaf: position == types.len() - 1,
                });
            }
        }

        Ok(Resolution {
            hierarchy: Cow::Owned(CategoryHierarchy::new(&[facet_type])),
            is_leaf: true,
        })
    }
}
