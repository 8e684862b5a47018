use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;

use crate::CoreError;

/// Category and subcategory given to terms the taxonomy does not list.
pub const UNKNOWN: &str = "Unknown";

/// Where a term sits in the two-level classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: String,
    pub subcategory: String,
}

/// Two-level classification of vocabulary terms: category -> subcategory -> terms.
///
/// Terms are looked up case-insensitively. A term listed twice keeps its last
/// position in the file.
#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    by_term: HashMap<String, Classification>,
}

impl Taxonomy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, category: &str, subcategory: &str, term: &str) {
        self.by_term.insert(
            term.to_lowercase(),
            Classification {
                category: category.to_string(),
                subcategory: subcategory.to_string(),
            },
        );
    }

    /// Parse `{"category": {"subcategory": ["term", ...], ...}, ...}`.
    pub fn from_json_str(content: &str) -> Result<Self, CoreError> {
        let value: Value = serde_json::from_str(content)?;
        let invalid = |reason: String| CoreError::InvalidTaxonomy(reason);

        let Value::Object(categories) = value else {
            return Err(invalid("top-level value must be an object".into()));
        };
        let mut taxonomy = Self::new();
        for (category, subcategories) in &categories {
            let Value::Object(subcategories) = subcategories else {
                return Err(invalid(format!("category {category:?} must map to an object")));
            };
            for (subcategory, terms) in subcategories {
                let Value::Array(terms) = terms else {
                    return Err(invalid(format!(
                        "subcategory {subcategory:?} must map to an array"
                    )));
                };
                for term in terms {
                    let Value::String(term) = term else {
                        return Err(invalid(format!(
                            "terms of {subcategory:?} must be strings, got {term}"
                        )));
                    };
                    taxonomy.insert(category, subcategory, term);
                }
            }
        }
        Ok(taxonomy)
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::read(path, e))?;
        let taxonomy = Self::from_json_str(&content)?;
        tracing::info!(path = %path.display(), terms = taxonomy.len(), "loaded taxonomy");
        Ok(taxonomy)
    }

    pub fn get(&self, term: &str) -> Option<&Classification> {
        self.by_term.get(&term.to_lowercase())
    }

    /// `(category, subcategory)` of `term`, [`UNKNOWN`] for both when unlisted.
    pub fn classify(&self, term: &str) -> (&str, &str) {
        match self.get(term) {
            Some(c) => (c.category.as_str(), c.subcategory.as_str()),
            None => (UNKNOWN, UNKNOWN),
        }
    }

    pub fn len(&self) -> usize {
        self.by_term.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_term.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "Atmosphere": {
            "Composition": ["Ozone", "Carbon Dioxide"],
            "Surface": ["Precipitation"]
        },
        "Ocean": {
            "Physical": ["Sea Surface Temperature"]
        }
    }"#;

    #[test]
    fn classifies_case_insensitively() {
        let taxonomy = Taxonomy::from_json_str(SAMPLE).unwrap();
        assert_eq!(taxonomy.len(), 4);
        assert_eq!(taxonomy.classify("ozone"), ("Atmosphere", "Composition"));
        assert_eq!(
            taxonomy.classify("SEA SURFACE TEMPERATURE"),
            ("Ocean", "Physical")
        );
    }

    #[test]
    fn unlisted_terms_are_unknown() {
        let taxonomy = Taxonomy::from_json_str(SAMPLE).unwrap();
        assert_eq!(taxonomy.classify("permafrost"), (UNKNOWN, UNKNOWN));
        assert_eq!(Taxonomy::new().classify("ozone"), (UNKNOWN, UNKNOWN));
    }

    #[test]
    fn later_listing_wins() {
        let taxonomy = Taxonomy::from_json_str(
            r#"{"A": {"x": ["albedo"]}, "B": {"y": ["Albedo"]}}"#,
        )
        .unwrap();
        assert_eq!(taxonomy.classify("albedo"), ("B", "y"));
    }

    #[test]
    fn rejects_flat_lists() {
        let err = Taxonomy::from_json_str(r#"{"Atmosphere": ["Ozone"]}"#).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTaxonomy(_)));
    }
}
