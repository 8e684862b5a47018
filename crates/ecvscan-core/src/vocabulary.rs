use std::path::Path;

use serde_json::Value;

use crate::CoreError;

/// A canonical term and the surface forms counted as occurrences of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabularyEntry {
    pub term: String,
    pub aliases: Vec<String>,
}

/// Controlled vocabulary: canonical term -> aliases, in authoring order.
///
/// Alias lists are not required to be disjoint across terms. A string listed
/// under two terms is counted by both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    entries: Vec<VocabularyEntry>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a term, replacing the aliases of an existing term with the same name.
    pub fn insert(&mut self, term: &str, aliases: Vec<String>) -> Result<(), CoreError> {
        if term.trim().is_empty() {
            return Err(CoreError::InvalidVocabulary {
                term: term.to_string(),
                reason: "term must not be empty".into(),
            });
        }
        if let Some(existing) = self.entries.iter_mut().find(|e| e.term == term) {
            existing.aliases = aliases;
        } else {
            self.entries.push(VocabularyEntry {
                term: term.to_string(),
                aliases,
            });
        }
        Ok(())
    }

    /// Parse a JSON object `{"term": ["alias", ...], ...}`.
    ///
    /// Keys keep their order in the file. A `null` alias list is read as empty.
    pub fn from_json_str(content: &str) -> Result<Self, CoreError> {
        let value: Value = serde_json::from_str(content)?;
        let Value::Object(map) = value else {
            return Err(CoreError::InvalidVocabulary {
                term: String::new(),
                reason: "top-level value must be an object".into(),
            });
        };

        let mut vocabulary = Self::new();
        for (term, aliases) in map {
            let aliases = match aliases {
                Value::Null => vec![],
                Value::Array(items) => items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(s) => Ok(s),
                        other => Err(CoreError::InvalidVocabulary {
                            term: term.clone(),
                            reason: format!("alias must be a string, got {other}"),
                        }),
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                other => {
                    return Err(CoreError::InvalidVocabulary {
                        term,
                        reason: format!("aliases must be an array, got {other}"),
                    });
                }
            };
            vocabulary.insert(&term, aliases)?;
        }
        Ok(vocabulary)
    }

    /// Load the vocabulary store from disk. Failure here is fatal for a run.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::read(path, e))?;
        let vocabulary = Self::from_json_str(&content)?;
        tracing::info!(path = %path.display(), terms = vocabulary.len(), "loaded vocabulary");
        Ok(vocabulary)
    }

    pub fn get(&self, term: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|e| e.term == term)
            .map(|e| e.aliases.as_slice())
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.term.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &VocabularyEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
