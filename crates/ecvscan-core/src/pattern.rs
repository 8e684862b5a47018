use regex::{Regex, RegexBuilder};

use crate::CoreError;
use crate::vocabulary::Vocabulary;

/// Something a line or a document can be tested against on behalf of an entity
/// (a vocabulary term, a cited reference, ...).
pub trait EntityPattern {
    /// Key the matches are aggregated under.
    fn entity(&self) -> &str;

    fn regex(&self) -> &Regex;

    fn is_match(&self, haystack: &str) -> bool {
        self.regex().is_match(haystack)
    }

    /// Number of non-overlapping matches in `haystack`.
    fn count(&self, haystack: &str) -> usize {
        self.regex().find_iter(haystack).count()
    }
}

/// Case-insensitive literal alternation of a term and its aliases.
#[derive(Debug, Clone)]
pub struct TermPattern {
    term: String,
    regex: Regex,
}

impl TermPattern {
    /// Build the matcher for `term` and `aliases`.
    ///
    /// Every alternative is escaped, so `CO₂`, `N₂O` or `PM2.5` match literally.
    /// Empty aliases are dropped: an empty alternative would match at every
    /// position of the text.
    pub fn new(term: &str, aliases: &[String]) -> Result<Self, CoreError> {
        let alternatives: Vec<String> = std::iter::once(term)
            .chain(aliases.iter().map(String::as_str))
            .filter(|alt| {
                let keep = !alt.is_empty();
                if !keep {
                    tracing::debug!(term, "dropping empty alias");
                }
                keep
            })
            .map(regex::escape)
            .collect();

        let regex = RegexBuilder::new(&alternatives.join("|"))
            .case_insensitive(true)
            .build()?;

        Ok(Self {
            term: term.to_string(),
            regex,
        })
    }

    pub fn term(&self) -> &str {
        &self.term
    }
}

impl EntityPattern for TermPattern {
    fn entity(&self) -> &str {
        &self.term
    }

    fn regex(&self) -> &Regex {
        &self.regex
    }
}

/// One compiled matcher per vocabulary term, in vocabulary order.
///
/// Immutable once built; `Regex` is `Sync`, so a set can be shared freely.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<TermPattern>,
}

impl PatternSet {
    pub fn compile(vocabulary: &Vocabulary) -> Result<Self, CoreError> {
        let patterns = vocabulary
            .iter()
            .map(|entry| TermPattern::new(&entry.term, &entry.aliases))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn get(&self, term: &str) -> Option<&TermPattern> {
        self.patterns.iter().find(|p| p.term == term)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TermPattern> {
        self.patterns.iter()
    }

    pub fn as_slice(&self) -> &[TermPattern] {
        &self.patterns
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.term.as_str())
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
