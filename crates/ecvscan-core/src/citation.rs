use std::path::Path;

use regex::{Regex, RegexBuilder};

use crate::CoreError;
use crate::pattern::EntityPattern;

/// In-text citation matcher for one reference, keyed by an entity (usually the DOI).
#[derive(Debug, Clone)]
pub struct CitationPattern {
    entity: String,
    regex: Regex,
}

impl CitationPattern {
    /// First author followed anywhere on the line by the year as a whole word.
    /// Case-sensitive: `blacksmith 2020` does not cite `Smith`.
    pub fn author_year(author: &str, year: &str, entity: &str) -> Result<Self, CoreError> {
        Self::build(
            &format!(r"{}.*\b{}\b", regex::escape(author.trim()), regex::escape(year.trim())),
            entity,
            false,
        )
    }

    /// `Author et al., Year`, with flexible whitespace, case-insensitive.
    pub fn et_al(author: &str, year: &str, entity: &str) -> Result<Self, CoreError> {
        Self::build(
            &format!(
                r"{}\s*et\s*al\.,\s*{}",
                regex::escape(author.trim()),
                regex::escape(year.trim())
            ),
            entity,
            true,
        )
    }

    fn build(pattern: &str, entity: &str, case_insensitive: bool) -> Result<Self, CoreError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()?;
        Ok(Self {
            entity: entity.to_string(),
            regex,
        })
    }
}

impl EntityPattern for CitationPattern {
    fn entity(&self) -> &str {
        &self.entity
    }

    fn regex(&self) -> &Regex {
        &self.regex
    }
}

/// Citation counts of one reference across the chapters it is listed in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CitationCounts {
    pub per_chapter: Vec<(String, usize)>,
    pub total: usize,
}

impl CitationCounts {
    /// `"10:3;11:1"`.
    pub fn render(&self) -> String {
        self.per_chapter
            .iter()
            .map(|(chapter, count)| format!("{chapter}:{count}"))
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Count `pattern` in `<dir>/<tag>_ch<n>.txt` for every chapter `n`.
///
/// A reference listed in a chapter bibliography is cited there at least once,
/// so every chapter counts at least 1, including chapters whose text is missing.
pub fn count_in_chapters<P: EntityPattern, S: AsRef<str>>(
    pattern: &P,
    dir: &Path,
    tag: &str,
    chapters: &[S],
) -> CitationCounts {
    let mut counts = CitationCounts::default();
    for chapter in chapters {
        let chapter = chapter.as_ref().trim();
        if chapter.is_empty() {
            continue;
        }
        let path = dir.join(format!("{tag}_ch{chapter}.txt"));
        let count = match std::fs::read_to_string(&path) {
            Ok(text) => pattern.count(&text).max(1),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "chapter text unavailable");
                1
            }
        };
        counts.per_chapter.push((chapter.to_string(), count));
        counts.total += count;
    }
    counts
}
