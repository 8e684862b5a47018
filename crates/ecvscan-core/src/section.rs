use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::CoreError;
use crate::pattern::EntityPattern;

/// Uppercase letter or number, optional `.number` groups, whitespace, title.
static GENERIC_HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^((?:[A-Z]|\d+)(?:\.\d+)*)\s+(.+)$").unwrap());

/// Line-start pattern recognising section headers.
///
/// The first capture group is the section id, the last one the section name.
#[derive(Debug, Clone)]
pub struct SectionHeader {
    regex: Regex,
}

impl SectionHeader {
    pub fn generic() -> Self {
        Self {
            regex: GENERIC_HEADER_RE.clone(),
        }
    }

    /// Headers numbered under one of `chapters` only (`10`, `10.2`, `10.2.1`, ...).
    pub fn for_chapters(chapters: &[u32]) -> Result<Self, CoreError> {
        if chapters.is_empty() {
            return Ok(Self::generic());
        }
        let alternatives: Vec<String> = chapters.iter().map(u32::to_string).collect();
        Self::from_pattern(&format!(
            r"^((?:{})(?:\.\d+)*)\s+(.+)$",
            alternatives.join("|")
        ))
    }

    pub fn from_pattern(pattern: &str) -> Result<Self, CoreError> {
        let regex = Regex::new(pattern)?;
        // group 0 plus id and name
        if regex.captures_len() < 3 {
            return Err(CoreError::HeaderCaptures);
        }
        Ok(Self { regex })
    }

    /// Section id and name if `line` is a header.
    pub fn parse(&self, line: &str) -> Option<(String, String)> {
        let caps = self.regex.captures(line)?;
        let id = caps.get(1)?.as_str().trim();
        let name = caps.get(caps.len() - 1)?.as_str().trim();
        if id.is_empty() {
            return None;
        }
        Some((id.to_string(), name.to_string()))
    }
}

impl Default for SectionHeader {
    fn default() -> Self {
        Self::generic()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SectionState {
    #[default]
    NoCurrentSection,
    InSection { id: String, name: String },
}

/// Forward line scanner tracking the section in effect.
///
/// The state is replaced by every header line and dropped at end of input;
/// sections are never closed explicitly.
#[derive(Debug, Clone)]
pub struct SectionScanner<'h> {
    header: &'h SectionHeader,
    state: SectionState,
}

impl<'h> SectionScanner<'h> {
    pub fn new(header: &'h SectionHeader) -> Self {
        Self {
            header,
            state: SectionState::NoCurrentSection,
        }
    }

    /// Advance over `line` and return the state that applies to it.
    ///
    /// A header line applies to itself: it opens its section before being
    /// tested against the patterns.
    pub fn feed_line(&mut self, line: &str) -> &SectionState {
        if let Some((id, name)) = self.header.parse(line) {
            self.state = SectionState::InSection { id, name };
        }
        &self.state
    }

    pub fn state(&self) -> &SectionState {
        &self.state
    }
}

/// A pattern match attributed to the section in effect on its line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionMatch {
    pub entity: String,
    pub section_id: String,
    pub section_name: String,
    /// The matching line.
    pub context: String,
}

/// Test every line of `text` against `patterns`, recording the current section.
///
/// Matches before the first header are discarded, and so are matches under a
/// single-character section id (`A`, `3`).
pub fn scan_sections<P: EntityPattern>(
    text: &str,
    header: &SectionHeader,
    patterns: &[P],
) -> Vec<SectionMatch> {
    let mut scanner = SectionScanner::new(header);
    let mut matches = Vec::new();

    for line in text.lines() {
        let SectionState::InSection { id, name } = scanner.feed_line(line) else {
            continue;
        };
        if id.chars().count() < 2 {
            continue;
        }
        for pattern in patterns {
            if pattern.is_match(line) {
                matches.push(SectionMatch {
                    entity: pattern.entity().to_string(),
                    section_id: id.clone(),
                    section_name: name.clone(),
                    context: line.to_string(),
                });
            }
        }
    }
    matches
}

/// Distinct sections, names and contexts of one entity, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionSummary {
    pub sections: Vec<String>,
    pub names: Vec<String>,
    pub contexts: Vec<String>,
}

impl SectionSummary {
    fn add(&mut self, m: &SectionMatch) {
        push_distinct(&mut self.sections, &m.section_id);
        push_distinct(&mut self.names, &m.section_name);
        push_distinct(&mut self.contexts, &m.context);
    }

    pub fn sections_joined(&self) -> String {
        self.sections.join("; ")
    }

    pub fn names_joined(&self) -> String {
        self.names.join("; ")
    }

    pub fn contexts_joined(&self) -> String {
        self.contexts.join(" | ")
    }
}

fn push_distinct(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|v| v == value) {
        values.push(value.to_string());
    }
}

/// Group matches by entity.
pub fn aggregate_matches(matches: &[SectionMatch]) -> BTreeMap<String, SectionSummary> {
    let mut summaries: BTreeMap<String, SectionSummary> = BTreeMap::new();
    for m in matches {
        summaries.entry(m.entity.clone()).or_default().add(m);
    }
    summaries
}

/// Keep the first `depth` components of a dotted section id: `10.2.3.1` -> `10.2`.
pub fn truncate_section(id: &str, depth: usize) -> String {
    id.trim()
        .split('.')
        .take(depth.max(1))
        .collect::<Vec<_>>()
        .join(".")
}

/// Order section ids component by component, numerically where both are numbers.
pub fn compare_section_ids(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    _ => l.cmp(r),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// An entity together with the sections it was located in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySections {
    pub entity: String,
    pub sections: Vec<String>,
}

impl EntitySections {
    /// Sections from a `;`-joined cell, empty parts dropped.
    pub fn parse(entity: &str, joined: &str) -> Self {
        Self {
            entity: entity.to_string(),
            sections: joined
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        }
    }
}

fn truncated_sections(row: &EntitySections, depth: usize) -> BTreeSet<String> {
    row.sections
        .iter()
        .map(|s| truncate_section(s, depth))
        .filter(|s| !s.is_empty())
        .collect()
}

fn sort_by_section<T>(map: BTreeMap<String, T>) -> Vec<(String, T)> {
    let mut out: Vec<(String, T)> = map.into_iter().collect();
    out.sort_by(|a, b| compare_section_ids(&a.0, &b.0));
    out
}

/// Invert entity -> sections into truncated section -> distinct sorted entities.
pub fn entities_by_section(rows: &[EntitySections], depth: usize) -> Vec<(String, Vec<String>)> {
    let mut by_section: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for row in rows {
        for section in truncated_sections(row, depth) {
            by_section
                .entry(section)
                .or_default()
                .insert(row.entity.clone());
        }
    }
    sort_by_section(by_section)
        .into_iter()
        .map(|(section, entities)| (section, entities.into_iter().collect()))
        .collect()
}

/// Number of rows citing each truncated section; a row counts once per section.
pub fn publication_counts_by_section(rows: &[EntitySections], depth: usize) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for row in rows {
        for section in truncated_sections(row, depth) {
            *counts.entry(section).or_default() += 1;
        }
    }
    sort_by_section(counts)
}

/// Split a chapter at the last `References` marker into body and reference list.
/// The marker starts the reference list.
pub fn split_at_references(text: &str) -> Option<(&str, &str)> {
    let at = text.rfind("References")?;
    Some(text.split_at(at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::citation::CitationPattern;

    #[test]
    fn citation_attributed_to_current_section() {
        let header = SectionHeader::generic();
        let pattern = CitationPattern::author_year("Smith", "2020", "10.1/x").unwrap();
        let text = "10.2 Title\nfoo Smith et al., 2020 bar\n";
        let matches = scan_sections(text, &header, &[pattern]);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].section_id, "10.2");
        assert_eq!(matches[0].section_name, "Title");
        assert_eq!(matches[0].entity, "10.1/x");
        assert_eq!(matches[0].context, "foo Smith et al., 2020 bar");
    }

    #[test]
    fn match_before_first_header_is_excluded() {
        let header = SectionHeader::generic();
        let pattern = CitationPattern::author_year("Smith", "2020", "10.1/x").unwrap();
        let text = "foo Smith et al., 2020 bar\n10.2 Title\nnothing here\n";
        assert!(scan_sections(text, &header, &[pattern]).is_empty());
    }

    #[test]
    fn single_character_sections_are_skipped() {
        let header = SectionHeader::generic();
        let pattern = CitationPattern::author_year("Smith", "2020", "10.1/x").unwrap();
        let text = "A Annex\nSmith 2020\n3 Human influence\nSmith 2020\n3.1 Scope\nSmith 2020\n";
        let matches = scan_sections(text, &header, &[pattern]);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].section_id, "3.1");
    }

    #[test]
    fn headers_replace_the_state() {
        let header = SectionHeader::generic();
        let mut scanner = SectionScanner::new(&header);
        assert_eq!(scanner.feed_line("preamble"), &SectionState::NoCurrentSection);
        scanner.feed_line("A Introduction");
        scanner.feed_line("10.2.1 Ocean heat");
        assert_eq!(
            scanner.state(),
            &SectionState::InSection {
                id: "10.2.1".into(),
                name: "Ocean heat".into()
            }
        );
        scanner.feed_line("lower case line");
        assert!(matches!(scanner.state(), SectionState::InSection { id, .. } if id == "10.2.1"));
    }

    #[test]
    fn chapter_restricted_header() {
        let header = SectionHeader::for_chapters(&[10, 11]).unwrap();
        assert_eq!(
            header.parse("11.3 Regional change"),
            Some(("11.3".into(), "Regional change".into()))
        );
        assert!(header.parse("1.3 Not this chapter").is_none());
        assert!(header.parse("12.1 Nor this one").is_none());
    }

    #[test]
    fn custom_pattern_needs_two_groups() {
        assert!(matches!(
            SectionHeader::from_pattern(r"^(\d+)\s+.+$"),
            Err(CoreError::HeaderCaptures)
        ));
        let header = SectionHeader::from_pattern(r"^(3(\.\d+)*)\s+(.*)$").unwrap();
        assert_eq!(
            header.parse("3.4 Land use"),
            Some(("3.4".into(), "Land use".into()))
        );
    }

    #[test]
    fn aggregation_keeps_distinct_values_in_order() {
        let m = |id: &str, ctx: &str| SectionMatch {
            entity: "doi".into(),
            section_id: id.into(),
            section_name: format!("name {id}"),
            context: ctx.into(),
        };
        let matches = vec![m("10.2", "a"), m("10.1", "b"), m("10.2", "a")];
        let summary = &aggregate_matches(&matches)["doi"];
        assert_eq!(summary.sections_joined(), "10.2; 10.1");
        assert_eq!(summary.names_joined(), "name 10.2; name 10.1");
        assert_eq!(summary.contexts_joined(), "a | b");
    }

    #[test]
    fn truncation() {
        assert_eq!(truncate_section("10.2.3.1", 2), "10.2");
        assert_eq!(truncate_section(" 11 ", 2), "11");
        assert_eq!(truncate_section("10.2.3", 1), "10");
    }

    #[test]
    fn sections_sort_numerically() {
        let mut ids = vec!["10.10", "10.2", "9.1", "10"];
        ids.sort_by(|a, b| compare_section_ids(a, b));
        assert_eq!(ids, vec!["9.1", "10", "10.2", "10.10"]);
    }

    #[test]
    fn inversion_and_counts() {
        let rows = vec![
            EntitySections::parse("10.xxx1", "10.1.3;11.2.4"),
            EntitySections::parse("10.xxx2", "11.2.4; 11.2.1"),
        ];
        let inverted = entities_by_section(&rows, 2);
        assert_eq!(
            inverted,
            vec![
                ("10.1".to_string(), vec!["10.xxx1".to_string()]),
                (
                    "11.2".to_string(),
                    vec!["10.xxx1".to_string(), "10.xxx2".to_string()]
                ),
            ]
        );
        let counts = publication_counts_by_section(&rows, 2);
        assert_eq!(counts, vec![("10.1".to_string(), 1), ("11.2".to_string(), 2)]);
    }

    #[test]
    fn split_at_last_marker() {
        let text = "Body cites References loosely.\nReferences\nSmith 2020";
        let (body, refs) = split_at_references(text).unwrap();
        assert_eq!(body, "Body cites References loosely.\n");
        assert!(refs.starts_with("References\nSmith"));
        assert!(split_at_references("no marker").is_none());
    }
}
