use std::collections::HashSet;
use std::path::{Path, PathBuf};

use ecvscan_core::citation::{CitationCounts, CitationPattern, count_in_chapters};
use ecvscan_core::section::{
    SectionHeader, SectionSummary, aggregate_matches, compare_section_ids, scan_sections,
};
use ecvscan_core::tags::chapter_number;

use crate::parse::load_bibliography;
use crate::reference_table::ReferenceRow;
use crate::{BibEntry, BibError};

/// The DOIs cited by one chapter bibliography.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterSource {
    pub file_name: String,
    pub chapter: String,
    /// Normalised DOIs.
    pub dois: HashSet<String>,
}

impl ChapterSource {
    pub fn from_entries(file_name: &str, entries: &[BibEntry]) -> Self {
        Self {
            file_name: file_name.to_string(),
            chapter: chapter_label(file_name),
            dois: entries.iter().filter_map(BibEntry::doi_key).collect(),
        }
    }
}

/// Chapter label of a file name: the `_ch<n>` number, or the stem.
pub fn chapter_label(file_name: &str) -> String {
    match chapter_number(file_name) {
        Some(n) => n.to_string(),
        None => Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| file_name.to_string()),
    }
}

pub(crate) fn list_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, BibError> {
    let entries = std::fs::read_dir(dir).map_err(|e| BibError::read(dir, e))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .is_some_and(|e| e.eq_ignore_ascii_case(extension))
        })
        .collect();
    files.sort();
    Ok(files)
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Load every `.bib` file of `dir` as a chapter source.
///
/// Listing the directory is fatal; an unreadable or empty file is logged and
/// skipped.
pub fn load_chapter_sources(dir: &Path) -> Result<Vec<ChapterSource>, BibError> {
    let mut sources = Vec::new();
    for path in list_files(dir, "bib")? {
        let file_name = file_name_of(&path);
        match load_bibliography(&path) {
            Ok(entries) => {
                tracing::info!(file = %file_name, entries = entries.len(), "analysing chapter bibliography");
                sources.push(ChapterSource::from_entries(&file_name, &entries));
            }
            Err(e) => tracing::warn!(file = %file_name, error = %e, "skipping chapter bibliography"),
        }
    }
    Ok(sources)
}

fn sources_for_tag<'s>(
    sources: &'s [ChapterSource],
    tag: Option<&'s str>,
) -> impl Iterator<Item = &'s ChapterSource> + 's {
    sources
        .iter()
        .filter(move |s| tag.is_none_or(|t| s.file_name.contains(t)))
}

/// A master entry and the chapters citing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributedEntry<'a> {
    pub entry: &'a BibEntry,
    /// Distinct, in ascending chapter order.
    pub chapters: Vec<String>,
}

impl AttributedEntry<'_> {
    pub fn chapters_joined(&self) -> String {
        self.chapters.join(";")
    }
}

/// Attribute master entries to the chapters whose bibliography cites their DOI.
///
/// With a `tag`, only chapter files whose name contains it are considered.
/// Entries without a DOI or without any citing chapter keep an empty
/// attribution; none is dropped.
pub fn attribute_chapters<'a>(
    master: &'a [BibEntry],
    sources: &[ChapterSource],
    tag: Option<&str>,
) -> Vec<AttributedEntry<'a>> {
    let sources: Vec<&ChapterSource> = sources_for_tag(sources, tag).collect();
    master
        .iter()
        .map(|entry| {
            let Some(doi) = entry.doi_key() else {
                tracing::warn!(key = %entry.key, "entry has no DOI, leaving attribution empty");
                return AttributedEntry {
                    entry,
                    chapters: Vec::new(),
                };
            };
            let mut chapters: Vec<String> = Vec::new();
            for source in sources.iter().filter(|s| s.dois.contains(&doi)) {
                if !chapters.contains(&source.chapter) {
                    chapters.push(source.chapter.clone());
                }
            }
            chapters.sort_by(|a, b| compare_section_ids(a, b));
            if !chapters.is_empty() {
                tracing::debug!(doi = %doi, chapters = %chapters.join(";"), "attributed");
            }
            AttributedEntry { entry, chapters }
        })
        .collect()
}

/// Master entries cited by the chapter bibliographies of one tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMatch {
    pub tag: String,
    pub files: Vec<String>,
    pub entries: Vec<BibEntry>,
}

/// For every tag, the master entries whose DOI appears in any chapter file of
/// that tag. Tags without chapter files are skipped.
pub fn match_by_tag<S: AsRef<str>>(
    master: &[BibEntry],
    sources: &[ChapterSource],
    tags: &[S],
) -> Vec<TagMatch> {
    let mut matches = Vec::new();
    for tag in tags.iter().map(|t| t.as_ref()) {
        let tagged: Vec<&ChapterSource> = sources_for_tag(sources, Some(tag)).collect();
        if tagged.is_empty() {
            tracing::info!(tag, "no chapter files for tag, continuing");
            continue;
        }
        let dois: HashSet<&str> = tagged
            .iter()
            .flat_map(|s| s.dois.iter().map(String::as_str))
            .collect();
        let entries: Vec<BibEntry> = master
            .iter()
            .filter(|e| e.doi_key().is_some_and(|d| dois.contains(d.as_str())))
            .cloned()
            .collect();
        tracing::info!(tag, files = tagged.len(), matched = entries.len(), "matched tag");
        matches.push(TagMatch {
            tag: tag.to_string(),
            files: tagged.iter().map(|s| s.file_name.clone()).collect(),
            entries,
        });
    }
    matches
}

/// One row per attributed chapter: `10;11` becomes two rows.
/// Rows without chapters are kept once.
pub fn expand_chapters(rows: &[ReferenceRow]) -> Vec<ReferenceRow> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        if row.chapters.is_empty() {
            out.push(row.clone());
            continue;
        }
        for chapter in &row.chapters {
            out.push(ReferenceRow {
                chapters: vec![chapter.clone()],
                ..row.clone()
            });
        }
    }
    out
}

/// Chapter texts of a corpus directory, indexed by chapter number.
#[derive(Debug, Clone, Default)]
pub struct ChapterTexts {
    texts: Vec<(u32, String, String)>,
}

impl ChapterTexts {
    /// Files named `*_ch<n>*.<extension>`, optionally restricted to names
    /// containing `tag`. Unreadable files are logged and skipped.
    pub fn load(dir: &Path, extension: &str, tag: Option<&str>) -> Result<Self, BibError> {
        let mut texts = Vec::new();
        for path in list_files(dir, extension)? {
            let file_name = file_name_of(&path);
            if tag.is_some_and(|t| !file_name.contains(t)) {
                continue;
            }
            let Some(chapter) = chapter_number(&file_name) else {
                continue;
            };
            match std::fs::read_to_string(&path) {
                Ok(text) => texts.push((chapter, file_name, text)),
                Err(e) => tracing::warn!(file = %file_name, error = %e, "skipping unreadable chapter"),
            }
        }
        Ok(Self { texts })
    }

    pub fn from_texts(texts: Vec<(u32, String, String)>) -> Self {
        Self { texts }
    }

    pub fn for_chapter(&self, chapter: u32) -> impl Iterator<Item = (&str, &str)> {
        self.texts
            .iter()
            .filter(move |(c, _, _)| *c == chapter)
            .map(|(_, name, text)| (name.as_str(), text.as_str()))
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

/// A reference row with the sections its citations were found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionedReference {
    pub row: ReferenceRow,
    pub summary: Option<SectionSummary>,
}

/// Locate `First Author ... Year` citations of every row in the texts of its
/// chapters, attributing each to the section in effect.
///
/// Without a `header` override, headers are restricted to the chapter being
/// scanned. Rows lacking an author or a year are kept with no sections.
pub fn locate_sections(
    rows: &[ReferenceRow],
    texts: &ChapterTexts,
    header: Option<&SectionHeader>,
) -> Result<Vec<SectionedReference>, BibError> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        if row.first_author.is_empty() || row.year.is_empty() {
            tracing::warn!(doi = %row.doi, "no first author or year, cannot locate citations");
            out.push(SectionedReference {
                row: row.clone(),
                summary: None,
            });
            continue;
        }

        let pattern = CitationPattern::author_year(&row.first_author, &row.year, &row.doi)?;
        let mut matches = Vec::new();
        for chapter in &row.chapters {
            let Ok(n) = chapter.parse::<u32>() else {
                tracing::debug!(doi = %row.doi, chapter = %chapter, "non-numeric chapter");
                continue;
            };
            let chapter_header = match header {
                Some(h) => h.clone(),
                None => SectionHeader::for_chapters(&[n])?,
            };
            for (file_name, text) in texts.for_chapter(n) {
                tracing::debug!(doi = %row.doi, file = %file_name, "scanning chapter");
                matches.extend(scan_sections(
                    text,
                    &chapter_header,
                    std::slice::from_ref(&pattern),
                ));
            }
        }

        out.push(SectionedReference {
            row: row.clone(),
            summary: aggregate_matches(&matches).remove(&row.doi),
        });
    }
    Ok(out)
}

/// Count `Author et al., Year` citations of every row in `<dir>/<tag>_ch<n>.txt`.
///
/// Each listed chapter counts at least once; rows lacking an author or year
/// get that minimum.
pub fn count_citations(
    rows: &[ReferenceRow],
    dir: &Path,
    tag: &str,
) -> Result<Vec<CitationCounts>, BibError> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let counts = if row.first_author.is_empty() || row.year.is_empty() {
            tracing::warn!(doi = %row.doi, "no first author or year, counting one citation per chapter");
            let per_chapter: Vec<(String, usize)> =
                row.chapters.iter().map(|c| (c.clone(), 1)).collect();
            CitationCounts {
                total: per_chapter.len(),
                per_chapter,
            }
        } else {
            let pattern = CitationPattern::et_al(&row.first_author, &row.year, &row.doi)?;
            count_in_chapters(&pattern, dir, tag, &row.chapters)
        };
        out.push(counts);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, doi: Option<&str>) -> BibEntry {
        let mut e = BibEntry::new(key, "article");
        if let Some(doi) = doi {
            e.set_field("doi", doi);
        }
        e
    }

    fn source(file: &str, dois: &[&str]) -> ChapterSource {
        let entries: Vec<BibEntry> = dois.iter().map(|d| entry(d, Some(d))).collect();
        ChapterSource::from_entries(file, &entries)
    }

    #[test]
    fn attribution_accumulates_chapters_in_order() {
        let master = vec![
            entry("a", Some("10.1/A")),
            entry("b", Some("10.1/b")),
            entry("c", None),
        ];
        let sources = vec![
            source("wg1_ch11.bib", &["10.1/a"]),
            source("wg1_ch9.bib", &["10.1/a", "10.1/a"]),
            source("wg2_ch1.bib", &["10.1/b"]),
        ];
        let attributed = attribute_chapters(&master, &sources, None);
        assert_eq!(attributed.len(), 3);
        assert_eq!(attributed[0].chapters_joined(), "9;11");
        assert_eq!(attributed[1].chapters, vec!["1"]);
        assert!(attributed[2].chapters.is_empty());

        let wg1_only = attribute_chapters(&master, &sources, Some("wg1"));
        assert!(wg1_only[1].chapters.is_empty());
    }

    #[test]
    fn tag_matching() {
        let master = vec![entry("a", Some("10.1/a")), entry("b", Some("10.1/b"))];
        let sources = vec![
            source("srocc_ch1.bib", &["10.1/b"]),
            source("wg1_ch2.bib", &["10.1/a", "10.1/z"]),
        ];
        let matches = match_by_tag(&master, &sources, &["wg1", "wg3", "srocc"]);
        let tags: Vec<&str> = matches.iter().map(|m| m.tag.as_str()).collect();
        assert_eq!(tags, vec!["wg1", "srocc"]);
        assert_eq!(matches[0].entries.len(), 1);
        assert_eq!(matches[0].entries[0].key, "a");
        assert_eq!(matches[1].files, vec!["srocc_ch1.bib"]);
    }

    #[test]
    fn expansion() {
        let row = ReferenceRow {
            doi: "10.1038/nature11377".into(),
            chapters: vec!["10".into(), "11".into()],
            ..Default::default()
        };
        let bare = ReferenceRow {
            doi: "10.1/none".into(),
            ..Default::default()
        };
        let out = expand_chapters(&[row, bare]);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].chapters, vec!["10"]);
        assert_eq!(out[1].chapters, vec!["11"]);
        assert_eq!(out[1].doi, "10.1038/nature11377");
        assert!(out[2].chapters.is_empty());
    }

    #[test]
    fn sections_are_located_per_chapter() {
        let texts = ChapterTexts::from_texts(vec![
            (
                10,
                "wg1_ch10.txt".into(),
                "Smith 2020 preamble\n10.2 Ocean heat\nas in Smith et al. (2020)\n10.3 Sea level\nSmith et al., 2020\n".into(),
            ),
            (11, "wg1_ch11.txt".into(), "11.1 Other\nSmith 2020\n".into()),
        ]);
        let row = ReferenceRow {
            doi: "10.1/s".into(),
            first_author: "Smith".into(),
            year: "2020".into(),
            chapters: vec!["10".into()],
            ..Default::default()
        };
        let located = locate_sections(&[row], &texts, None).unwrap();
        let summary = located[0].summary.as_ref().unwrap();
        assert_eq!(summary.sections_joined(), "10.2; 10.3");
        assert_eq!(summary.names_joined(), "Ocean heat; Sea level");
    }

    #[test]
    fn citation_counts_with_minimum() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("wg1_ch3.txt"),
            "Doe et al., 2019 ... Doe et al., 2019 ... Doe et al., 2019",
        )
        .unwrap();
        let rows = vec![
            ReferenceRow {
                first_author: "Doe".into(),
                year: "2019".into(),
                chapters: vec!["3".into(), "4".into()],
                ..Default::default()
            },
            ReferenceRow {
                chapters: vec!["3".into()],
                ..Default::default()
            },
        ];
        let counts = count_citations(&rows, dir.path(), "wg1").unwrap();
        assert_eq!(counts[0].render(), "3:3;4:1");
        assert_eq!(counts[0].total, 4);
        assert_eq!(counts[1].total, 1);
    }

    #[test]
    fn chapter_sources_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("wg1_ch2.bib"),
            "@article{x,\n  doi = {10.1/X}\n}\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("empty_ch3.bib"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "@article{y,\n}\n").unwrap();
        let sources = load_chapter_sources(dir.path()).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].chapter, "2");
        assert!(sources[0].dois.contains("10.1/x"));
    }
}
