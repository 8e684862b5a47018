use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod crossref;
pub mod dedupe;
pub mod doi;
pub mod doi_list;
pub mod merge;
pub mod parse;
pub mod project;
pub mod reconcile;
pub mod reference_table;
pub mod write;

pub use crossref::{CrossRefClient, CrossRefConfig, FetchEvent, FetchSummary, ReferenceRequest};
pub use dedupe::{DedupeStats, dedupe_by_key, dedupe_exact};
pub use doi_list::{TagDois, collect_tag_dois, write_doi_lists};
pub use merge::{MergeReport, merge_collections};
pub use parse::{load_bibliography, parse_bibliography};
pub use project::ProjectNormalizer;
pub use reconcile::{AttributedEntry, ChapterSource, TagMatch, attribute_chapters, match_by_tag};
pub use reference_table::{ReferenceRow, ReferenceSheet, read_reference_sheets};
pub use write::{save_bibliography, write_bibliography};

#[derive(Error, Debug)]
pub enum BibError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no BibTeX entries found")]
    NoEntries,
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),
    #[error("missing column {0:?}")]
    MissingColumn(&'static str),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Core(#[from] ecvscan_core::CoreError),
}

impl BibError {
    pub(crate) fn read(path: &Path, source: std::io::Error) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn write(path: &Path, source: std::io::Error) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One bibliography record.
///
/// The fields the reconciliation reads are typed; anything else is kept in
/// `extra` so a record survives a read/write cycle. A missing project is the
/// empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BibEntry {
    pub key: String,
    pub entry_type: String,
    pub doi: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub year: Option<String>,
    pub journal: Option<String>,
    pub volume: Option<String>,
    pub number: Option<String>,
    pub pages: Option<String>,
    pub project: String,
    pub extra: BTreeMap<String, String>,
}

impl BibEntry {
    pub fn new(key: impl Into<String>, entry_type: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            entry_type: entry_type.into(),
            ..Default::default()
        }
    }

    /// Set a field by its BibTeX name (case-insensitive). Empty values clear
    /// typed fields.
    pub fn set_field(&mut self, name: &str, value: impl Into<String>) {
        let value: String = value.into();
        let opt = || {
            let v = value.trim();
            (!v.is_empty()).then(|| v.to_string())
        };
        match name.to_ascii_lowercase().as_str() {
            "doi" => self.doi = opt(),
            "title" => self.title = opt(),
            "author" => self.author = opt(),
            "year" => self.year = opt(),
            "journal" => self.journal = opt(),
            "volume" => self.volume = opt(),
            "number" => self.number = opt(),
            "pages" => self.pages = opt(),
            "project" => self.project = value.trim_end().to_string(),
            other => {
                self.extra.insert(other.to_string(), value);
            }
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        match name.to_ascii_lowercase().as_str() {
            "doi" => self.doi.as_deref(),
            "title" => self.title.as_deref(),
            "author" => self.author.as_deref(),
            "year" => self.year.as_deref(),
            "journal" => self.journal.as_deref(),
            "volume" => self.volume.as_deref(),
            "number" => self.number.as_deref(),
            "pages" => self.pages.as_deref(),
            "project" => (!self.project.is_empty()).then_some(self.project.as_str()),
            other => self.extra.get(other).map(String::as_str),
        }
    }

    /// Every present field, sorted by name.
    pub fn fields(&self) -> Vec<(&str, &str)> {
        let typed = [
            ("author", self.author.as_deref()),
            ("doi", self.doi.as_deref()),
            ("journal", self.journal.as_deref()),
            ("number", self.number.as_deref()),
            ("pages", self.pages.as_deref()),
            (
                "project",
                (!self.project.is_empty()).then_some(self.project.as_str()),
            ),
            ("title", self.title.as_deref()),
            ("volume", self.volume.as_deref()),
            ("year", self.year.as_deref()),
        ];
        let mut fields: Vec<(&str, &str)> = typed
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name, v)))
            .chain(self.extra.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));
        fields
    }

    /// Normalised DOI used for every identity comparison.
    pub fn doi_key(&self) -> Option<String> {
        self.doi.as_deref().and_then(doi::normalize_doi)
    }

    /// Family name of the first author.
    ///
    /// Handles both `Family, Given` and `Given Family` forms.
    pub fn first_author_family(&self) -> Option<String> {
        let first = self.author.as_deref()?.split(" and ").next()?.trim();
        let family = match first.split_once(',') {
            Some((family, _)) => family.trim(),
            None => first.split_whitespace().last()?,
        };
        let family = family.trim_matches(|c| c == '{' || c == '}');
        (!family.is_empty()).then(|| family.to_string())
    }
}
