use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod citation;
pub mod columns;
pub mod config_file;
pub mod pattern;
pub mod scanner;
pub mod section;
pub mod spm;
pub mod tags;
pub mod taxonomy;
pub mod vocabulary;

// Re-export for convenience
pub use citation::{CitationCounts, CitationPattern, count_in_chapters};
pub use pattern::{EntityPattern, PatternSet, TermPattern};
pub use scanner::{
    Corpus, Document, DocumentText, OccurrenceMatrix, ScanOutcome, SkippedDocument, scan,
};
pub use section::{SectionHeader, SectionMatch, SectionScanner, SectionState, SectionSummary};
pub use spm::{SpmStatement, load_spm, parse_spm, supporting_entities};
pub use tags::{OTHER_TAG, TagGroup, extract_tag, group_by_tag};
pub use taxonomy::{Classification, Taxonomy};
pub use vocabulary::Vocabulary;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid vocabulary entry {term:?}: {reason}")]
    InvalidVocabulary { term: String, reason: String },
    #[error("invalid taxonomy: {0}")]
    InvalidTaxonomy(String),
    #[error("invalid pattern: {0}")]
    Regex(#[from] regex::Error),
    #[error("section header pattern must capture an id and a title")]
    HeaderCaptures,
}

impl CoreError {
    pub(crate) fn read(path: &Path, source: std::io::Error) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Configuration for a corpus scan.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Ordered tag list; the first tag contained in a file name wins.
    pub tags: Vec<String>,
    /// File extension of corpus documents, without the dot.
    pub extension: String,
    /// Split the matrix into one group per tag.
    pub group_by_tag: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            tags: vec![],
            extension: "txt".to_string(),
            group_by_tag: true,
        }
    }
}

/// Result of [`scan_directory`]: the matrix plus the tag groups over its columns.
#[derive(Debug, Clone)]
pub struct GroupedScan {
    pub outcome: ScanOutcome,
    pub groups: Vec<TagGroup>,
}

/// Scan every document of `dir` against the vocabulary patterns.
///
/// Listing the directory is the only fatal failure; unreadable documents are
/// reported in [`ScanOutcome::skipped`] and the batch continues.
pub fn scan_directory(
    dir: &Path,
    patterns: &PatternSet,
    config: &ScanConfig,
) -> Result<GroupedScan, CoreError> {
    let corpus = Corpus::from_dir(dir, &config.extension)?;
    tracing::info!(
        dir = %dir.display(),
        documents = corpus.len(),
        terms = patterns.len(),
        "scanning corpus"
    );

    let outcome = scan(&corpus, patterns);
    let groups = if config.group_by_tag {
        group_by_tag(corpus.documents(), &config.tags)
    } else {
        vec![TagGroup {
            tag: "all".to_string(),
            documents: corpus.documents().iter().map(|d| d.id.clone()).collect(),
        }]
    };

    Ok(GroupedScan { outcome, groups })
}
