use std::path::{Path, PathBuf};

use crate::CoreError;
use crate::pattern::{EntityPattern, PatternSet};

/// Where a document's text comes from.
#[derive(Debug, Clone)]
enum Source {
    File(PathBuf),
    Inline(String),
}

/// An identifiable unit of text.
#[derive(Debug, Clone)]
pub struct Document {
    /// Column identifier: the file name without its extension.
    pub id: String,
    /// File name the tag and chapter are derived from.
    pub file_name: String,
    source: Source,
}

/// Outcome of reading a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentText {
    Loaded(String),
    Unavailable(String),
}

impl Document {
    pub fn from_path(path: &Path) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let id = path
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file_name.clone());
        Self {
            id,
            file_name,
            source: Source::File(path.to_path_buf()),
        }
    }

    /// A document held in memory, named as if it were a file.
    pub fn inline(file_name: &str, text: impl Into<String>) -> Self {
        let id = Path::new(file_name)
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file_name.to_string());
        Self {
            id,
            file_name: file_name.to_string(),
            source: Source::Inline(text.into()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            Source::File(p) => Some(p),
            Source::Inline(_) => None,
        }
    }

    pub fn read_text(&self) -> DocumentText {
        match &self.source {
            Source::Inline(text) => DocumentText::Loaded(text.clone()),
            Source::File(path) => match std::fs::read_to_string(path) {
                Ok(text) => DocumentText::Loaded(text),
                Err(e) => DocumentText::Unavailable(e.to_string()),
            },
        }
    }
}

/// The documents of one run, sorted by file name.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    documents: Vec<Document>,
}

impl Corpus {
    pub fn from_documents(mut documents: Vec<Document>) -> Self {
        documents.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Self { documents }
    }

    /// Every regular file in `dir` with the given extension (case-insensitive).
    pub fn from_dir(dir: &Path, extension: &str) -> Result<Self, CoreError> {
        let entries = std::fs::read_dir(dir).map_err(|e| CoreError::read(dir, e))?;
        let mut documents = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CoreError::read(dir, e))?;
            let path = entry.path();
            let matches_ext = path
                .extension()
                .map(|e| e.eq_ignore_ascii_case(extension))
                .unwrap_or(false);
            if matches_ext && path.is_file() {
                documents.push(Document::from_path(&path));
            }
        }
        Ok(Self::from_documents(documents))
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Term x document match counts.
///
/// Every term is a row, zero rows included. Every document that could be read
/// is a column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccurrenceMatrix {
    terms: Vec<String>,
    documents: Vec<String>,
    // counts[term][document]
    counts: Vec<Vec<usize>>,
}

impl OccurrenceMatrix {
    fn with_terms(terms: Vec<String>) -> Self {
        let counts = vec![Vec::new(); terms.len()];
        Self {
            terms,
            documents: Vec::new(),
            counts,
        }
    }

    fn push_document(&mut self, id: String, column: Vec<usize>) {
        debug_assert_eq!(column.len(), self.terms.len());
        self.documents.push(id);
        for (row, count) in self.counts.iter_mut().zip(column) {
            row.push(count);
        }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    pub fn count(&self, term: &str, document: &str) -> Option<usize> {
        let t = self.terms.iter().position(|t| t == term)?;
        let d = self.documents.iter().position(|d| d == document)?;
        Some(self.counts[t][d])
    }

    pub fn row(&self, term: &str) -> Option<&[usize]> {
        let t = self.terms.iter().position(|t| t == term)?;
        Some(&self.counts[t])
    }

    pub fn term_total(&self, term: &str) -> usize {
        self.row(term).map(|r| r.iter().sum()).unwrap_or(0)
    }

    /// The same terms restricted to `documents`, in the given order.
    /// Ids that are not columns of this matrix are ignored.
    pub fn select_documents<S: AsRef<str>>(&self, documents: &[S]) -> Self {
        let indices: Vec<usize> = documents
            .iter()
            .filter_map(|id| self.documents.iter().position(|d| d == id.as_ref()))
            .collect();
        Self {
            terms: self.terms.clone(),
            documents: indices.iter().map(|&i| self.documents[i].clone()).collect(),
            counts: self
                .counts
                .iter()
                .map(|row| indices.iter().map(|&i| row[i]).collect())
                .collect(),
        }
    }
}

/// A document that could not be read; its counts are absent from the matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDocument {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub matrix: OccurrenceMatrix,
    pub skipped: Vec<SkippedDocument>,
}

/// Count every term of `patterns` in `text`, in pattern order.
pub fn count_terms(text: &str, patterns: &PatternSet) -> Vec<usize> {
    patterns.iter().map(|p| p.count(text)).collect()
}

/// Build the occurrence matrix of `corpus`.
///
/// Each document is scanned once as a whole. A document that cannot be read is
/// logged and skipped; it never aborts the batch.
pub fn scan(corpus: &Corpus, patterns: &PatternSet) -> ScanOutcome {
    let mut matrix = OccurrenceMatrix::with_terms(patterns.terms().map(String::from).collect());
    let mut skipped = Vec::new();

    for document in corpus.documents() {
        tracing::info!(file = %document.file_name, "processing file");
        match document.read_text() {
            DocumentText::Loaded(text) => {
                matrix.push_document(document.id.clone(), count_terms(&text, patterns));
            }
            DocumentText::Unavailable(reason) => {
                tracing::warn!(file = %document.file_name, %reason, "skipping unreadable document");
                skipped.push(SkippedDocument {
                    id: document.id.clone(),
                    reason,
                });
            }
        }
    }

    ScanOutcome { matrix, skipped }
}
