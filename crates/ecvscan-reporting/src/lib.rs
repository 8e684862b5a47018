use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod builders;
pub mod export;
pub mod types;

pub use builders::{
    attribution_sheet, citation_sheet, entries_sheet, matrix_sheet, matrix_workbook,
    reference_sheet, section_index_sheets, section_sheet, spm_sheet, tag_match_workbook,
};
pub use export::{export_json, export_markdown, export_workbook, export_xlsx, write_csv};
pub use types::{Cell, ExportFormat, Sheet, Workbook};

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

impl ReportError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
