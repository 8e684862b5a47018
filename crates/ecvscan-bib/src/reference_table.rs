use std::io::Read;
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use csv::ReaderBuilder;

use crate::{BibEntry, BibError};

/// One reference of a reconciliation table.
///
/// Missing cells are empty strings; list cells are split on `;`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceRow {
    pub project: String,
    pub doi: String,
    pub title: String,
    pub year: String,
    pub author: String,
    pub first_author: String,
    pub journal: String,
    pub chapters: Vec<String>,
    pub sections: Vec<String>,
}

impl ReferenceRow {
    pub fn from_entry(entry: &BibEntry) -> Self {
        Self {
            project: entry.project.clone(),
            doi: entry.doi.clone().unwrap_or_default(),
            title: entry.title.clone().unwrap_or_default(),
            year: entry.year.clone().unwrap_or_default(),
            author: entry.author.clone().unwrap_or_default(),
            first_author: entry.first_author_family().unwrap_or_default(),
            journal: entry.journal.clone().unwrap_or_default(),
            chapters: Vec::new(),
            sections: Vec::new(),
        }
    }

    pub fn chapters_joined(&self) -> String {
        self.chapters.join(";")
    }
}

/// Split a list cell on `;` or `,`, dropping blanks and the `nan` marker.
pub fn split_list(cell: &str) -> Vec<String> {
    cell.split([';', ','])
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("nan"))
        .map(String::from)
        .collect()
}

#[derive(Default)]
struct ColumnIndices {
    project: Option<usize>,
    doi: usize,
    title: Option<usize>,
    year: Option<usize>,
    author: Option<usize>,
    first_author: Option<usize>,
    journal: Option<usize>,
    chapters: Option<usize>,
    sections: Option<usize>,
}

impl ColumnIndices {
    fn from_headers<S: AsRef<str>>(headers: &[S]) -> Result<Self, BibError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.as_ref().trim().eq_ignore_ascii_case(name))
        };
        Ok(Self {
            project: find("Project"),
            doi: find("DOI").ok_or(BibError::MissingColumn("DOI"))?,
            title: find("Title"),
            year: find("Year"),
            author: find("Author"),
            first_author: find("First Author"),
            journal: find("Journal"),
            chapters: find("Chapters").or_else(|| find("Chapter")),
            sections: find("Sections").or_else(|| find("Section")),
        })
    }

    fn row<S: AsRef<str>>(&self, cells: &[S]) -> ReferenceRow {
        let cell = |index: Option<usize>| {
            index
                .and_then(|i| cells.get(i))
                .map(|v| v.as_ref().trim().to_string())
                .unwrap_or_default()
        };
        let mut row = ReferenceRow {
            project: cell(self.project),
            doi: cell(Some(self.doi)),
            title: cell(self.title),
            year: cell(self.year),
            author: cell(self.author),
            first_author: cell(self.first_author),
            journal: cell(self.journal),
            chapters: split_list(&cell(self.chapters)),
            sections: split_list(&cell(self.sections)),
        };
        if row.first_author.is_empty() && !row.author.is_empty() {
            let author_entry = BibEntry {
                author: Some(row.author.clone()),
                ..BibEntry::default()
            };
            row.first_author = author_entry.first_author_family().unwrap_or_default();
        }
        // Spreadsheets export years as floats.
        if let Some(stripped) = row.year.strip_suffix(".0") {
            row.year = stripped.to_string();
        }
        row
    }
}

/// Parse a CSV reference table with a header row. Only the `DOI` column is required.
pub fn parse_reference_table<R: Read>(reader: R) -> Result<Vec<ReferenceRow>, BibError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
    let indices = ColumnIndices::from_headers(&headers)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let cells: Vec<&str> = record.iter().collect();
        rows.push(indices.row(&cells));
    }
    Ok(rows)
}

pub fn read_reference_table(path: &Path) -> Result<Vec<ReferenceRow>, BibError> {
    let file = std::fs::File::open(path).map_err(|e| BibError::read(path, e))?;
    let rows = parse_reference_table(file)?;
    tracing::info!(path = %path.display(), rows = rows.len(), "loaded reference table");
    Ok(rows)
}

/// The rows of one worksheet of a reference workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSheet {
    pub name: String,
    pub rows: Vec<ReferenceRow>,
}

const SPREADSHEET_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];

pub fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SPREADSHEET_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

/// Read every worksheet of a reference workbook, in workbook order.
///
/// Worksheets without a `DOI` column are skipped with a warning. A CSV file
/// reads as a single sheet named after the file stem.
pub fn read_reference_sheets(path: &Path) -> Result<Vec<ReferenceSheet>, BibError> {
    if !is_spreadsheet(path) {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Sheet1".to_string());
        let rows = read_reference_table(path)?;
        return Ok(vec![ReferenceSheet { name, rows }]);
    }

    let mut workbook = open_workbook_auto(path)?;
    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&name)?;
        let mut cells = range.rows().map(|row| row.iter().map(cell_text).collect::<Vec<_>>());
        let Some(headers) = cells.next() else {
            tracing::warn!(sheet = %name, "skipping empty worksheet");
            continue;
        };
        let indices = match ColumnIndices::from_headers(&headers) {
            Ok(indices) => indices,
            Err(e) => {
                tracing::warn!(sheet = %name, error = %e, "skipping worksheet");
                continue;
            }
        };
        let rows: Vec<ReferenceRow> = cells.map(|row| indices.row(&row)).collect();
        tracing::debug!(sheet = %name, rows = rows.len(), "read worksheet");
        sheets.push(ReferenceSheet { name, rows });
    }

    if sheets.is_empty() {
        return Err(BibError::MissingColumn("DOI"));
    }
    tracing::info!(path = %path.display(), sheets = sheets.len(), "loaded reference workbook");
    Ok(sheets)
}

fn cell_text(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        Data::Float(f) if f.is_finite() && f.fract() == 0.0 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}
