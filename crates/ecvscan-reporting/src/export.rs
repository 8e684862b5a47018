use std::io::Write;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::XlsxError;
use serde_json::{Map, Value};

use crate::ReportError;
use crate::types::{Cell, ExportFormat, Sheet, Workbook};

/// Longest worksheet name a spreadsheet accepts.
const MAX_WORKSHEET_NAME: usize = 31;

/// Write `workbook` in `format` and return the files created.
///
/// XLSX, JSON and Markdown go to `path` itself. CSV writes one file per sheet
/// next to it, named `<stem>_<sheet>.csv`.
pub fn export_workbook(
    workbook: &Workbook,
    format: ExportFormat,
    path: &Path,
) -> Result<Vec<PathBuf>, ReportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ReportError::io(parent, e))?;
    }

    let written = match format {
        ExportFormat::Xlsx => {
            export_xlsx(workbook, path)?;
            vec![path.to_path_buf()]
        }
        ExportFormat::Json => {
            write_file(path, export_json(workbook)?.as_bytes())?;
            vec![path.to_path_buf()]
        }
        ExportFormat::Markdown => {
            write_file(path, export_markdown(workbook).as_bytes())?;
            vec![path.to_path_buf()]
        }
        ExportFormat::Csv => {
            let mut written = Vec::with_capacity(workbook.sheets.len());
            for sheet in &workbook.sheets {
                let target = csv_path(path, sheet);
                let file =
                    std::fs::File::create(&target).map_err(|e| ReportError::io(&target, e))?;
                write_csv(sheet, file)?;
                written.push(target);
            }
            written
        }
    };

    for file in &written {
        tracing::info!(path = %file.display(), format = %format, "wrote report");
    }
    Ok(written)
}

fn write_file(path: &Path, content: &[u8]) -> Result<(), ReportError> {
    let mut file = std::fs::File::create(path).map_err(|e| ReportError::io(path, e))?;
    file.write_all(content).map_err(|e| ReportError::io(path, e))
}

/// File-name-safe form of a sheet name.
fn file_component(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn csv_path(path: &Path, sheet: &Sheet) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "report".to_string());
    path.with_file_name(format!("{stem}_{}.csv", file_component(&sheet.name)))
}

/// Worksheet names for every sheet: spreadsheet-safe, at most 31
/// characters and unique ignoring case.
fn worksheet_names(workbook: &Workbook) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(workbook.sheets.len());
    for sheet in &workbook.sheets {
        let cleaned: String = sheet
            .name
            .chars()
            .map(|c| match c {
                '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
                c => c,
            })
            .collect();
        let cleaned = cleaned.trim_matches('\'').trim();
        let base: String = if cleaned.is_empty() {
            "Sheet".to_string()
        } else {
            cleaned.chars().take(MAX_WORKSHEET_NAME).collect()
        };

        let taken = |candidate: &str| names.iter().any(|n| n.eq_ignore_ascii_case(candidate));
        let mut name = base.clone();
        let mut n = 2;
        while taken(&name) {
            let suffix = format!("_{n}");
            let keep = MAX_WORKSHEET_NAME - suffix.len();
            name = format!("{}{suffix}", base.chars().take(keep).collect::<String>());
            n += 1;
        }
        names.push(name);
    }
    names
}

/// One worksheet per sheet, header on the first row. Counts are written as
/// numbers, empty cells are left blank.
pub fn export_xlsx(workbook: &Workbook, path: &Path) -> Result<(), ReportError> {
    let mut xlsx = rust_xlsxwriter::Workbook::new();

    for (sheet, name) in workbook.sheets.iter().zip(worksheet_names(workbook)) {
        let worksheet = xlsx.add_worksheet();
        worksheet.set_name(&name)?;
        for (col, column) in sheet.columns.iter().enumerate() {
            worksheet.write_string(0, column_number(col)?, column)?;
        }

        for (i, row) in sheet.rows.iter().enumerate() {
            let row_number = u32::try_from(i + 1).map_err(|_| XlsxError::RowColumnLimitError)?;
            for (col, cell) in row.iter().enumerate() {
                let col = column_number(col)?;
                match cell {
                    Cell::Text(text) => {
                        worksheet.write_string(row_number, col, text)?;
                    }
                    Cell::Count(n) => {
                        worksheet.write_number(row_number, col, *n as f64)?;
                    }
                    Cell::Empty => {}
                }
            }
        }
    }

    xlsx.save(path)?;
    Ok(())
}

fn column_number(col: usize) -> Result<u16, XlsxError> {
    u16::try_from(col).map_err(|_| XlsxError::RowColumnLimitError)
}

/// Header row plus one record per row.
pub fn write_csv<W: Write>(sheet: &Sheet, writer: W) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(&sheet.columns)?;
    for row in &sheet.rows {
        writer.write_record(row.iter().map(|c| c.render()))?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// `{ "<sheet>": [ { "<column>": value, ... }, ... ], ... }`, sheets and
/// columns in workbook order.
pub fn export_json(workbook: &Workbook) -> Result<String, ReportError> {
    let mut root = Map::new();
    for sheet in &workbook.sheets {
        let rows: Vec<Value> = sheet
            .rows
            .iter()
            .map(|row| -> Result<Value, serde_json::Error> {
                let mut object = Map::new();
                for (column, cell) in sheet.columns.iter().zip(row) {
                    object.insert(column.clone(), serde_json::to_value(cell)?);
                }
                Ok(Value::Object(object))
            })
            .collect::<Result<_, _>>()?;
        root.insert(sheet.name.clone(), Value::Array(rows));
    }
    Ok(serde_json::to_string_pretty(&Value::Object(root))?)
}

fn md_escape(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}

/// One `##` heading and pipe table per sheet.
pub fn export_markdown(workbook: &Workbook) -> String {
    let mut out = String::new();
    for sheet in &workbook.sheets {
        out.push_str(&format!("## {}\n\n", sheet.name));
        if sheet.columns.is_empty() {
            continue;
        }
        let header: Vec<String> = sheet.columns.iter().map(|c| md_escape(c)).collect();
        out.push_str(&format!("| {} |\n", header.join(" | ")));
        out.push_str(&format!("|{}\n", "---|".repeat(sheet.columns.len())));
        for row in &sheet.rows {
            let cells: Vec<String> = row.iter().map(|c| md_escape(&c.render())).collect();
            out.push_str(&format!("| {} |\n", cells.join(" | ")));
        }
        out.push('\n');
    }
    out
}
