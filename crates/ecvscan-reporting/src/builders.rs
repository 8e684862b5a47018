//! Turn scan and reconciliation results into sheets.

use ecvscan_bib::BibEntry;
use ecvscan_bib::reconcile::{AttributedEntry, SectionedReference, TagMatch};
use ecvscan_bib::reference_table::ReferenceRow;
use ecvscan_core::columns::sort_columns;
use ecvscan_core::section::{EntitySections, entities_by_section, publication_counts_by_section};
use ecvscan_core::{CitationCounts, OccurrenceMatrix, SpmStatement, TagGroup, Taxonomy};

use crate::types::{Cell, Sheet, Workbook};

const ENTRY_COLUMNS: [&str; 6] = ["Project", "DOI", "Title", "Year", "Author", "Journal"];

/// `Term` column followed by one count column per document, in column order.
///
/// With a taxonomy, `Category` and `Subcategory` columns come first.
pub fn matrix_sheet(name: &str, matrix: &OccurrenceMatrix, taxonomy: Option<&Taxonomy>) -> Sheet {
    let mut documents: Vec<&str> = matrix.documents().iter().map(String::as_str).collect();
    sort_columns(&mut documents);
    let ordered = matrix.select_documents(&documents);

    let leading: &[&str] = match taxonomy {
        Some(_) => &["Category", "Subcategory", "Term"],
        None => &["Term"],
    };
    let mut sheet = Sheet::new(
        name,
        leading.iter().copied().chain(documents.iter().copied()),
    );
    for term in ordered.terms() {
        let mut row = Vec::with_capacity(leading.len() + documents.len());
        if let Some(taxonomy) = taxonomy {
            let (category, subcategory) = taxonomy.classify(term);
            row.push(Cell::text(category));
            row.push(Cell::text(subcategory));
        }
        row.push(Cell::Text(term.clone()));
        if let Some(counts) = ordered.row(term) {
            row.extend(counts.iter().map(|&n| Cell::Count(n)));
        }
        sheet.push_row(row);
    }
    sheet
}

/// One sheet per tag group. Groups without documents are left out.
pub fn matrix_workbook(
    matrix: &OccurrenceMatrix,
    groups: &[TagGroup],
    taxonomy: Option<&Taxonomy>,
) -> Workbook {
    let mut workbook = Workbook::new();
    for group in groups {
        let selected = matrix.select_documents(&group.documents);
        if selected.documents().is_empty() {
            tracing::debug!(tag = %group.tag, "no readable documents, skipping sheet");
            continue;
        }
        workbook.push(matrix_sheet(&group.tag, &selected, taxonomy));
    }
    workbook
}

fn entry_cells(entry: &BibEntry) -> Vec<Cell> {
    vec![
        Cell::text(entry.project.as_str()),
        Cell::text(entry.doi.clone().unwrap_or_default()),
        Cell::text(entry.title.clone().unwrap_or_default()),
        Cell::text(entry.year.clone().unwrap_or_default()),
        Cell::text(entry.author.clone().unwrap_or_default()),
        Cell::text(entry.journal.clone().unwrap_or_default()),
    ]
}

/// Bibliography entries as a plain metadata table.
pub fn entries_sheet(name: &str, entries: &[BibEntry]) -> Sheet {
    let mut sheet = Sheet::new(name, ENTRY_COLUMNS);
    for entry in entries {
        sheet.push_row(entry_cells(entry));
    }
    sheet
}

/// Master entries with the `;`-joined chapters citing them.
pub fn attribution_sheet(entries: &[AttributedEntry<'_>]) -> Sheet {
    let mut sheet = Sheet::new(
        "Attribution",
        ENTRY_COLUMNS.iter().copied().chain(["Chapters"]),
    );
    for attributed in entries {
        let mut row = entry_cells(attributed.entry);
        row.push(Cell::text(attributed.chapters_joined()));
        sheet.push_row(row);
    }
    sheet
}

pub fn tag_match_workbook(matches: &[TagMatch]) -> Workbook {
    Workbook {
        sheets: matches
            .iter()
            .map(|m| entries_sheet(&m.tag, &m.entries))
            .collect(),
    }
}

/// Reference rows, one line each; multi-valued cells are `;`-joined.
pub fn reference_sheet(name: &str, rows: &[ReferenceRow]) -> Sheet {
    let mut sheet = Sheet::new(
        name,
        [
            "Project",
            "DOI",
            "Title",
            "Year",
            "Author",
            "First Author",
            "Journal",
            "Chapters",
            "Sections",
        ],
    );
    for row in rows {
        sheet.push_row(vec![
            Cell::text(row.project.as_str()),
            Cell::text(row.doi.as_str()),
            Cell::text(row.title.as_str()),
            Cell::text(row.year.as_str()),
            Cell::text(row.author.as_str()),
            Cell::text(row.first_author.as_str()),
            Cell::text(row.journal.as_str()),
            Cell::text(row.chapters_joined()),
            Cell::text(row.sections.join(";")),
        ]);
    }
    sheet
}

/// References with the sections, section titles and lines their citations were found on.
pub fn section_sheet(name: &str, references: &[SectionedReference]) -> Sheet {
    let mut sheet = Sheet::new(
        name,
        [
            "Project",
            "DOI",
            "First Author",
            "Year",
            "Chapters",
            "Sections",
            "Section Names",
            "Context",
        ],
    );
    for reference in references {
        let row = &reference.row;
        let (sections, names, context) = match &reference.summary {
            Some(s) => (s.sections_joined(), s.names_joined(), s.contexts_joined()),
            None => Default::default(),
        };
        sheet.push_row(vec![
            Cell::text(row.project.as_str()),
            Cell::text(row.doi.as_str()),
            Cell::text(row.first_author.as_str()),
            Cell::text(row.year.as_str()),
            Cell::text(row.chapters_joined()),
            Cell::text(sections),
            Cell::text(names),
            Cell::text(context),
        ]);
    }
    sheet
}

/// Section -> DOIs (`<name> DOIs`) and section -> publication count
/// (`<name> counts`), sections truncated to `depth`.
pub fn section_index_sheets(name: &str, rows: &[EntitySections], depth: usize) -> Workbook {
    let mut by_section = Sheet::new(&format!("{name} DOIs"), ["Section", "DOIs", "Count"]);
    for (section, dois) in entities_by_section(rows, depth) {
        let count = dois.len();
        by_section.push_row(vec![
            Cell::Text(section),
            Cell::text(dois.join("; ")),
            Cell::Count(count),
        ]);
    }

    let mut counts = Sheet::new(&format!("{name} counts"), ["Section", "Publications"]);
    for (section, n) in publication_counts_by_section(rows, depth) {
        counts.push_row(vec![Cell::Text(section), Cell::Count(n)]);
    }

    Workbook {
        sheets: vec![by_section, counts],
    }
}

/// Per-chapter citation counts next to each reference. `counts` is parallel to `rows`.
pub fn citation_sheet(name: &str, rows: &[ReferenceRow], counts: &[CitationCounts]) -> Sheet {
    let mut sheet = Sheet::new(
        name,
        [
            "Project",
            "DOI",
            "First Author",
            "Year",
            "Chapters",
            "File Counts",
            "Total Count",
        ],
    );
    for (row, count) in rows.iter().zip(counts) {
        sheet.push_row(vec![
            Cell::text(row.project.as_str()),
            Cell::text(row.doi.as_str()),
            Cell::text(row.first_author.as_str()),
            Cell::text(row.year.as_str()),
            Cell::text(row.chapters_joined()),
            Cell::text(count.render()),
            Cell::Count(count.total),
        ]);
    }
    sheet
}

/// SPM statements with the DOIs supporting them. `dois` is parallel to `statements`.
pub fn spm_sheet(name: &str, statements: &[SpmStatement], dois: &[Vec<String>]) -> Sheet {
    let mut sheet = Sheet::new(
        name,
        ["SPM section", "Content", "Report sections", "References", "Count"],
    );
    for (statement, dois) in statements.iter().zip(dois) {
        sheet.push_row(vec![
            Cell::text(statement.id.as_str()),
            Cell::text(statement.content.as_str()),
            Cell::text(statement.report_sections_joined()),
            Cell::text(dois.join(";")),
            Cell::Count(dois.len()),
        ]);
    }
    sheet
}
