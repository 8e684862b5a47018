use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{BibEntry, BibError};

/// Read and parse a `.bib` file.
pub fn load_bibliography(path: &Path) -> Result<Vec<BibEntry>, BibError> {
    let content = std::fs::read_to_string(path).map_err(|e| BibError::read(path, e))?;
    let entries = parse_bibliography(&content)?;
    tracing::debug!(path = %path.display(), entries = entries.len(), "parsed bibliography");
    Ok(entries)
}

/// Parse `.bib` content, keeping file order and duplicate keys.
///
/// Field values are kept as written in the source, braces and math included,
/// so a parse-write cycle does not alter them.
pub fn parse_bibliography(content: &str) -> Result<Vec<BibEntry>, BibError> {
    // Try parsing the whole file first (fast path)
    let entries = match biblatex::RawBibliography::parse(content) {
        Ok(raw) => entries_from_raw(&raw),
        Err(e) => {
            // A syntax error fails the whole-file parse; parsing entry by
            // entry recovers the rest.
            tracing::debug!(error = ?e.kind, "whole-file parse failed, parsing entries individually");
            parse_entries_individually(content)
        }
    };

    if entries.is_empty() {
        return Err(BibError::NoEntries);
    }
    Ok(entries)
}

fn parse_entries_individually(content: &str) -> Vec<BibEntry> {
    static ENTRY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^@[a-zA-Z]").unwrap());

    let positions: Vec<usize> = ENTRY_RE.find_iter(content).map(|m| m.start()).collect();
    let mut entries = Vec::new();

    for (i, &start) in positions.iter().enumerate() {
        let end = positions.get(i + 1).copied().unwrap_or(content.len());
        let chunk = &content[start..end];
        match biblatex::RawBibliography::parse(chunk) {
            Ok(raw) => entries.extend(entries_from_raw(&raw)),
            Err(e) => {
                let head: String = chunk.chars().take(60).collect();
                tracing::warn!(error = ?e.kind, entry = %head.trim(), "skipping unparsable entry");
            }
        }
    }
    entries
}

fn entries_from_raw(raw: &biblatex::RawBibliography<'_>) -> Vec<BibEntry> {
    // `@string` definitions may refer to earlier ones.
    let mut abbreviations: HashMap<String, String> = HashMap::new();
    for pair in &raw.abbreviations {
        let value = field_text(&pair.value.v, &abbreviations);
        abbreviations.insert(pair.key.v.to_ascii_lowercase(), value);
    }

    raw.entries
        .iter()
        .map(|spanned| {
            let entry = &spanned.v;
            let mut out = BibEntry::new(entry.key.v, entry.kind.v.to_ascii_lowercase());
            for pair in &entry.fields {
                out.set_field(pair.key.v, field_text(&pair.value.v, &abbreviations));
            }
            out
        })
        .collect()
}

/// Source text of a field value, with `#` concatenations joined and
/// abbreviations replaced by their definitions. Unknown abbreviations (month
/// names, for one) are kept by name.
fn field_text(field: &biblatex::Field<'_>, abbreviations: &HashMap<String, String>) -> String {
    field
        .iter()
        .map(|chunk| match &chunk.v {
            biblatex::RawChunk::Normal(s) => s.to_string(),
            biblatex::RawChunk::Abbreviation(name) => abbreviations
                .get(&name.to_ascii_lowercase())
                .cloned()
                .unwrap_or_else(|| name.to_string()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
@article{smith2020,
  author = {Smith, John and Doe, Jane},
  title = {Ocean heat content},
  journal = {Nature},
  year = {2020},
  doi = {10.1038/abc},
  project = {Sea Level}
}

@misc{report2019,
  title = {A report},
  year = {2019}
}
"#;

    #[test]
    fn parses_typed_fields_in_order() {
        let entries = parse_bibliography(SAMPLE).unwrap();
        assert_eq!(entries.len(), 2);
        let e = &entries[0];
        assert_eq!(e.key, "smith2020");
        assert_eq!(e.entry_type, "article");
        assert_eq!(e.doi.as_deref(), Some("10.1038/abc"));
        assert_eq!(e.project, "Sea Level");
        assert_eq!(e.first_author_family().as_deref(), Some("Smith"));
        assert_eq!(entries[1].key, "report2019");
        assert!(entries[1].doi.is_none());
    }

    #[test]
    fn duplicate_keys_are_kept() {
        let content = "@misc{a,\n  title = {One}\n}\n@misc{a,\n  title = {Two}\n}\n";
        let entries = parse_bibliography(content).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].title.as_deref(), Some("Two"));
    }

    #[test]
    fn broken_entry_does_not_lose_the_rest() {
        let content = "@misc{good,\n  title = {Kept}\n}\n@misc{bad,\n  title = {Unclosed\n}\n@misc{also,\n  title = {Kept too}\n}\n";
        let entries = parse_bibliography(content).unwrap();
        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert!(keys.contains(&"good"));
        assert!(keys.contains(&"also"));
    }

    #[test]
    fn field_text_is_kept_verbatim() {
        let content = "@Article{k,\n  title = {The {IPCC} budget of CO$_2$},\n  note = \"a \\& b\"\n}\n";
        let entries = parse_bibliography(content).unwrap();
        assert_eq!(entries[0].entry_type, "article");
        assert_eq!(
            entries[0].title.as_deref(),
            Some("The {IPCC} budget of CO$_2$")
        );
        assert_eq!(entries[0].field("note"), Some("a \\& b"));
    }

    #[test]
    fn string_abbreviations_are_resolved() {
        let content = "@string{ipcc = {Intergovernmental Panel}}\n@misc{k,\n  publisher = ipcc # { report},\n  month = jan,\n  year = 2021\n}\n";
        let entries = parse_bibliography(content).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].field("publisher"), Some("Intergovernmental Panel report"));
        assert_eq!(entries[0].field("month"), Some("jan"));
        assert_eq!(entries[0].year.as_deref(), Some("2021"));
    }

    #[test]
    fn empty_content_has_no_entries() {
        assert!(matches!(parse_bibliography("% nothing"), Err(BibError::NoEntries)));
    }
}
