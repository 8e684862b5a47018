use std::fmt::Write as _;
use std::path::Path;

use crate::{BibEntry, BibError};

/// Render entries as BibTeX, in the given order, fields sorted by name.
pub fn write_bibliography(entries: &[BibEntry]) -> String {
    let mut out = String::new();
    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let entry_type = if entry.entry_type.is_empty() {
            "misc"
        } else {
            entry.entry_type.as_str()
        };
        let _ = writeln!(out, "@{}{{{},", entry_type, entry.key);
        for (name, value) in entry.fields() {
            let _ = writeln!(out, "  {name} = {{{}}},", value.trim());
        }
        out.push_str("}\n");
    }
    out
}

pub fn save_bibliography(path: &Path, entries: &[BibEntry]) -> Result<(), BibError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| BibError::write(parent, e))?;
    }
    std::fs::write(path, write_bibliography(entries)).map_err(|e| BibError::write(path, e))?;
    tracing::info!(path = %path.display(), entries = entries.len(), "wrote bibliography");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_bibliography;

    #[test]
    fn stable_field_order() {
        let mut e = BibEntry::new("10.1_x", "article");
        e.set_field("year", "2021");
        e.set_field("title", "Snow cover");
        e.set_field("doi", "10.1/x");
        e.set_field("project", "Snow");
        let text = write_bibliography(&[e]);
        assert_eq!(
            text,
            "@article{10.1_x,\n  doi = {10.1/x},\n  project = {Snow},\n  title = {Snow cover},\n  year = {2021},\n}\n"
        );
    }

    #[test]
    fn written_entries_parse_back() {
        let mut a = BibEntry::new("a", "article");
        a.set_field("author", "Smith, John");
        a.set_field("doi", "10.1/a");
        let mut b = BibEntry::new("b", "misc");
        b.set_field("note", "extra field");
        let parsed = parse_bibliography(&write_bibliography(&[a.clone(), b.clone()])).unwrap();
        assert_eq!(parsed, vec![a, b]);
    }

    #[test]
    fn rewrite_keeps_math_and_protected_case() {
        let source = "@article{k,\n  title = {The {IPCC} budget of CO$_2$},\n  doi = {10.1234/k}\n}\n";
        let out = write_bibliography(&parse_bibliography(source).unwrap());
        assert!(out.contains("  title = {The {IPCC} budget of CO$_2$},\n"));
        assert_eq!(write_bibliography(&parse_bibliography(&out).unwrap()), out);
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/tags/wg1.bib");
        save_bibliography(&path, &[BibEntry::new("k", "misc")]).unwrap();
        assert!(std::fs::read_to_string(path).unwrap().starts_with("@misc{k,"));
    }
}
