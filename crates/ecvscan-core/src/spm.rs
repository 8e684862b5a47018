//! Summary for Policymakers (SPM) statements and the report sections behind them.
//!
//! An SPM text is a sequence of blank-line separated blocks. A statement block
//! starts with its id (`A`, `A.1`, `B.2.3`), then its text, then the supporting
//! report sections in braces:
//!
//! ```text
//! A.1 It is unequivocal that human influence has warmed the atmosphere.
//! {2.2, 2.3, Cross-Chapter Box 2.3}
//! ```

use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::CoreError;
use crate::section::truncate_section;

static STATEMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*([A-Z](?:\.\d{1,2})*)\s(.*?)\s*\{(.*)\}.*$").unwrap()
});

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpmStatement {
    pub id: String,
    /// Statement text on one line, whitespace runs collapsed.
    pub content: String,
    /// Report sections listed in the trailing braces.
    pub report_sections: Vec<String>,
}

impl SpmStatement {
    pub fn report_sections_joined(&self) -> String {
        self.report_sections.join("; ")
    }
}

/// Statement blocks of an SPM text. Blocks that are not statements (titles,
/// footnotes, blocks without a brace list) are skipped.
pub fn parse_spm(text: &str) -> Vec<SpmStatement> {
    let text = text.replace("\r\n", "\n");
    text.split("\n\n")
        .filter_map(|block| {
            let caps = STATEMENT_RE.captures(block)?;
            let content = WHITESPACE_RE.replace_all(&caps[2], " ").trim().to_string();
            let report_sections = caps[3]
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            Some(SpmStatement {
                id: caps[1].to_string(),
                content,
                report_sections,
            })
        })
        .collect()
}

pub fn load_spm(path: &Path) -> Result<Vec<SpmStatement>, CoreError> {
    let text = std::fs::read_to_string(path).map_err(|e| CoreError::read(path, e))?;
    let statements = parse_spm(&text);
    tracing::info!(path = %path.display(), statements = statements.len(), "parsed SPM");
    Ok(statements)
}

/// Entities supporting each statement, looked up in a section -> entities
/// index (see [`crate::section::entities_by_section`]).
///
/// A report section is looked up as written, then truncated to `depth`.
/// Entities are distinct per statement, in report-section order.
pub fn supporting_entities(
    statements: &[SpmStatement],
    index: &[(String, Vec<String>)],
    depth: usize,
) -> Vec<Vec<String>> {
    let lookup: HashMap<&str, &[String]> = index
        .iter()
        .map(|(section, entities)| (section.as_str(), entities.as_slice()))
        .collect();

    statements
        .iter()
        .map(|statement| {
            let mut entities: Vec<String> = Vec::new();
            for section in &statement.report_sections {
                let truncated = truncate_section(section, depth);
                let found = lookup
                    .get(section.as_str())
                    .or_else(|| lookup.get(truncated.as_str()));
                for entity in found.into_iter().flat_map(|e| e.iter()) {
                    if !entities.contains(entity) {
                        entities.push(entity.clone());
                    }
                }
            }
            tracing::debug!(id = %statement.id, entities = entities.len(), "mapped statement");
            entities
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPM: &str = "Summary for Policymakers\r\n\r\n\
A. The Current State of the Climate\r\n\r\n\
A.1 It is unequivocal that human influence has warmed\r\nthe atmosphere, ocean and land.\r\n{2.2, 2.3, Cross-Chapter Box 2.3, 3.3, 7.3}\r\n\r\n\
A.1.1 Observed increases in well-mixed   greenhouse gas concentrations. {5.2, 5.3} (Figure SPM.1)\r\n\r\n\
B.12 Not a statement without braces.\r\n";

    #[test]
    fn parses_statement_blocks() {
        let statements = parse_spm(SPM);
        assert_eq!(statements.len(), 2);

        let a1 = &statements[0];
        assert_eq!(a1.id, "A.1");
        assert_eq!(
            a1.content,
            "It is unequivocal that human influence has warmed the atmosphere, ocean and land."
        );
        assert_eq!(
            a1.report_sections,
            vec!["2.2", "2.3", "Cross-Chapter Box 2.3", "3.3", "7.3"]
        );

        let a11 = &statements[1];
        assert_eq!(a11.id, "A.1.1");
        assert_eq!(
            a11.content,
            "Observed increases in well-mixed greenhouse gas concentrations."
        );
        assert_eq!(a11.report_sections_joined(), "5.2; 5.3");
    }

    #[test]
    fn maps_statements_to_entities() {
        let statements = vec![SpmStatement {
            id: "A.1".into(),
            content: "x".into(),
            report_sections: vec!["2.3".into(), "3.3.1".into(), "9.9".into()],
        }];
        let index = vec![
            ("2.3".to_string(), vec!["10.1234/a".to_string(), "10.1234/b".to_string()]),
            ("3.3".to_string(), vec!["10.1234/b".to_string(), "10.1234/c".to_string()]),
        ];
        let mapped = supporting_entities(&statements, &index, 2);
        assert_eq!(mapped, vec![vec!["10.1234/a", "10.1234/b", "10.1234/c"]]);
    }
}
