use ecvscan_core::config_file::DEFAULT_PROJECT_ACRONYMS;

use crate::BibEntry;

/// Canonical spelling of `project` fields.
///
/// Values containing a known acronym marker are upper-cased, the spreadsheet
/// missing-value marker `nan` becomes empty, everything else is title-cased.
#[derive(Debug, Clone)]
pub struct ProjectNormalizer {
    acronyms: Vec<String>,
}

impl Default for ProjectNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_PROJECT_ACRONYMS.iter().copied())
    }
}

impl ProjectNormalizer {
    pub fn new<I, S>(acronyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            acronyms: acronyms
                .into_iter()
                .map(|a| a.as_ref().trim().to_lowercase())
                .filter(|a| !a.is_empty())
                .collect(),
        }
    }

    pub fn normalize(&self, raw: &str) -> String {
        let value = raw.trim().to_lowercase();
        if self.acronyms.iter().any(|a| value.contains(a.as_str())) {
            value.to_uppercase()
        } else if value == "nan" {
            String::new()
        } else {
            title_case(&value)
        }
    }

    /// Rewrite the project of every entry. Returns how many values changed.
    pub fn apply(&self, entries: &mut [BibEntry]) -> usize {
        let mut changed = 0;
        for entry in entries.iter_mut() {
            let normalized = self.normalize(&entry.project);
            if normalized != entry.project {
                tracing::debug!(key = %entry.key, from = %entry.project, to = %normalized, "project renamed");
                entry.project = normalized;
                changed += 1;
            }
        }
        changed
    }
}

/// Upper-case the first letter of every alphabetic run: `sea-ice cci` -> `Sea-Ice Cci`.
fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_alpha = false;
    for c in value.chars() {
        if c.is_alphabetic() && !prev_alpha {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        prev_alpha = c.is_alphabetic();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acronym_marker_upper_cases() {
        let n = ProjectNormalizer::default();
        assert_eq!(n.normalize("Reccap-2 "), "RECCAP-2");
        assert_eq!(n.normalize("sst cci"), "SST CCI");
        assert_eq!(n.normalize("GHG"), "GHG");
    }

    #[test]
    fn nan_becomes_empty() {
        let n = ProjectNormalizer::default();
        assert_eq!(n.normalize("nan"), "");
        assert_eq!(n.normalize(" NaN "), "");
        assert_eq!(n.normalize("Ocean Colour"), "Ocean Colour");
    }

    #[test]
    fn other_values_are_title_cased() {
        let n = ProjectNormalizer::default();
        assert_eq!(n.normalize("SOIL MOISTURE"), "Soil Moisture");
        assert_eq!(n.normalize("sea-ice"), "Sea-Ice");
        assert_eq!(n.normalize("o3"), "O3");
    }

    #[test]
    fn apply_counts_changes() {
        let mut a = BibEntry::new("a", "article");
        a.project = "aerosol".into();
        let mut b = BibEntry::new("b", "article");
        b.project = "Aerosol".into();
        let mut entries = vec![a, b];
        let changed = ProjectNormalizer::new(["cmug"]).apply(&mut entries);
        assert_eq!(changed, 1);
        assert!(entries.iter().all(|e| e.project == "Aerosol"));
    }
}
