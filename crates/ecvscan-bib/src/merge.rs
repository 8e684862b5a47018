use std::collections::{HashMap, HashSet};

use crate::BibEntry;

/// What happened to the incoming entries of a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Entries with a DOI not yet present.
    pub added: usize,
    /// Existing entries without a project that took the incoming project.
    pub project_filled: usize,
    /// Same DOI, different non-empty project: kept as an extra entry.
    pub added_for_project: usize,
    /// Entries without a DOI, always appended.
    pub added_without_doi: usize,
    /// Same DOI and same project, or an empty incoming project.
    pub skipped: usize,
}

fn same_project(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// First free key among `base`, `base_2`, `base_3`, ...
fn unique_key(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}_{n}"))
        .find(|k| !taken.contains(k))
        .unwrap_or_else(|| base.to_string())
}

/// Merge `incoming` into `base`, keyed on the normalised DOI.
///
/// * unseen DOI: appended;
/// * same DOI, existing project empty, incoming non-empty: the existing entry
///   takes the incoming project;
/// * same DOI, a different non-empty project: appended as an additional entry
///   under a suffixed key;
/// * same DOI and project, or empty incoming project: dropped;
/// * no DOI: appended.
///
/// Keys stay unique across the result.
pub fn merge_collections(
    base: Vec<BibEntry>,
    incoming: Vec<BibEntry>,
) -> (Vec<BibEntry>, MergeReport) {
    let mut merged = base;
    let mut report = MergeReport::default();
    let mut taken: HashSet<String> = merged.iter().map(|e| e.key.clone()).collect();
    let mut by_doi: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, entry) in merged.iter().enumerate() {
        if let Some(doi) = entry.doi_key() {
            by_doi.entry(doi).or_default().push(i);
        }
    }

    for mut entry in incoming {
        let Some(doi) = entry.doi_key() else {
            entry.key = unique_key(&entry.key, &taken);
            taken.insert(entry.key.clone());
            merged.push(entry);
            report.added_without_doi += 1;
            continue;
        };

        let Some(existing) = by_doi.get(&doi).cloned() else {
            entry.key = unique_key(&entry.key, &taken);
            taken.insert(entry.key.clone());
            by_doi.entry(doi).or_default().push(merged.len());
            merged.push(entry);
            report.added += 1;
            continue;
        };

        if entry.project.trim().is_empty()
            || existing
                .iter()
                .any(|&i| same_project(&merged[i].project, &entry.project))
        {
            tracing::debug!(doi = %doi, project = %entry.project, "already present");
            report.skipped += 1;
            continue;
        }

        if let Some(&i) = existing
            .iter()
            .find(|&&i| merged[i].project.trim().is_empty())
        {
            tracing::debug!(doi = %doi, project = %entry.project, "filling empty project");
            merged[i].project = entry.project;
            report.project_filled += 1;
            continue;
        }

        entry.key = unique_key(&entry.key, &taken);
        taken.insert(entry.key.clone());
        if let Some(indices) = by_doi.get_mut(&doi) {
            indices.push(merged.len());
        }
        tracing::debug!(doi = %doi, key = %entry.key, project = %entry.project, "added for another project");
        merged.push(entry);
        report.added_for_project += 1;
    }

    tracing::info!(
        added = report.added,
        project_filled = report.project_filled,
        added_for_project = report.added_for_project,
        added_without_doi = report.added_without_doi,
        skipped = report.skipped,
        "merged bibliographies"
    );
    (merged, report)
}
