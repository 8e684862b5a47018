use std::collections::{HashMap, HashSet};

use crate::BibEntry;

/// Counts reported by both deduplication modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupeStats {
    pub initial: usize,
    pub duplicates: usize,
    pub remaining: usize,
}

impl DedupeStats {
    fn new(initial: usize, remaining: usize) -> Self {
        Self {
            initial,
            duplicates: initial - remaining,
            remaining,
        }
    }
}

/// One entry per citation key. A later entry replaces an earlier one with the
/// same key but takes its position.
pub fn dedupe_by_key(entries: Vec<BibEntry>) -> (Vec<BibEntry>, DedupeStats) {
    let initial = entries.len();
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<BibEntry> = Vec::with_capacity(entries.len());

    for entry in entries {
        match position.get(&entry.key) {
            Some(&i) => unique[i] = entry,
            None => {
                position.insert(entry.key.clone(), unique.len());
                unique.push(entry);
            }
        }
    }

    let stats = DedupeStats::new(initial, unique.len());
    tracing::info!(
        initial = stats.initial,
        duplicates = stats.duplicates,
        remaining = stats.remaining,
        "removed duplicate keys"
    );
    (unique, stats)
}

/// Drop entries identical to an earlier one in key, type and every field.
pub fn dedupe_exact(entries: Vec<BibEntry>) -> (Vec<BibEntry>, DedupeStats) {
    let initial = entries.len();
    let mut seen: HashSet<BibEntry> = HashSet::with_capacity(entries.len());
    let mut unique: Vec<BibEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        if seen.insert(entry.clone()) {
            unique.push(entry);
        }
    }

    let stats = DedupeStats::new(initial, unique.len());
    tracing::info!(
        initial = stats.initial,
        duplicates = stats.duplicates,
        remaining = stats.remaining,
        "removed exact duplicates"
    );
    (unique, stats)
}
