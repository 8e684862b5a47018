use std::io::Write;
use std::path::PathBuf;

use ecvscan_bib::{DedupeStats, FetchSummary, MergeReport};
use ecvscan_core::SkippedDocument;
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

fn heading(w: &mut dyn Write, title: &str, color: ColorMode) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{}", title.bold())
    } else {
        writeln!(w, "{}", title)
    }
}

fn count_line(
    w: &mut dyn Write,
    label: &str,
    value: usize,
    warn: bool,
    color: ColorMode,
) -> std::io::Result<()> {
    if color.enabled() && warn && value > 0 {
        writeln!(w, "  {:<24} {}", label, value.yellow())
    } else {
        writeln!(w, "  {:<24} {}", label, value)
    }
}

pub fn print_warning(w: &mut dyn Write, message: &str, color: ColorMode) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{} {}", "WARNING:".yellow(), message)
    } else {
        writeln!(w, "WARNING: {}", message)
    }
}

/// Files produced by a command.
pub fn print_written(w: &mut dyn Write, paths: &[PathBuf], color: ColorMode) -> std::io::Result<()> {
    for path in paths {
        if color.enabled() {
            writeln!(w, "{} {}", "Wrote".green(), path.display())?;
        } else {
            writeln!(w, "Wrote {}", path.display())?;
        }
    }
    Ok(())
}

pub fn print_scan_summary(
    w: &mut dyn Write,
    terms: usize,
    documents: usize,
    groups: usize,
    skipped: &[SkippedDocument],
    color: ColorMode,
) -> std::io::Result<()> {
    heading(w, "Scan summary", color)?;
    count_line(w, "Terms", terms, false, color)?;
    count_line(w, "Documents scanned", documents, false, color)?;
    count_line(w, "Sheets", groups, false, color)?;
    count_line(w, "Documents skipped", skipped.len(), true, color)?;
    for doc in skipped {
        if color.enabled() {
            writeln!(w, "    {} {}", doc.id.dimmed(), doc.reason.dimmed())?;
        } else {
            writeln!(w, "    {} {}", doc.id, doc.reason)?;
        }
    }
    Ok(())
}

pub fn print_merge_report(
    w: &mut dyn Write,
    report: &MergeReport,
    total: usize,
    color: ColorMode,
) -> std::io::Result<()> {
    heading(w, "Merge summary", color)?;
    count_line(w, "New DOIs", report.added, false, color)?;
    count_line(w, "Projects filled in", report.project_filled, false, color)?;
    count_line(w, "Added for new project", report.added_for_project, false, color)?;
    count_line(w, "Added without DOI", report.added_without_doi, true, color)?;
    count_line(w, "Already present", report.skipped, false, color)?;
    count_line(w, "Entries in result", total, false, color)?;
    Ok(())
}

pub fn print_dedupe_stats(
    w: &mut dyn Write,
    stats: &DedupeStats,
    color: ColorMode,
) -> std::io::Result<()> {
    heading(w, "Deduplication summary", color)?;
    count_line(w, "Initial entries", stats.initial, false, color)?;
    count_line(w, "Duplicates removed", stats.duplicates, true, color)?;
    count_line(w, "Remaining entries", stats.remaining, false, color)?;
    Ok(())
}

pub fn print_fetch_summary(
    w: &mut dyn Write,
    summary: &FetchSummary,
    fetched: usize,
    color: ColorMode,
) -> std::io::Result<()> {
    heading(w, "Fetch summary", color)?;
    count_line(w, "Entries written", fetched, false, color)?;
    count_line(w, "Looked up by DOI", summary.with_doi, false, color)?;
    count_line(w, "Recovered by query", summary.recovered, true, color)?;
    count_line(w, "HTTP errors", summary.fetch_errors, true, color)?;
    count_line(w, "Other errors", summary.other_errors, true, color)?;
    count_line(w, "Not found", summary.not_found, true, color)?;
    if summary.recovered > 0 {
        writeln!(w)?;
        print_warning(
            w,
            "records recovered by free-text query should be checked by hand",
            color,
        )?;
    }
    Ok(())
}

/// Generic `label: value` lines under a heading.
pub fn print_counts(
    w: &mut dyn Write,
    title: &str,
    counts: &[(&str, usize)],
    color: ColorMode,
) -> std::io::Result<()> {
    heading(w, title, color)?;
    for (label, value) in counts {
        count_line(w, label, *value, false, color)?;
    }
    Ok(())
}
