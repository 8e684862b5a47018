use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use ecvscan_bib::crossref::{CrossRefClient, CrossRefConfig, DEFAULT_BASE_URL, FetchEvent};
use ecvscan_bib::reconcile::{
    ChapterTexts, count_citations, expand_chapters, load_chapter_sources, locate_sections,
};
use ecvscan_bib::reference_table::{ReferenceRow, read_reference_sheets};
use ecvscan_bib::{
    ProjectNormalizer, attribute_chapters, collect_tag_dois, dedupe_by_key, dedupe_exact,
    load_bibliography, match_by_tag, merge_collections, save_bibliography, write_doi_lists,
};
use ecvscan_core::config_file::{self, ConfigFile};
use ecvscan_core::section::{EntitySections, entities_by_section, split_at_references};
use ecvscan_core::{
    PatternSet, ScanConfig, SectionHeader, Taxonomy, Vocabulary, load_spm, scan_directory,
    supporting_entities, tags,
};
use ecvscan_reporting::{
    ExportFormat, Workbook, attribution_sheet, citation_sheet, export_workbook, matrix_workbook,
    reference_sheet, section_index_sheets, section_sheet, spm_sheet, tag_match_workbook,
};
use tracing_subscriber::EnvFilter;

mod output;

use output::ColorMode;

/// ECV vocabulary scanner and report bibliography reconciler
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

/// Where and how a workbook is written.
#[derive(Args, Debug)]
struct OutputArgs {
    /// Output path; CSV output writes `<stem>_<sheet>.csv` next to it
    #[arg(short, long)]
    output: PathBuf,

    /// xlsx, csv, json or markdown (default: from the output extension, else xlsx)
    #[arg(long)]
    format: Option<ExportFormat>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Count vocabulary terms in every document of a corpus directory
    Scan {
        /// JSON object mapping each term to its aliases
        vocabulary: PathBuf,

        /// Directory of plain-text documents
        corpus: PathBuf,

        #[command(flatten)]
        out: OutputArgs,

        /// Comma-separated ordered tag list; the first tag in a file name wins
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,

        /// Built-in tag list (ar6, ars)
        #[arg(long, conflicts_with = "tags")]
        preset: Option<String>,

        /// Document file extension
        #[arg(long)]
        extension: Option<String>,

        /// Write a single sheet instead of one per tag
        #[arg(long)]
        no_group: bool,

        /// JSON taxonomy (category -> subcategory -> terms); adds Category
        /// and Subcategory columns
        #[arg(long)]
        taxonomy: Option<PathBuf>,
    },

    /// Locate the sections of the chapters citing each reference
    Sections {
        /// Reference table, CSV or a workbook read sheet by sheet
        /// (DOI, First Author or Author, Year, Chapters)
        table: PathBuf,

        /// Directory of chapter texts named `<tag>_ch<n>.txt`
        texts: PathBuf,

        #[command(flatten)]
        out: OutputArgs,

        /// Only chapter texts whose name contains this tag
        #[arg(long)]
        tag: Option<String>,

        /// Section header regex: group 1 is the id, the last group the title
        #[arg(long)]
        header_pattern: Option<String>,

        /// Document file extension
        #[arg(long)]
        extension: Option<String>,
    },

    /// Invert a sections table into section -> DOIs and section counts
    SectionIndex {
        /// Table with DOI and Sections columns, CSV or a workbook read sheet by sheet
        table: PathBuf,

        #[command(flatten)]
        out: OutputArgs,

        /// Section id components to keep (10.2.3 -> 10.2 at depth 2)
        #[arg(long)]
        depth: Option<usize>,
    },

    /// Attribute master bibliography entries to the chapters citing them
    Attribute {
        /// Master .bib file
        master: PathBuf,

        /// Directory of chapter .bib files
        chapters: PathBuf,

        #[command(flatten)]
        out: OutputArgs,

        /// Only chapter files whose name contains this tag
        #[arg(long)]
        tag: Option<String>,

        /// Add a sheet with one row per attributed chapter
        #[arg(long)]
        expand: bool,
    },

    /// Split the master bibliography by the tags of the chapter files citing it
    MatchTags {
        /// Master .bib file
        master: PathBuf,

        /// Directory of chapter .bib files
        chapters: PathBuf,

        #[command(flatten)]
        out: OutputArgs,

        /// Comma-separated tag list
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,

        /// Built-in tag list (ar6, ars)
        #[arg(long, conflicts_with = "tags")]
        preset: Option<String>,

        /// Also write `<tag>.bib` per tag into this directory
        #[arg(long)]
        bib_dir: Option<PathBuf>,
    },

    /// Merge an incoming bibliography into a base one, keyed on DOI
    Merge {
        base: PathBuf,
        incoming: PathBuf,

        /// Merged .bib file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Remove duplicate entries from a bibliography
    Dedupe {
        input: PathBuf,

        /// Deduplicated .bib file
        #[arg(short, long)]
        output: PathBuf,

        /// Only drop entries identical in every field (default: by key)
        #[arg(long)]
        exact: bool,
    },

    /// Normalise the project field of every entry
    SanitiseProjects {
        input: PathBuf,

        /// Output .bib file (default: rewrite the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Retrieve BibTeX entries from CrossRef for a reference list
    Fetch {
        /// CSV with Reference and optional Project columns
        references: PathBuf,

        /// Output .bib file
        #[arg(short, long)]
        output: PathBuf,

        /// Contact address sent with requests [env: CROSSREF_MAILTO]
        #[arg(long)]
        mailto: Option<String>,

        /// CrossRef API base URL
        #[arg(long)]
        base_url: Option<String>,

        /// Per-request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Do not follow URLs of DOI-less references looking for a DOI
        #[arg(long)]
        no_resolve_urls: bool,
    },

    /// Split chapter texts into body and reference list at the last "References"
    Split {
        /// Directory of chapter texts
        texts: PathBuf,

        /// Output directory; receives `body/` and `references/`
        #[arg(short, long)]
        output: PathBuf,

        /// Document file extension
        #[arg(long)]
        extension: Option<String>,
    },

    /// Count `Author et al., Year` citations per chapter
    Citations {
        /// Reference table, CSV or a workbook read sheet by sheet
        /// (DOI, First Author or Author, Year, Chapters)
        table: PathBuf,

        /// Directory of chapter texts named `<tag>_ch<n>.txt`
        texts: PathBuf,

        #[command(flatten)]
        out: OutputArgs,

        /// Tag of the chapter file names
        #[arg(long)]
        tag: String,
    },

    /// Map Summary for Policymakers statements to the DOIs cited in their report sections
    Spm {
        /// SPM text: blank-line separated `<id> <text> {<sections>}` blocks
        spm: PathBuf,

        /// Sections table with DOI and Sections columns, every sheet is used
        sections: PathBuf,

        #[command(flatten)]
        out: OutputArgs,

        /// Section id components to keep when a report section is not listed as written
        #[arg(long)]
        depth: Option<usize>,
    },

    /// Write one plain-text DOI list per tag from a directory of .bib files
    DoiLists {
        /// Directory of .bib files
        bibs: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Comma-separated tag list
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,

        /// Built-in tag list (ar6, ars)
        #[arg(long, conflicts_with = "tags")]
        preset: Option<String>,

        /// File name prefix: `<prefix>_dois_<tag>.txt`
        #[arg(long, default_value = "ar6")]
        prefix: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    let config = config_file::load_config();
    let color = ColorMode(!cli.no_color);
    let mut writer = std::io::stdout();

    match cli.command {
        Command::Scan {
            vocabulary,
            corpus,
            out,
            tags,
            preset,
            extension,
            no_group,
            taxonomy,
        } => {
            let tags = resolve_tags(tags, preset, &config)?;
            let scan_config = ScanConfig {
                tags,
                extension: extension.unwrap_or_else(|| config.extension()),
                group_by_tag: !no_group,
            };
            let taxonomy = taxonomy.as_deref().map(Taxonomy::load).transpose()?;
            run_scan(
                &vocabulary,
                &corpus,
                &out,
                &scan_config,
                taxonomy.as_ref(),
                &mut writer,
                color,
            )
        }
        Command::Sections {
            table,
            texts,
            out,
            tag,
            header_pattern,
            extension,
        } => {
            let header = match header_pattern.as_deref().or(config.header_pattern()) {
                Some(pattern) => Some(SectionHeader::from_pattern(pattern)?),
                None => None,
            };
            let extension = extension.unwrap_or_else(|| config.extension());
            let sheets = read_reference_sheets(&table)?;
            let chapters = ChapterTexts::load(&texts, &extension, tag.as_deref())?;
            if chapters.is_empty() {
                output::print_warning(&mut writer, "no chapter texts found", color)?;
            }
            let mut workbook = Workbook::new();
            let (mut references, mut found) = (0, 0);
            for sheet in &sheets {
                let located = locate_sections(&sheet.rows, &chapters, header.as_ref())?;
                references += sheet.rows.len();
                found += located.iter().filter(|r| r.summary.is_some()).count();
                workbook.push(section_sheet(&sheet.name, &located));
            }
            let written = write_workbook(&workbook, &out)?;
            output::print_counts(
                &mut writer,
                "Section summary",
                &[
                    ("Sheets", sheets.len()),
                    ("References", references),
                    ("Chapter texts", chapters.len()),
                    ("Located", found),
                ],
                color,
            )?;
            output::print_written(&mut writer, &written, color)?;
            Ok(())
        }
        Command::SectionIndex { table, out, depth } => {
            let depth = depth.unwrap_or_else(|| config.truncate_depth());
            let mut workbook = Workbook::new();
            for sheet in read_reference_sheets(&table)? {
                let rows = entity_sections(sheet.rows);
                for index_sheet in section_index_sheets(&sheet.name, &rows, depth).sheets {
                    workbook.push(index_sheet);
                }
            }
            let written = write_workbook(&workbook, &out)?;
            output::print_written(&mut writer, &written, color)?;
            Ok(())
        }
        Command::Attribute {
            master,
            chapters,
            out,
            tag,
            expand,
        } => {
            let entries = load_bibliography(&master)?;
            let sources = load_chapter_sources(&chapters)?;
            let attributed = attribute_chapters(&entries, &sources, tag.as_deref());

            let mut workbook = Workbook::from(attribution_sheet(&attributed));
            if expand {
                let rows: Vec<ReferenceRow> = attributed
                    .iter()
                    .map(|a| ReferenceRow {
                        chapters: a.chapters.clone(),
                        ..ReferenceRow::from_entry(a.entry)
                    })
                    .collect();
                workbook.push(reference_sheet("By Chapter", &expand_chapters(&rows)));
            }
            let cited = attributed.iter().filter(|a| !a.chapters.is_empty()).count();
            let written = write_workbook(&workbook, &out)?;
            output::print_counts(
                &mut writer,
                "Attribution summary",
                &[
                    ("Master entries", entries.len()),
                    ("Chapter files", sources.len()),
                    ("Cited by a chapter", cited),
                ],
                color,
            )?;
            output::print_written(&mut writer, &written, color)?;
            Ok(())
        }
        Command::MatchTags {
            master,
            chapters,
            out,
            tags,
            preset,
            bib_dir,
        } => {
            let tags = resolve_tags(tags, preset, &config)?;
            if tags.is_empty() {
                anyhow::bail!("no tags given: use --tags, --preset or the config file");
            }
            let entries = load_bibliography(&master)?;
            let sources = load_chapter_sources(&chapters)?;
            let matches = match_by_tag(&entries, &sources, &tags);

            let mut written = write_workbook(&tag_match_workbook(&matches), &out)?;
            if let Some(dir) = bib_dir {
                for m in &matches {
                    let path = dir.join(format!("{}.bib", m.tag));
                    save_bibliography(&path, &m.entries)?;
                    written.push(path);
                }
            }
            let counts: Vec<(&str, usize)> = matches
                .iter()
                .map(|m| (m.tag.as_str(), m.entries.len()))
                .collect();
            output::print_counts(&mut writer, "Entries per tag", &counts, color)?;
            output::print_written(&mut writer, &written, color)?;
            Ok(())
        }
        Command::Merge {
            base,
            incoming,
            output: target,
        } => {
            let base_entries = load_bibliography(&base)?;
            let incoming_entries = load_bibliography(&incoming)?;
            let (merged, report) = merge_collections(base_entries, incoming_entries);
            save_bibliography(&target, &merged)?;
            output::print_merge_report(&mut writer, &report, merged.len(), color)?;
            output::print_written(&mut writer, &[target], color)?;
            Ok(())
        }
        Command::Dedupe {
            input,
            output: target,
            exact,
        } => {
            let entries = load_bibliography(&input)?;
            let (unique, stats) = if exact {
                dedupe_exact(entries)
            } else {
                dedupe_by_key(entries)
            };
            save_bibliography(&target, &unique)?;
            output::print_dedupe_stats(&mut writer, &stats, color)?;
            output::print_written(&mut writer, &[target], color)?;
            Ok(())
        }
        Command::SanitiseProjects {
            input,
            output: target,
        } => {
            let mut entries = load_bibliography(&input)?;
            let normalizer = ProjectNormalizer::new(config.project_acronyms());
            let changed = normalizer.apply(&mut entries);
            let target = target.unwrap_or(input);
            save_bibliography(&target, &entries)?;
            output::print_counts(
                &mut writer,
                "Project names",
                &[("Entries", entries.len()), ("Changed", changed)],
                color,
            )?;
            output::print_written(&mut writer, &[target], color)?;
            Ok(())
        }
        Command::Fetch {
            references,
            output: target,
            mailto,
            base_url,
            timeout,
            no_resolve_urls,
        } => {
            // Resolve configuration: CLI flags > env vars > config file > defaults
            let crossref = CrossRefConfig {
                base_url: base_url
                    .or_else(|| config.crossref_base_url().map(String::from))
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                mailto: mailto
                    .or_else(|| std::env::var("CROSSREF_MAILTO").ok())
                    .or_else(|| config.crossref_mailto().map(String::from)),
                timeout: Duration::from_secs(
                    timeout.unwrap_or_else(|| config.crossref_timeout_secs()),
                ),
                resolve_urls: !no_resolve_urls,
            };
            run_fetch(&references, &target, crossref, &mut writer, color).await
        }
        Command::Split {
            texts,
            output: target,
            extension,
        } => {
            let extension = extension.unwrap_or_else(|| config.extension());
            run_split(&texts, &target, &extension, &mut writer, color)
        }
        Command::Citations {
            table,
            texts,
            out,
            tag,
        } => {
            let sheets = read_reference_sheets(&table)?;
            let mut workbook = Workbook::new();
            let (mut references, mut total) = (0, 0);
            for sheet in &sheets {
                let counts = count_citations(&sheet.rows, &texts, &tag)?;
                references += sheet.rows.len();
                total += counts.iter().map(|c| c.total).sum::<usize>();
                workbook.push(citation_sheet(&sheet.name, &sheet.rows, &counts));
            }
            let written = write_workbook(&workbook, &out)?;
            output::print_counts(
                &mut writer,
                "Citation summary",
                &[
                    ("Sheets", sheets.len()),
                    ("References", references),
                    ("Citations", total),
                ],
                color,
            )?;
            output::print_written(&mut writer, &written, color)?;
            Ok(())
        }
        Command::Spm {
            spm,
            sections,
            out,
            depth,
        } => {
            let depth = depth.unwrap_or_else(|| config.truncate_depth());
            let statements = load_spm(&spm)?;
            if statements.is_empty() {
                output::print_warning(&mut writer, "no SPM statements found", color)?;
            }
            let rows: Vec<EntitySections> = read_reference_sheets(&sections)?
                .into_iter()
                .flat_map(|sheet| entity_sections(sheet.rows))
                .collect();
            let index = entities_by_section(&rows, depth);
            let dois = supporting_entities(&statements, &index, depth);
            let supported = dois.iter().filter(|d| !d.is_empty()).count();

            let written = write_workbook(&spm_sheet("SPM", &statements, &dois).into(), &out)?;
            output::print_counts(
                &mut writer,
                "SPM summary",
                &[
                    ("Statements", statements.len()),
                    ("Report sections", index.len()),
                    ("With references", supported),
                ],
                color,
            )?;
            output::print_written(&mut writer, &written, color)?;
            Ok(())
        }
        Command::DoiLists {
            bibs,
            output: target,
            tags,
            preset,
            prefix,
        } => {
            let tags = resolve_tags(tags, preset, &config)?;
            if tags.is_empty() {
                anyhow::bail!("no tags given: use --tags, --preset or the config file");
            }
            let lists = collect_tag_dois(&bibs, &tags)?;
            let written = write_doi_lists(&target, &prefix, &lists)?;
            let mut counts: Vec<(&str, usize)> = lists
                .iter()
                .map(|l| (l.tag.as_str(), l.dois.len()))
                .collect();
            counts.push(("Total", lists.iter().map(|l| l.dois.len()).sum::<usize>()));
            output::print_counts(&mut writer, "DOIs per tag", &counts, color)?;
            output::print_written(&mut writer, &written, color)?;
            Ok(())
        }
    }
}

/// DOI and Sections columns of a reference sheet.
fn entity_sections(rows: Vec<ReferenceRow>) -> Vec<EntitySections> {
    rows.into_iter()
        .map(|row| EntitySections {
            entity: row.doi,
            sections: row.sections,
        })
        .collect()
}

/// Tags from the flags, else the preset, else the config file.
fn resolve_tags(
    flags: Vec<String>,
    preset: Option<String>,
    config: &ConfigFile,
) -> anyhow::Result<Vec<String>> {
    if !flags.is_empty() {
        return Ok(flags);
    }
    if let Some(name) = preset {
        return tags::preset(&name).ok_or_else(|| anyhow::anyhow!("unknown tag preset: {name}"));
    }
    Ok(config.tags().unwrap_or_default())
}

fn export_format(out: &OutputArgs) -> ExportFormat {
    out.format.unwrap_or_else(|| {
        out.output
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
            .unwrap_or_default()
    })
}

fn write_workbook(workbook: &Workbook, out: &OutputArgs) -> anyhow::Result<Vec<PathBuf>> {
    let format = export_format(out);
    export_workbook(workbook, format, &out.output)
        .with_context(|| format!("writing {} report to {}", format, out.output.display()))
}

fn run_scan(
    vocabulary: &Path,
    corpus: &Path,
    out: &OutputArgs,
    config: &ScanConfig,
    taxonomy: Option<&Taxonomy>,
    writer: &mut dyn Write,
    color: ColorMode,
) -> anyhow::Result<()> {
    let vocabulary = Vocabulary::load(vocabulary)?;
    if vocabulary.is_empty() {
        output::print_warning(writer, "vocabulary has no terms", color)?;
    }
    let patterns = PatternSet::compile(&vocabulary)?;
    let scan = scan_directory(corpus, &patterns, config)?;

    let workbook = matrix_workbook(&scan.outcome.matrix, &scan.groups, taxonomy);
    let written = write_workbook(&workbook, out)?;

    output::print_scan_summary(
        writer,
        patterns.len(),
        scan.outcome.matrix.documents().len(),
        workbook.sheets.len(),
        &scan.outcome.skipped,
        color,
    )?;
    output::print_written(writer, &written, color)?;
    Ok(())
}

async fn run_fetch(
    references: &Path,
    target: &Path,
    config: CrossRefConfig,
    writer: &mut dyn Write,
    color: ColorMode,
) -> anyhow::Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};

    let requests = ecvscan_bib::crossref::read_reference_requests(references)?;
    if config.mailto.is_none() {
        output::print_warning(
            writer,
            "no contact address set (--mailto or CROSSREF_MAILTO); requests use the anonymous pool",
            color,
        )?;
    }
    let client = CrossRefClient::new(config)?;

    let bar = ProgressBar::new(requests.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:40.cyan/dim}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    bar.enable_steady_tick(Duration::from_millis(120));

    let (entries, summary) = client
        .fetch_entries(&requests, |event| match event {
            FetchEvent::Started { reference, .. } => {
                let short: String = reference.chars().take(50).collect();
                bar.set_message(short);
            }
            FetchEvent::Recovering { index, .. } => {
                bar.println(format!("[{}] no DOI, searching by text", index + 1));
            }
            FetchEvent::Fetched { .. } => bar.inc(1),
            FetchEvent::NotFound { index, .. } => {
                bar.println(format!("[{}] not found", index + 1));
                bar.inc(1);
            }
            FetchEvent::Failed { index, error, .. } => {
                bar.println(format!("[{}] failed: {}", index + 1, error));
                bar.inc(1);
            }
        })
        .await;
    bar.finish_and_clear();

    save_bibliography(target, &entries)?;
    output::print_fetch_summary(writer, &summary, entries.len(), color)?;
    output::print_written(writer, &[target.to_path_buf()], color)?;
    Ok(())
}

fn run_split(
    texts: &Path,
    target: &Path,
    extension: &str,
    writer: &mut dyn Write,
    color: ColorMode,
) -> anyhow::Result<()> {
    let body_dir = target.join("body");
    let refs_dir = target.join("references");
    std::fs::create_dir_all(&body_dir)
        .with_context(|| format!("creating {}", body_dir.display()))?;
    std::fs::create_dir_all(&refs_dir)
        .with_context(|| format!("creating {}", refs_dir.display()))?;

    let mut paths: Vec<PathBuf> = std::fs::read_dir(texts)
        .with_context(|| format!("reading {}", texts.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .is_some_and(|e| e.eq_ignore_ascii_case(extension))
        })
        .collect();
    paths.sort();

    let mut split = 0;
    let mut skipped = 0;
    for path in &paths {
        let Some(file_name) = path.file_name() else {
            continue;
        };
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "skipping unreadable file");
                skipped += 1;
                continue;
            }
        };
        let Some((body, references)) = split_at_references(&text) else {
            output::print_warning(
                writer,
                &format!("no References marker in {}", path.display()),
                color,
            )?;
            skipped += 1;
            continue;
        };
        std::fs::write(body_dir.join(file_name), body)
            .with_context(|| format!("writing body of {}", path.display()))?;
        std::fs::write(refs_dir.join(file_name), references)
            .with_context(|| format!("writing references of {}", path.display()))?;
        tracing::info!(file = %path.display(), "split chapter");
        split += 1;
    }

    output::print_counts(
        writer,
        "Split summary",
        &[("Files", paths.len()), ("Split", split), ("Skipped", skipped)],
        color,
    )?;
    output::print_written(writer, &[body_dir, refs_dir], color)?;
    Ok(())
}
