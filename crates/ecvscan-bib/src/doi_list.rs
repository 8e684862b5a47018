//! Plain-text DOI lists per report tag.

use std::path::{Path, PathBuf};

use crate::BibError;
use crate::parse::load_bibliography;
use crate::reconcile::{file_name_of, list_files};

/// DOIs of the bibliographies whose file name contains `tag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDois {
    pub tag: String,
    pub files: Vec<String>,
    /// As written in the entries, in file then entry order.
    pub dois: Vec<String>,
}

/// Collect the DOIs of every `.bib` file of `dir`, one list per tag.
///
/// A file whose name contains two tags is listed under both. Unreadable files
/// are logged and skipped.
pub fn collect_tag_dois<S: AsRef<str>>(dir: &Path, tags: &[S]) -> Result<Vec<TagDois>, BibError> {
    let files = list_files(dir, "bib")?;
    let mut lists = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.as_ref();
        let mut list = TagDois {
            tag: tag.to_string(),
            files: Vec::new(),
            dois: Vec::new(),
        };
        for path in &files {
            let file_name = file_name_of(path);
            if !file_name.contains(tag) {
                continue;
            }
            match load_bibliography(path) {
                Ok(entries) => {
                    list.dois.extend(entries.iter().filter_map(|e| e.doi.clone()));
                    list.files.push(file_name);
                }
                Err(e) => tracing::warn!(file = %file_name, error = %e, "skipping bibliography"),
            }
        }
        tracing::info!(tag, files = list.files.len(), dois = list.dois.len(), "collected DOIs");
        lists.push(list);
    }
    Ok(lists)
}

/// Write `<prefix>_dois_<tag>.txt` per list and `<prefix>_dois_full.txt` with
/// every list concatenated, one DOI per line. Returns the written paths.
pub fn write_doi_lists(
    out_dir: &Path,
    prefix: &str,
    lists: &[TagDois],
) -> Result<Vec<PathBuf>, BibError> {
    std::fs::create_dir_all(out_dir).map_err(|e| BibError::write(out_dir, e))?;

    let mut written = Vec::with_capacity(lists.len() + 1);
    let mut full = String::new();
    for list in lists {
        let mut text = String::new();
        for doi in &list.dois {
            text.push_str(doi);
            text.push('\n');
        }
        full.push_str(&text);
        let path = out_dir.join(format!("{prefix}_dois_{}.txt", list.tag));
        std::fs::write(&path, text).map_err(|e| BibError::write(&path, e))?;
        written.push(path);
    }

    let path = out_dir.join(format!("{prefix}_dois_full.txt"));
    std::fs::write(&path, full).map_err(|e| BibError::write(&path, e))?;
    written.push(path);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bib(dois: &[&str]) -> String {
        dois.iter()
            .enumerate()
            .map(|(i, d)| format!("@article{{k{i},\n  doi = {{{d}}}\n}}\n"))
            .collect()
    }

    #[test]
    fn lists_follow_tags_and_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("wg1_ch2.bib"), bib(&["10.1/a", "10.1/b"])).unwrap();
        std::fs::write(dir.path().join("wg1_ch7.bib"), bib(&["10.1/c"])).unwrap();
        std::fs::write(dir.path().join("srocc_ch1.bib"), bib(&["10.1/d"])).unwrap();
        std::fs::write(
            dir.path().join("wg1_ch9.bib"),
            "@misc{nodoi,\n  title = {No DOI}\n}\n",
        )
        .unwrap();

        let lists = collect_tag_dois(dir.path(), &["wg1", "srocc", "sr15"]).unwrap();
        assert_eq!(lists[0].files, vec!["wg1_ch2.bib", "wg1_ch7.bib", "wg1_ch9.bib"]);
        assert_eq!(lists[0].dois, vec!["10.1/a", "10.1/b", "10.1/c"]);
        assert_eq!(lists[1].dois, vec!["10.1/d"]);
        assert!(lists[2].files.is_empty());
    }

    #[test]
    fn writes_one_file_per_tag_and_a_full_list() {
        let dir = tempfile::tempdir().unwrap();
        let lists = vec![
            TagDois {
                tag: "wg1".into(),
                files: vec![],
                dois: vec!["10.1/a".into(), "10.1/b".into()],
            },
            TagDois {
                tag: "sr15".into(),
                files: vec![],
                dois: vec![],
            },
        ];
        let out = dir.path().join("dois");
        let written = write_doi_lists(&out, "ar6", &lists).unwrap();
        assert_eq!(written.len(), 3);
        let read = |name: &str| std::fs::read_to_string(out.join(name)).unwrap();
        assert_eq!(read("ar6_dois_wg1.txt"), "10.1/a\n10.1/b\n");
        assert_eq!(read("ar6_dois_sr15.txt"), "");
        assert_eq!(read("ar6_dois_full.txt"), "10.1/a\n10.1/b\n");
    }
}
