use once_cell::sync::Lazy;
use regex::Regex;

use crate::scanner::Document;

/// Tag assigned to documents whose file name contains none of the known tags.
pub const OTHER_TAG: &str = "other";

static CHAPTER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)_ch(\d+)").unwrap());

/// Documents sharing a tag, in corpus order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagGroup {
    pub tag: String,
    /// Document ids (matrix columns) belonging to this tag.
    pub documents: Vec<String>,
}

/// First tag of `tags` contained in `file_name`, or [`OTHER_TAG`].
///
/// The caller's order is the tie-break: with `["wg1", "wg2"]`, `wg12_ch3.txt`
/// is `wg1`.
pub fn extract_tag<'a, S: AsRef<str>>(file_name: &str, tags: &'a [S]) -> &'a str {
    tags.iter()
        .map(|t| t.as_ref())
        .find(|tag| !tag.is_empty() && file_name.contains(tag))
        .unwrap_or(OTHER_TAG)
}

/// Partition documents by tag. Groups appear in the order their first
/// document appears.
pub fn group_by_tag<S: AsRef<str>>(documents: &[Document], tags: &[S]) -> Vec<TagGroup> {
    let mut groups: Vec<TagGroup> = Vec::new();
    for document in documents {
        let tag = extract_tag(&document.file_name, tags);
        match groups.iter_mut().find(|g| g.tag == tag) {
            Some(group) => group.documents.push(document.id.clone()),
            None => groups.push(TagGroup {
                tag: tag.to_string(),
                documents: vec![document.id.clone()],
            }),
        }
    }
    groups
}

/// Built-in tag lists selectable by name.
pub fn preset(name: &str) -> Option<Vec<String>> {
    let tags: &[&str] = match name.to_ascii_lowercase().as_str() {
        "ar6" => &["sr15", "srccl", "srocc", "wg1", "wg2", "wg3", "syr"],
        "ars" => &["ar1", "ar2", "ar3", "ar4", "ar5", "ar6"],
        _ => return None,
    };
    Some(tags.iter().map(|t| t.to_string()).collect())
}

/// Chapter number encoded as `_ch<number>` in a file name.
pub fn chapter_number(file_name: &str) -> Option<u32> {
    CHAPTER_RE
        .captures(file_name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tag_in_list_order_wins() {
        assert_eq!(extract_tag("wg12_ch3.txt", &["wg1", "wg2"]), "wg1");
        assert_eq!(extract_tag("wg12_ch3.txt", &["wg2", "wg1"]), "wg2");
    }

    #[test]
    fn unknown_file_is_other() {
        assert_eq!(extract_tag("notes.txt", &["wg1", "wg2"]), OTHER_TAG);
        let none: [&str; 0] = [];
        assert_eq!(extract_tag("wg1_ch1.txt", &none), OTHER_TAG);
    }

    #[test]
    fn groups_follow_document_order() {
        let docs = vec![
            Document::inline("srocc_ch1.txt", ""),
            Document::inline("wg1_ch1.txt", ""),
            Document::inline("misc.txt", ""),
            Document::inline("wg1_ch2.txt", ""),
        ];
        let tags = preset("ar6").unwrap();
        let groups = group_by_tag(&docs, &tags);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].tag, "srocc");
        assert_eq!(groups[1].tag, "wg1");
        assert_eq!(groups[1].documents, vec!["wg1_ch1", "wg1_ch2"]);
        assert_eq!(groups[2].tag, OTHER_TAG);
    }

    #[test]
    fn chapter_number_is_exact() {
        assert_eq!(chapter_number("wg1_ch10.txt"), Some(10));
        assert_eq!(chapter_number("srocc_ch1_body.txt"), Some(1));
        assert_eq!(chapter_number("wg1_spm.txt"), None);
    }

    #[test]
    fn unknown_preset() {
        assert!(preset("ars").is_some());
        assert!(preset("wg9").is_none());
    }
}
