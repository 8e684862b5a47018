//! Presentation order of document columns: `ch10` after `ch9`, not after `ch1`.

use std::cmp::Ordering;

/// Sort bucket of a column name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ColumnKey {
    /// Chapters, by number.
    Chapter(u64),
    /// Names without the letter `a` (`spm`, `ts`, ...).
    Plain(String),
    Other(String),
}

pub fn column_sort_key(name: &str) -> ColumnKey {
    if let Some(at) = name.rfind("ch") {
        let digits: String = name[at + 2..]
            .chars()
            .filter(char::is_ascii_digit)
            .collect();
        if let Ok(n) = digits.parse() {
            return ColumnKey::Chapter(n);
        }
    }
    if name.contains('a') {
        ColumnKey::Other(name.to_string())
    } else {
        ColumnKey::Plain(name.to_string())
    }
}

pub fn compare_columns(a: &str, b: &str) -> Ordering {
    column_sort_key(a)
        .cmp(&column_sort_key(b))
        .then_with(|| a.cmp(b))
}

/// Stable sort of column names by [`column_sort_key`].
pub fn sort_columns<S: AsRef<str>>(columns: &mut [S]) {
    columns.sort_by(|a, b| compare_columns(a.as_ref(), b.as_ref()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chapter_ten_follows_chapter_nine() {
        let mut cols = vec!["wg1_ch10", "wg1_spm", "wg1_ch1", "wg1_annex", "wg1_ch9"];
        sort_columns(&mut cols);
        assert_eq!(
            cols,
            vec!["wg1_ch1", "wg1_ch9", "wg1_ch10", "wg1_spm", "wg1_annex"]
        );
    }

    #[test]
    fn keys() {
        assert_eq!(column_sort_key("srocc_ch4_body"), ColumnKey::Chapter(4));
        assert_eq!(column_sort_key("wg2_ts"), ColumnKey::Plain("wg2_ts".into()));
        assert_eq!(column_sort_key("ar5_syr"), ColumnKey::Other("ar5_syr".into()));
    }
}
