use once_cell::sync::Lazy;
use regex::Regex;

static DOI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"10\.\d{4,9}/[-._;()/:A-Za-z0-9]+").unwrap());

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"https?://[^\s<>"']+"#).unwrap());

/// Strip trailing characters that are neither alphanumeric nor `_`.
fn trim_trailing_punct(doi: &str) -> &str {
    doi.trim_end_matches(|c: char| !(c.is_alphanumeric() || c == '_'))
}

/// First DOI found in free reference text.
///
/// Trailing punctuation picked up from the surrounding sentence is removed:
/// `see 10.1038/nature11377.` yields `10.1038/nature11377`.
pub fn extract_doi(text: &str) -> Option<String> {
    let m = DOI_RE.find(text)?;
    let doi = trim_trailing_punct(m.as_str());
    (!doi.is_empty()).then(|| doi.to_string())
}

/// First http(s) URL in free reference text.
pub fn extract_url(text: &str) -> Option<&str> {
    URL_RE
        .find(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ')']))
}

/// Comparison key for a DOI field: resolver prefixes removed, lower case.
pub fn normalize_doi(raw: &str) -> Option<String> {
    let mut doi = raw.trim();
    for prefix in [
        "https://doi.org/",
        "http://doi.org/",
        "https://dx.doi.org/",
        "http://dx.doi.org/",
        "doi:",
    ] {
        let matches = doi
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
        if matches {
            doi = doi[prefix.len()..].trim_start();
            break;
        }
    }
    (!doi.is_empty()).then(|| doi.to_lowercase())
}

/// Citation key derived from a DOI: `10.1038/nature11377` -> `10.1038_nature11377`.
pub fn key_from_doi(doi: &str) -> String {
    doi.replace('/', "_")
}
