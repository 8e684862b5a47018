use std::io::Read;
use std::path::Path;
use std::time::Duration;

use csv::ReaderBuilder;
use serde_json::Value;
use thiserror::Error;

use crate::doi::{extract_doi, extract_url, key_from_doi};
use crate::{BibEntry, BibError};

pub const DEFAULT_BASE_URL: &str = "https://api.crossref.org";

const SELECT_FIELDS: &str = "title,DOI,published,author,container-title,volume,page,issue,type";

#[derive(Debug, Clone)]
pub struct CrossRefConfig {
    pub base_url: String,
    pub mailto: Option<String>,
    pub timeout: Duration,
    /// Fetch a URL found in a DOI-less reference and look for a DOI in the page.
    pub resolve_urls: bool,
}

impl Default for CrossRefConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            mailto: None,
            timeout: Duration::from_secs(10),
            resolve_urls: true,
        }
    }
}

/// One line of the reference list to retrieve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceRequest {
    pub project: String,
    pub reference: String,
}

/// Parse a CSV with a `Reference` column and an optional `Project` column.
pub fn parse_reference_requests<R: Read>(reader: R) -> Result<Vec<ReferenceRequest>, BibError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let headers = reader.headers()?.clone();
    let find = |name: &str| headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name));
    let reference = find("Reference").ok_or(BibError::MissingColumn("Reference"))?;
    let project = find("Project");

    let mut requests = Vec::new();
    for record in reader.records() {
        let record = record?;
        let text = record.get(reference).unwrap_or("").trim();
        if text.is_empty() {
            continue;
        }
        requests.push(ReferenceRequest {
            project: project
                .and_then(|i| record.get(i))
                .unwrap_or("")
                .trim_end()
                .to_string(),
            reference: text.to_string(),
        });
    }
    Ok(requests)
}

pub fn read_reference_requests(path: &Path) -> Result<Vec<ReferenceRequest>, BibError> {
    let file = std::fs::File::open(path).map_err(|e| BibError::read(path, e))?;
    parse_reference_requests(file)
}

/// Failure of one lookup. Never aborts a batch.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP {0}")]
    Status(u16),
    #[error("request failed: {0}")]
    Request(String),
}

/// Counters of a fetch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    /// References looked up by a DOI found in their text.
    pub with_doi: usize,
    /// References without a DOI, looked up by free-text query.
    pub recovered: usize,
    /// Non-success HTTP status.
    pub fetch_errors: usize,
    /// Transport or decoding failures.
    pub other_errors: usize,
    /// Successful responses without a usable record.
    pub not_found: usize,
}

#[derive(Debug, Clone)]
pub enum FetchEvent {
    Started {
        index: usize,
        total: usize,
        reference: String,
    },
    /// No DOI in the reference; the free-text query is used and the result
    /// should be checked.
    Recovering {
        index: usize,
        total: usize,
        reference: String,
    },
    Fetched {
        index: usize,
        total: usize,
        key: String,
    },
    NotFound {
        index: usize,
        total: usize,
        reference: String,
    },
    Failed {
        index: usize,
        total: usize,
        reference: String,
        error: String,
    },
}

/// Sequential client for the CrossRef works API.
pub struct CrossRefClient {
    client: reqwest::Client,
    config: CrossRefConfig,
}

impl CrossRefClient {
    pub fn new(config: CrossRefConfig) -> Result<Self, BibError> {
        let user_agent = match config.mailto {
            Some(ref email) => format!("ecvscan/{} (mailto:{})", env!("CARGO_PKG_VERSION"), email),
            None => format!("ecvscan/{}", env!("CARGO_PKG_VERSION")),
        };
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client, config })
    }

    fn with_mailto(&self, mut url: String) -> String {
        if let Some(ref email) = self.config.mailto {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&format!("mailto={}", urlencoding::encode(email)));
        }
        url
    }

    async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        resp.json()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))
    }

    /// `GET /works/{doi}`.
    pub async fn work_by_doi(&self, doi: &str) -> Result<Option<Value>, FetchError> {
        let url = self.with_mailto(format!(
            "{}/works/{}",
            self.config.base_url.trim_end_matches('/'),
            doi
        ));
        let data = self.get_json(&url).await?;
        Ok(data.get("message").filter(|m| m.is_object()).cloned())
    }

    /// Best free-text match: `GET /works?query=...&rows=1`.
    pub async fn search(&self, query: &str) -> Result<Option<Value>, FetchError> {
        let url = self.with_mailto(format!(
            "{}/works?query={}&select={}&rows=1",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(query),
            SELECT_FIELDS
        ));
        let data = self.get_json(&url).await?;
        Ok(data["message"]["items"]
            .as_array()
            .and_then(|items| items.first())
            .cloned())
    }

    /// DOI printed in the page behind `url`, if any.
    pub async fn doi_from_page(&self, url: &str) -> Option<String> {
        let resp = match self.client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                tracing::debug!(url, status = %resp.status(), "page not available");
                return None;
            }
            Err(e) => {
                tracing::error!(url, error = %e, "failed to fetch reference page");
                return None;
            }
        };
        let body = resp.text().await.ok()?;
        extract_doi(&body)
    }

    async fn find_doi(&self, reference: &str) -> Option<String> {
        if let Some(doi) = extract_doi(reference) {
            return Some(doi);
        }
        if !self.config.resolve_urls {
            return None;
        }
        let url = extract_url(reference)?;
        self.doi_from_page(url).await
    }

    /// Retrieve one BibTeX entry per request, in order.
    ///
    /// Requests are issued one at a time. Every failure is logged, counted in
    /// the summary and skipped.
    pub async fn fetch_entries(
        &self,
        requests: &[ReferenceRequest],
        progress: impl Fn(FetchEvent),
    ) -> (Vec<BibEntry>, FetchSummary) {
        let total = requests.len();
        let mut entries = Vec::new();
        let mut summary = FetchSummary::default();

        for (index, request) in requests.iter().enumerate() {
            progress(FetchEvent::Started {
                index,
                total,
                reference: request.reference.clone(),
            });

            let lookup = match self.find_doi(&request.reference).await {
                Some(doi) => {
                    summary.with_doi += 1;
                    self.work_by_doi(&doi).await
                }
                None => {
                    summary.recovered += 1;
                    tracing::warn!(index, reference = %request.reference, "no DOI, check the recovered record");
                    progress(FetchEvent::Recovering {
                        index,
                        total,
                        reference: request.reference.clone(),
                    });
                    self.search(&request.reference).await
                }
            };

            match lookup {
                Ok(Some(item)) => {
                    let entry = entry_from_item(&item, &request.project);
                    progress(FetchEvent::Fetched {
                        index,
                        total,
                        key: entry.key.clone(),
                    });
                    entries.push(entry);
                }
                Ok(None) => {
                    summary.not_found += 1;
                    tracing::info!(index, reference = %request.reference, "no items found, skipping");
                    progress(FetchEvent::NotFound {
                        index,
                        total,
                        reference: request.reference.clone(),
                    });
                }
                Err(e) => {
                    match e {
                        FetchError::Status(_) => summary.fetch_errors += 1,
                        FetchError::Request(_) => summary.other_errors += 1,
                    }
                    tracing::error!(index, reference = %request.reference, error = %e, "error fetching record");
                    progress(FetchEvent::Failed {
                        index,
                        total,
                        reference: request.reference.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        (entries, summary)
    }
}

fn first_str(value: &Value) -> Option<&str> {
    value.as_array()?.first()?.as_str()
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn format_author(author: &Value) -> String {
    let given = author["given"].as_str();
    let family = author["family"].as_str();
    match (given, family) {
        (Some(g), Some(f)) => format!("{g} {f}"),
        (None, Some(f)) => f.to_string(),
        _ => author["name"].as_str().unwrap_or("Unknown").to_string(),
    }
}

/// Convert a CrossRef work record to a BibTeX entry tagged with `project`.
pub fn entry_from_item(item: &Value, project: &str) -> BibEntry {
    let doi = item["DOI"].as_str().unwrap_or("").trim();
    let entry_type = if item["type"].as_str() == Some("journal-article") {
        "article"
    } else {
        "misc"
    };
    let key = if doi.is_empty() {
        "nodoi".to_string()
    } else {
        key_from_doi(doi)
    };

    let mut entry = BibEntry::new(key, entry_type);
    entry.set_field("doi", doi);
    entry.set_field("title", first_str(&item["title"]).unwrap_or("No Title"));
    if let Some(authors) = item["author"].as_array() {
        let names: Vec<String> = authors.iter().map(format_author).collect();
        entry.set_field("author", names.join(" and "));
    }
    if let Some(journal) = first_str(&item["container-title"]) {
        entry.set_field("journal", journal);
    }
    if let Some(year) = item["published"]["date-parts"][0][0].as_i64() {
        entry.set_field("year", year.to_string());
    }
    for (source, target) in [("volume", "volume"), ("issue", "number"), ("page", "pages")] {
        if let Some(value) = scalar(&item[source]) {
            entry.set_field(target, value);
        }
    }
    entry.set_field("project", project);
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn journal_article_item() {
        let item = json!({
            "DOI": "10.1038/nature11377",
            "type": "journal-article",
            "title": ["Soil moisture trends"],
            "author": [
                {"given": "Sonia", "family": "Seneviratne"},
                {"family": "Doe"},
                {"name": "ESA CCI Consortium"},
                {}
            ],
            "container-title": ["Nature"],
            "published": {"date-parts": [[2012, 8]]},
            "volume": "489",
            "issue": "7416",
            "page": "10-12"
        });
        let e = entry_from_item(&item, "Soil Moisture ");
        assert_eq!(e.key, "10.1038_nature11377");
        assert_eq!(e.entry_type, "article");
        assert_eq!(
            e.author.as_deref(),
            Some("Sonia Seneviratne and Doe and ESA CCI Consortium and Unknown")
        );
        assert_eq!(e.year.as_deref(), Some("2012"));
        assert_eq!(e.journal.as_deref(), Some("Nature"));
        assert_eq!(e.number.as_deref(), Some("7416"));
        assert_eq!(e.pages.as_deref(), Some("10-12"));
        assert_eq!(e.project, "Soil Moisture");
    }

    #[test]
    fn sparse_item_gets_defaults() {
        let item = json!({"DOI": "10.5194/x", "type": "report"});
        let e = entry_from_item(&item, "");
        assert_eq!(e.entry_type, "misc");
        assert_eq!(e.title.as_deref(), Some("No Title"));
        assert!(e.year.is_none());
        assert!(e.author.is_none());
    }

    #[test]
    fn reads_requests() {
        let csv = "Project,Reference\nOzone,\"Smith, J. (2020) doi:10.1/x\"\nSnow,\n,Doe 2019 A title\n";
        let requests = parse_reference_requests(csv.as_bytes()).unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].project, "Ozone");
        assert_eq!(requests[1].project, "");
    }

    #[test]
    fn reference_column_is_required() {
        assert!(matches!(
            parse_reference_requests("Project\nOzone\n".as_bytes()),
            Err(BibError::MissingColumn("Reference"))
        ));
    }
}
