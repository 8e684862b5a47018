use std::sync::{Arc, Mutex};
use std::time::Duration;

use ecvscan_bib::{CrossRefClient, CrossRefConfig, FetchEvent, FetchSummary, ReferenceRequest};
use mockito::{Matcher, Server};

const MAILTO: &str = "someone@example.org";
const SELECT: &str = "title,DOI,published,author,container-title,volume,page,issue,type";

fn request(project: &str, reference: &str) -> ReferenceRequest {
    ReferenceRequest {
        project: project.to_string(),
        reference: reference.to_string(),
    }
}

fn client(base_url: String, resolve_urls: bool) -> CrossRefClient {
    CrossRefClient::new(CrossRefConfig {
        base_url,
        mailto: Some(MAILTO.into()),
        timeout: Duration::from_secs(5),
        resolve_urls,
    })
    .unwrap()
}

fn with_mailto() -> Matcher {
    Matcher::UrlEncoded("mailto".into(), MAILTO.into())
}

#[tokio::test]
async fn sequential_fetch_counts_every_outcome() {
    let mut server = Server::new_async().await;

    let found = server
        .mock("GET", "/works/10.1234/found")
        .match_query(with_mailto())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"message": {"DOI": "10.1234/found", "type": "journal-article", "title": ["Found it"],
                "author": [{"given": "Ada", "family": "Smith"}],
                "published": {"date-parts": [[2021]]}}}"#,
        )
        .expect(1)
        .create_async()
        .await;
    let missing = server
        .mock("GET", "/works/10.1234/missing")
        .match_query(with_mailto())
        .with_status(404)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;
    let search = server
        .mock("GET", "/works")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("query".into(), "An untitled grey-literature report".into()),
            Matcher::UrlEncoded("select".into(), SELECT.into()),
            Matcher::UrlEncoded("rows".into(), "1".into()),
            with_mailto(),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message": {"items": []}}"#)
        .expect(1)
        .create_async()
        .await;

    let requests = vec![
        request("Ozone", "Smith, A. (2021). Found it. doi:10.1234/found."),
        request("Snow", "Doe, B. (2019). Gone. https://doi.org/10.1234/missing"),
        request("", "An untitled grey-literature report"),
    ];

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let (entries, summary) = client(server.url(), false)
        .fetch_entries(&requests, move |event| sink.lock().unwrap().push(event))
        .await;

    found.assert_async().await;
    missing.assert_async().await;
    search.assert_async().await;

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].key, "10.1234_found");
    assert_eq!(entries[0].project, "Ozone");
    assert_eq!(entries[0].author.as_deref(), Some("Ada Smith"));
    assert_eq!(
        summary,
        FetchSummary {
            with_doi: 2,
            recovered: 1,
            fetch_errors: 1,
            other_errors: 0,
            not_found: 1,
        }
    );

    let events = events.lock().unwrap();
    let started = events
        .iter()
        .filter(|e| matches!(e, FetchEvent::Started { .. }))
        .count();
    assert_eq!(started, 3);
    assert!(
        events
            .iter()
            .any(|e| matches!(e, FetchEvent::Failed { index: 1, .. }))
    );
}

#[tokio::test]
async fn doi_is_recovered_from_the_linked_page() {
    let mut server = Server::new_async().await;

    let page = server
        .mock("GET", "/report")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(r#"<html><a href="https://doi.org/10.1234/page">doi</a></html>"#)
        .expect(1)
        .create_async()
        .await;
    let work = server
        .mock("GET", "/works/10.1234/page")
        .match_query(with_mailto())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message": {"DOI": "10.1234/page", "type": "report", "title": ["Linked"]}}"#)
        .expect(1)
        .create_async()
        .await;

    let reference = format!("Agency (2020). Linked. {}/report.", server.url());
    let (entries, summary) = client(server.url(), true)
        .fetch_entries(&[request("Ozone", &reference)], |_| {})
        .await;

    page.assert_async().await;
    work.assert_async().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].doi.as_deref(), Some("10.1234/page"));
    assert_eq!(summary.with_doi, 1);
    assert_eq!(summary.recovered, 0);
}

#[tokio::test]
async fn unreachable_service_is_counted_not_fatal() {
    // Bind and drop to get a port nothing listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = CrossRefClient::new(CrossRefConfig {
        base_url: format!("http://{addr}"),
        timeout: Duration::from_secs(2),
        resolve_urls: false,
        ..Default::default()
    })
    .unwrap();
    let (entries, summary) = client
        .fetch_entries(&[request("Ozone", "doi:10.1234/x")], |_| {})
        .await;
    assert!(entries.is_empty());
    assert_eq!(summary.other_errors, 1);
}
