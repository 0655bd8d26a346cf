//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run full
//! traversals end-to-end with the direct renderer, writing documents into a
//! temporary directory.

use pagefold::config::TraversalConfig;
use pagefold::crawler::{crawl, ErrorReason, RunReport, ShutdownCoordinator};
use pagefold::render::DirectRenderer;
use pagefold::{normalize, NormalizePolicy};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration starting at `base` and writing into `output`
fn create_test_config(base: &str, output: &Path) -> TraversalConfig {
    let mut config = TraversalConfig::new(Url::parse(base).expect("Failed to parse base URL"));
    config.output_dir = output.to_path_buf();
    config.max_depth = 2;
    config.concurrency = 4;
    config.render_sessions = Some(8);
    config.timeout = Duration::from_secs(5);
    config.delay = Duration::ZERO;
    config.backoff_unit = Duration::from_millis(10);
    config
}

async fn run_crawl(config: TraversalConfig) -> RunReport {
    let renderer = Arc::new(DirectRenderer::new(config.timeout).expect("Failed to build renderer"));
    crawl(config, renderer, ShutdownCoordinator::new())
        .await
        .expect("Crawl failed")
}

/// Serves an HTML page with the given title and links at `route`
async fn mount_page(server: &MockServer, route: &str, title: &str, links: &[&str]) {
    let anchors: String = links
        .iter()
        .map(|href| format!("<a href=\"{}\">{}</a>\n", href, href))
        .collect();

    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!(
                    "<html><head><title>{}</title></head><body><h1>{}</h1>\n{}</body></html>",
                    title, title, anchors
                ))
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// Names of exported page documents, sorted
fn exported_documents(dir: &TempDir) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .expect("Failed to read output directory")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".html") && name != "merged.html")
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_full_crawl_single_site() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    let absolute_link = format!("{}/page1", base_url);
    mount_page(
        &mock_server,
        "/",
        "Home",
        &[absolute_link.as_str(), "/page2", "mailto:team@example.com"],
    )
    .await;
    mount_page(&mock_server, "/page1", "Page 1", &[]).await;
    mount_page(&mock_server, "/page2", "Page 2", &["/"]).await;

    let output = TempDir::new().unwrap();
    let report = run_crawl(create_test_config(&format!("{}/", base_url), output.path())).await;

    assert_eq!(report.progress.processed, 3);
    assert_eq!(report.progress.succeeded, 3);
    assert_eq!(report.progress.failed, 0);
    assert_eq!(report.visited, 3);
    assert!(!report.interrupted);

    let documents = exported_documents(&output);
    assert_eq!(documents.len(), 3, "Unexpected documents: {:?}", documents);
    assert!(documents.iter().any(|name| name.starts_with("Home_127.0.0.1_")));
    assert!(documents.iter().any(|name| name.starts_with("Page_1_127.0.0.1_page1_")));
    assert!(documents.iter().any(|name| name.starts_with("Page_2_127.0.0.1_page2_")));

    // Exported snapshots keep their origin for relative assets
    let home = documents
        .iter()
        .find(|name| name.starts_with("Home_"))
        .unwrap();
    let content = std::fs::read_to_string(output.path().join(home)).unwrap();
    assert!(content.contains(&format!("<base href=\"{}/\">", base_url)));
}

#[tokio::test]
async fn test_cyclic_links_visit_each_page_once() {
    let mock_server = MockServer::start().await;

    for (route, links) in [
        ("/", vec!["/a", "/b"]),
        ("/a", vec!["/", "/b", "/a#top"]),
        ("/b", vec!["/a?ref=b", "/"]),
    ] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                "<html><body>{}</body></html>",
                links
                    .iter()
                    .map(|href| format!("<a href=\"{}\">x</a>", href))
                    .collect::<String>()
            )))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let output = TempDir::new().unwrap();
    let mut config = create_test_config(&format!("{}/", mock_server.uri()), output.path());
    config.max_depth = 5;

    let report = run_crawl(config).await;

    assert_eq!(report.visited, 3);
    assert_eq!(report.progress.processed, 3);
}

#[tokio::test]
async fn test_depth_limit_stops_expansion() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", "Home", &["/level1"]).await;
    mount_page(&mock_server, "/level1", "Level 1", &["/level2"]).await;

    Mock::given(method("GET"))
        .and(path("/level2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let output = TempDir::new().unwrap();
    let mut config = create_test_config(&format!("{}/", mock_server.uri()), output.path());
    config.max_depth = 1;

    let report = run_crawl(config).await;

    assert_eq!(report.visited, 2);
    assert_eq!(exported_documents(&output).len(), 2);
}

#[tokio::test]
async fn test_allow_list_restricts_scope() {
    let mock_server = MockServer::start().await;
    let host = Url::parse(&mock_server.uri())
        .unwrap()
        .host_str()
        .unwrap()
        .to_string();

    mount_page(&mock_server, "/docs/", "Docs", &["intro", "/blog/post"]).await;
    mount_page(&mock_server, "/docs/intro", "Intro", &[]).await;

    Mock::given(method("GET"))
        .and(path("/blog/post"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let output = TempDir::new().unwrap();
    let mut config = create_test_config(&format!("{}/docs/", mock_server.uri()), output.path());
    config.allowed_prefixes = vec![format!("{}/docs", host)];

    let report = run_crawl(config).await;

    assert_eq!(report.visited, 2);
    assert_eq!(report.progress.succeeded, 2);
}

#[tokio::test]
async fn test_excluded_urls_are_never_requested() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", "Home", &["/public", "/private?session=1"]).await;
    mount_page(&mock_server, "/public", "Public", &[]).await;

    Mock::given(method("GET"))
        .and(path("/private"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let output = TempDir::new().unwrap();
    let mut config = create_test_config(&format!("{}/", base_url), output.path());
    config.excluded.insert(normalize(
        &format!("{}/private", base_url),
        &NormalizePolicy::Identity,
    ));

    let report = run_crawl(config).await;

    assert_eq!(report.visited, 2);
}

#[tokio::test]
async fn test_failed_page_is_retried_and_recorded() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", "Home", &["/flaky", "/fine"]).await;
    mount_page(&mock_server, "/fine", "Fine", &[]).await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let output = TempDir::new().unwrap();
    let mut config = create_test_config(&format!("{}/", base_url), output.path());
    config.retries = 3;

    let report = run_crawl(config).await;

    // A failing page does not stop its siblings
    assert_eq!(report.progress.processed, 3);
    assert_eq!(report.progress.succeeded, 2);
    assert_eq!(report.progress.failed, 1);

    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.url, format!("{}/flaky", base_url));
    assert_eq!(failure.reason, ErrorReason::TransientFetch);
    assert_eq!(failure.message, "HTTP status 500");
}

#[tokio::test]
async fn test_transient_failure_recovers() {
    let mock_server = MockServer::start().await;

    // First request fails, later ones succeed
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/", "Home", &[]).await;

    let output = TempDir::new().unwrap();
    let report = run_crawl(create_test_config(
        &format!("{}/", mock_server.uri()),
        output.path(),
    ))
    .await;

    assert_eq!(report.progress.succeeded, 1);
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn test_pagination_links_followed_at_same_depth() {
    let mock_server = MockServer::start().await;

    // Specific query mocks first; wiremock serves the first match
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><head><title>Listing page 2</title></head><body><a href=\"?page=3\">next</a></body></html>",
        ))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><head><title>Listing page 3</title></head><body></body></html>",
        ))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/", "Listing", &["?page=2", "/item"]).await;
    mount_page(&mock_server, "/item", "Item", &[]).await;

    let output = TempDir::new().unwrap();
    let mut config = create_test_config(&format!("{}/", mock_server.uri()), output.path());
    config.max_depth = 1;
    config.pagination = true;

    let report = run_crawl(config).await;

    // Listing, its two pagination variants and the item
    assert_eq!(report.visited, 4);
    assert_eq!(exported_documents(&output).len(), 4);
}

#[tokio::test]
async fn test_links_only_skips_base_page() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", "Index", &["/one", "/two"]).await;
    mount_page(&mock_server, "/one", "One", &[]).await;
    mount_page(&mock_server, "/two", "Two", &[]).await;

    let output = TempDir::new().unwrap();
    let mut config = create_test_config(&format!("{}/", mock_server.uri()), output.path());
    config.links_only = true;

    let report = run_crawl(config).await;

    assert_eq!(report.progress.processed, 3);
    let documents = exported_documents(&output);
    assert_eq!(documents.len(), 2);
    assert!(documents.iter().all(|name| !name.starts_with("Index_")));
}

#[tokio::test]
async fn test_merge_writes_combined_document() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", "Home", &["/chapter"]).await;
    mount_page(&mock_server, "/chapter", "Chapter One", &[]).await;

    let output = TempDir::new().unwrap();
    let mut config = create_test_config(&format!("{}/", mock_server.uri()), output.path());
    config.merge = true;

    let report = run_crawl(config).await;

    let merged_path = output.path().join("merged.html");
    assert_eq!(report.merged_document.as_deref(), Some(merged_path.as_path()));

    let merged = std::fs::read_to_string(&merged_path).unwrap();
    assert!(merged.contains("<h1>Contents</h1>"));
    assert!(merged.contains("Home"));
    assert!(merged.contains("Chapter One"));
}

#[tokio::test]
async fn test_notebook_is_converted() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", "Home", &["/notebooks/demo.ipynb"]).await;

    Mock::given(method("GET"))
        .and(path("/notebooks/demo.ipynb"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r##"{
                "metadata": {},
                "cells": [
                    {"cell_type": "markdown", "source": ["# Demo Analysis\n", "Some text"]},
                    {"cell_type": "code", "source": "print(1 < 2)", "outputs": [
                        {"output_type": "stream", "name": "stdout", "text": ["True\n"]}
                    ]}
                ]
            }"##,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let output = TempDir::new().unwrap();
    let report = run_crawl(create_test_config(
        &format!("{}/", mock_server.uri()),
        output.path(),
    ))
    .await;

    assert_eq!(report.progress.succeeded, 2);

    let documents = exported_documents(&output);
    let notebook = documents
        .iter()
        .find(|name| name.starts_with("Demo_Analysis_"))
        .expect("Notebook document missing");
    let content = std::fs::read_to_string(output.path().join(notebook)).unwrap();
    assert!(content.contains("print(1 &lt; 2)"));
}

#[tokio::test]
async fn test_missing_notebook_is_recorded() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", "Home", &["/gone.ipynb"]).await;

    Mock::given(method("GET"))
        .and(path("/gone.ipynb"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let output = TempDir::new().unwrap();
    let report = run_crawl(create_test_config(
        &format!("{}/", mock_server.uri()),
        output.path(),
    ))
    .await;

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].reason, ErrorReason::Notebook);
}

#[tokio::test]
async fn test_shutdown_before_start_visits_nothing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let output = TempDir::new().unwrap();
    let config = create_test_config(&format!("{}/", mock_server.uri()), output.path());
    let renderer = Arc::new(DirectRenderer::new(config.timeout).unwrap());
    let shutdown = ShutdownCoordinator::new();
    shutdown.trigger();

    let report = crawl(config, renderer, shutdown).await.unwrap();

    assert_eq!(report.visited, 0);
    assert!(report.interrupted);
}
