//! Integration tests for extraction units
//!
//! Links are served by a local wiremock server; every test works in its own
//! temporary data root.

use statpipe_common::types::SaveFileType;
use statpipe_core::extract::{Download, DownloadContent, ExtractionUnit, Extractor, ExtractorOptions, Link};
use statpipe_core::metric::{keys, UnitStatus};
use statpipe_core::{async_trait, CancellationToken, EtlError, Result, StageDirs, UnitOptions};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

const GTI_CSV: &str = "Country Name,year,overall\nChad,2020,1.5\nMali,2020,6.2\n";

/// Extractor returning a fixed list of `(path, name)` links on one server
struct StaticExtractor {
    base: String,
    links: Vec<(&'static str, &'static str)>,
}

#[async_trait]
impl Extractor for StaticExtractor {
    fn name(&self) -> &str {
        "Static"
    }

    async fn links(&self, _client: &reqwest::Client) -> Result<Vec<Link>> {
        Ok(self
            .links
            .iter()
            .map(|(path, name)| {
                Link::new(format!("{}{}", self.base, path), *name).header("X-Source", "statpipe")
            })
            .collect())
    }
}

/// Extractor whose persist step fails for one file
struct PickyExtractor {
    base: String,
}

#[async_trait]
impl Extractor for PickyExtractor {
    fn name(&self) -> &str {
        "Picky"
    }

    async fn links(&self, _client: &reqwest::Client) -> Result<Vec<Link>> {
        Ok(vec![
            Link::new(format!("{}/a.csv", self.base), "a.csv"),
            Link::new(format!("{}/meta", self.base), "meta.json").json(),
        ])
    }

    fn persist(&self, download: &Download, dirs: &StageDirs) -> Result<()> {
        match download.content {
            DownloadContent::Json(_) => Err(EtlError::format("metadata is not stored")),
            _ => statpipe_core::extract::write_download(&dirs.save_dir, download).map(|_| ()),
        }
    }
}

fn options(root: &TempDir) -> UnitOptions {
    UnitOptions::new()
        .data_root(root.path())
        .save_file_type(SaveFileType::Csv)
}

#[tokio::test]
async fn test_failed_link_is_isolated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.csv"))
        .and(header("X-Source", "statpipe"))
        .respond_with(ResponseTemplate::new(200).set_body_string(GTI_CSV))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b.csv"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let root = TempDir::new().unwrap();
    let extractor = StaticExtractor {
        base: server.uri(),
        links: vec![("/a.csv", "a.csv"), ("/b.csv", "b.csv")],
    };
    let unit = ExtractionUnit::new(extractor, &options(&root), ExtractorOptions::default()).unwrap();

    let metric = unit.extract(&CancellationToken::new()).await.unwrap();

    assert_eq!(metric.status, UnitStatus::Succeeded);
    assert_eq!(metric.get_int(keys::NUMBER_OF_LINKS), Some(2));
    assert_eq!(metric.get_int(keys::NUMBER_OF_FILES_DOWNLOADED), Some(1));
    assert_eq!(metric.get_int(keys::NUMBER_OF_FILES_WRITTEN), Some(1));
    assert_eq!(
        metric.get(keys::FAILED_LINKS).and_then(|v| v.as_list()),
        Some(&["b.csv".to_string()][..])
    );

    let saved = unit.context().save_dir().join("a.csv");
    assert_eq!(std::fs::read_to_string(saved).unwrap(), GTI_CSV);
    assert!(!unit.context().save_dir().join("b.csv").exists());
}

#[tokio::test]
async fn test_fetch_all_keeps_link_order() {
    let server = MockServer::start().await;
    for (route, body) in [("/1", "one"), ("/2", "two"), ("/3", "three")] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(body)
                    .set_delay(Duration::from_millis(if route == "/1" { 50 } else { 0 })),
            )
            .mount(&server)
            .await;
    }

    let root = TempDir::new().unwrap();
    let extractor = StaticExtractor {
        base: server.uri(),
        links: vec![],
    };
    let unit = ExtractionUnit::new(
        extractor,
        &options(&root),
        ExtractorOptions::default().max_concurrent_requests(3),
    )
    .unwrap();

    let links = ["1", "2", "3"]
        .iter()
        .map(|n| Link::new(format!("{}/{}", server.uri(), n), format!("{}.txt", n)))
        .collect();
    let fetched = unit.fetch_all(links, &CancellationToken::new()).await;

    let names: Vec<&str> = fetched.downloads.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["1.txt", "2.txt", "3.txt"]);
    assert_eq!(fetched.downloads[0].content, DownloadContent::Text("one".into()));
    assert!(fetched.failures.is_empty());
}

#[tokio::test]
async fn test_failed_write_is_recorded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string(GTI_CSV))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/meta"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"rows": 2})))
        .mount(&server)
        .await;

    let root = TempDir::new().unwrap();
    let unit = ExtractionUnit::new(
        PickyExtractor { base: server.uri() },
        &options(&root),
        ExtractorOptions::default(),
    )
    .unwrap();

    let metric = unit.extract(&CancellationToken::new()).await.unwrap();

    assert_eq!(metric.get_int(keys::NUMBER_OF_FILES_DOWNLOADED), Some(2));
    assert_eq!(metric.get_int(keys::NUMBER_OF_FILES_WRITTEN), Some(1));
    assert_eq!(
        metric.get(keys::FAILED_WRITES).and_then(|v| v.as_list()),
        Some(&["meta.json".to_string()][..])
    );
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let root = TempDir::new().unwrap();
    let extractor = StaticExtractor {
        base: "http://127.0.0.1:9".into(),
        links: vec![("/a.csv", "a.csv")],
    };
    let unit = ExtractionUnit::new(extractor, &options(&root), ExtractorOptions::default()).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = unit.extract(&cancel).await.unwrap_err();
    assert!(matches!(err, EtlError::Cancelled));
    assert_eq!(unit.context().snapshot().status, UnitStatus::Cancelled);
}

#[tokio::test]
async fn test_directories_follow_unit_name() {
    let root = TempDir::new().unwrap();
    let extractor = StaticExtractor {
        base: String::new(),
        links: vec![],
    };
    let unit = ExtractionUnit::new(extractor, &options(&root), ExtractorOptions::default()).unwrap();

    assert_eq!(unit.context().data_dir(), root.path().join("static").join("staging"));
    assert_eq!(unit.context().save_dir(), root.path().join("static").join("extracted"));

    let metric = unit.extract(&CancellationToken::new()).await.unwrap();
    assert_eq!(metric.get_int(keys::NUMBER_OF_LINKS), Some(0));
    assert_eq!(metric.status, UnitStatus::Succeeded);
}
