//! Extraction stage
//!
//! An [`Extractor`] describes *what* to download: the [`Link`]s, how to post
//! process a [`Download`], and how to store it. An [`ExtractionUnit`] does the
//! downloading:
//!
//! 1. enumerate links
//! 2. fetch every link concurrently over one shared `reqwest::Client`
//! 3. persist every successful download concurrently on the blocking pool
//!
//! A failed link or a failed write is logged and recorded in the unit's metric;
//! it never aborts its siblings.
//!
//! # Example
//!
//! ```no_run
//! use statpipe_core::async_trait;
//! use statpipe_core::extract::{Extractor, ExtractionUnit, ExtractorOptions, Link};
//! use statpipe_core::{Result, UnitOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! struct Census;
//!
//! #[async_trait]
//! impl Extractor for Census {
//!     fn name(&self) -> &str {
//!         "census"
//!     }
//!
//!     async fn links(&self, _client: &reqwest::Client) -> Result<Vec<Link>> {
//!         Ok(vec![Link::new("https://example.org/census.csv", "census.csv")])
//!     }
//! }
//!
//! # async fn run() -> Result<()> {
//! let unit = ExtractionUnit::new(Census, &UnitOptions::new(), ExtractorOptions::default())?;
//! let metric = unit.extract(&CancellationToken::new()).await?;
//! println!("{:?}", metric.get_int("number_of_files_downloaded"));
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dirs::{StageDirs, StageKind, UnitOptions};
use crate::error::{EtlError, Result};
use crate::metric::{keys, Metric};
use crate::unit::UnitContext;

// ============================================================================
// Defaults
// ============================================================================

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Default number of in-flight requests per extractor.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 16;

/// Encoding applied to text links unless told otherwise.
pub const DEFAULT_ENCODING: &str = "utf-8";

const USER_AGENT: &str = concat!("statpipe/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Links and downloads
// ============================================================================

/// How the body of a link is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentKind {
    /// Decoded to a string with the link's encoding, raw bytes without one
    #[default]
    Text,
    Json,
    Binary,
}

/// One resource to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: String,
    /// File name the download is stored under
    pub name: String,
    pub headers: Vec<(String, String)>,
    pub content: ContentKind,
    pub encoding: Option<String>,
}

impl Link {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            headers: Vec::new(),
            content: ContentKind::Text,
            encoding: Some(DEFAULT_ENCODING.to_string()),
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn json(mut self) -> Self {
        self.content = ContentKind::Json;
        self
    }

    /// Keep the body as raw bytes
    pub fn binary(mut self) -> Self {
        self.content = ContentKind::Binary;
        self.encoding = None;
        self
    }

    /// Decode text with the given label, `None` keeps raw bytes
    pub fn encoding(mut self, label: Option<&str>) -> Self {
        self.encoding = label.map(str::to_string);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DownloadContent {
    Bytes(Bytes),
    Text(String),
    Json(serde_json::Value),
}

impl DownloadContent {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            DownloadContent::Bytes(bytes) => Ok(bytes.to_vec()),
            DownloadContent::Text(text) => Ok(text.as_bytes().to_vec()),
            DownloadContent::Json(value) => Ok(serde_json::to_vec_pretty(value)?),
        }
    }
}

/// Body of a successfully fetched [`Link`]
#[derive(Debug, Clone, PartialEq)]
pub struct Download {
    pub name: String,
    pub content: DownloadContent,
}

/// A link that produced no download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFailure {
    pub name: String,
    pub url: String,
    pub error: String,
}

/// Outcome of the fetch phase
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Successful downloads, in link order
    pub downloads: Vec<Download>,
    pub failures: Vec<LinkFailure>,
}

/// Write a download to `{dir}/{name}`
pub fn write_download(dir: &Path, download: &Download) -> Result<PathBuf> {
    let file_name = Path::new(&download.name);
    let plain = file_name.components().count() == 1
        && file_name.file_name().map(|n| n == file_name.as_os_str()).unwrap_or(false);
    if !plain {
        return Err(EtlError::format(format!(
            "download name '{}' is not a plain file name",
            download.name
        )));
    }

    std::fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    std::fs::write(&path, download.content.to_bytes()?)?;
    Ok(path)
}

// ============================================================================
// Extractor contract
// ============================================================================

#[async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &str;

    /// Resources to fetch; the client is available for sources that have to be crawled
    async fn links(&self, client: &reqwest::Client) -> Result<Vec<Link>>;

    /// Post-process a download before it is persisted
    fn parse(&self, download: Download) -> Result<Download> {
        Ok(download)
    }

    /// Store one download; runs on the blocking pool
    fn persist(&self, download: &Download, dirs: &StageDirs) -> Result<()> {
        write_download(&dirs.save_dir, download).map(|_| ())
    }

    /// Directory for intermediate artifacts, relative to the data root
    fn default_data_dir(&self) -> Option<PathBuf> {
        None
    }

    /// Output directory, relative to the data root
    fn default_save_dir(&self) -> Option<PathBuf> {
        None
    }
}

/// HTTP settings of an extraction unit
#[derive(Debug, Clone)]
pub struct ExtractorOptions {
    pub request_timeout: Duration,
    pub max_concurrent_requests: usize,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }
}

impl ExtractorOptions {
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn max_concurrent_requests(mut self, limit: usize) -> Self {
        self.max_concurrent_requests = limit.max(1);
        self
    }
}

// ============================================================================
// Extraction unit
// ============================================================================

pub struct ExtractionUnit {
    extractor: Arc<dyn Extractor>,
    context: UnitContext,
    client: reqwest::Client,
    options: ExtractorOptions,
}

impl std::fmt::Debug for ExtractionUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionUnit")
            .field("name", &self.context.name())
            .field("dirs", self.context.dirs())
            .field("options", &self.options)
            .finish()
    }
}

impl ExtractionUnit {
    pub fn new<E>(extractor: E, unit: &UnitOptions, options: ExtractorOptions) -> Result<Self>
    where
        E: Extractor + 'static,
    {
        Self::from_arc(Arc::new(extractor), unit, options)
    }

    pub fn from_arc(
        extractor: Arc<dyn Extractor>,
        unit: &UnitOptions,
        options: ExtractorOptions,
    ) -> Result<Self> {
        let context = UnitContext::new(
            StageKind::Extractor,
            extractor.name(),
            unit,
            extractor.default_data_dir(),
            extractor.default_save_dir(),
        )?;

        let client = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| EtlError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            extractor,
            context,
            client,
            options,
        })
    }

    pub fn name(&self) -> &str {
        self.context.name()
    }

    pub fn context(&self) -> &UnitContext {
        &self.context
    }

    /// Fetch every link concurrently; one link's failure never affects another
    pub async fn fetch_all(&self, links: Vec<Link>, cancel: &CancellationToken) -> FetchReport {
        let concurrency = self.options.max_concurrent_requests.max(1);
        let outcomes: Vec<(Link, Result<Download>)> = stream::iter(links)
            .map(|link| {
                let client = self.client.clone();
                let cancel = cancel.clone();
                async move {
                    let outcome = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Err(EtlError::Cancelled),
                        fetched = fetch_link(&client, &link) => fetched,
                    };
                    (link, outcome)
                }
            })
            .buffered(concurrency)
            .collect()
            .await;

        let mut report = FetchReport::default();
        for (link, outcome) in outcomes {
            match outcome.and_then(|download| self.extractor.parse(download)) {
                Ok(download) => {
                    debug!(unit = %self.name(), link = %link.name, "Fetched link");
                    report.downloads.push(download);
                },
                Err(err) => {
                    warn!(
                        unit = %self.name(),
                        link = %link.name,
                        url = %link.url,
                        error = %err,
                        "Link failed"
                    );
                    report.failures.push(LinkFailure {
                        name: link.name,
                        url: link.url,
                        error: err.to_string(),
                    });
                },
            }
        }
        report
    }

    /// Run the unit: fetch, then persist, then finalize the metric
    pub async fn extract(&self, cancel: &CancellationToken) -> Result<Metric> {
        let outcome = self.run(cancel).await;
        self.context.conclude(outcome)
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(EtlError::Cancelled);
        }

        let links = self.extractor.links(&self.client).await?;
        info!(unit = %self.name(), links = links.len(), "Starting extraction");
        self.context.record(keys::NUMBER_OF_LINKS, links.len());

        let fetched = self.fetch_all(links, cancel).await;
        let downloaded = fetched.downloads.len();
        self.context.record(keys::NUMBER_OF_FILES_DOWNLOADED, downloaded);
        self.context.record(
            keys::FAILED_LINKS,
            fetched
                .failures
                .iter()
                .map(|failure| failure.name.clone())
                .collect::<Vec<_>>(),
        );

        if cancel.is_cancelled() {
            return Err(EtlError::Cancelled);
        }

        let (written, failed_writes) = self.persist_all(fetched.downloads).await;
        self.context.record(keys::NUMBER_OF_FILES_WRITTEN, written);
        self.context.record(keys::FAILED_WRITES, failed_writes.clone());

        info!(
            unit = %self.name(),
            downloaded,
            written,
            failed_links = fetched.failures.len(),
            failed_writes = failed_writes.len(),
            "Extraction finished"
        );
        Ok(())
    }

    async fn persist_all(&self, downloads: Vec<Download>) -> (usize, Vec<String>) {
        let mut tasks = JoinSet::new();
        for download in downloads {
            let extractor = Arc::clone(&self.extractor);
            let dirs = self.context.dirs().clone();
            tasks.spawn_blocking(move || {
                let outcome = extractor.persist(&download, &dirs);
                (download.name, outcome)
            });
        }

        let mut written = 0;
        let mut failed = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => written += 1,
                Ok((name, Err(err))) => {
                    warn!(unit = %self.name(), file = %name, error = %err, "Failed to persist download");
                    failed.push(name);
                },
                Err(join_err) => {
                    error!(unit = %self.name(), error = %join_err, "Persist task aborted");
                    failed.push(format!("<task: {}>", join_err));
                },
            }
        }
        failed.sort();
        (written, failed)
    }
}

async fn fetch_link(client: &reqwest::Client, link: &Link) -> Result<Download> {
    let mut request = client.get(&link.url);
    for (key, value) in &link.headers {
        request = request.header(key.as_str(), value.as_str());
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(EtlError::ResourceNotFound {
            name: link.name.clone(),
            url: link.url.clone(),
            status: status.as_u16(),
        });
    }

    let content = match (link.content, link.encoding.as_deref()) {
        (ContentKind::Json, _) => DownloadContent::Json(response.json().await?),
        (ContentKind::Text, Some(label)) => {
            DownloadContent::Text(response.text_with_charset(label).await?)
        },
        (ContentKind::Text, None) | (ContentKind::Binary, _) => {
            DownloadContent::Bytes(response.bytes().await?)
        },
    };

    Ok(Download {
        name: link.name.clone(),
        content,
    })
}
