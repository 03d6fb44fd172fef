//! Source acquisition for the knowledge base.
//!
//! Every source kind has a [`Loader`] that enumerates its sub-path under a
//! scope's dataset root and turns each item into [`Document`]s. A failing item
//! is recorded in the [`LoadReport`] and never aborts the batch.

mod files;
mod web;
mod youtube;

pub use files::{HtmlLoader, PdfLoader, ReadTheDocsLoader, TextLoader};
pub use web::{FetchedPage, HttpFetcher, PageFetcher, WebLoader};
pub use youtube::{
    extract_video_id, transcript_path, transcripts_dir, TranscriptService, YouTubeLoader,
    YouTubeTranscriptClient,
};

use crate::chunking::Document;
use crate::config::Settings;
use crate::error::Result;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Access partition of the dataset and of every indexed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessScope {
    Public,
    Private,
}

impl AccessScope {
    pub const ALL: [AccessScope; 2] = [AccessScope::Public, AccessScope::Private];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessScope::Public => "public",
            AccessScope::Private => "private",
        }
    }
}

impl std::fmt::Display for AccessScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccessScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(AccessScope::Public),
            "private" => Ok(AccessScope::Private),
            _ => Err(format!("Unknown access scope: {}", s)),
        }
    }
}

/// Kind of acquisition unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Web,
    Html,
    Pdf,
    ReadTheDocs,
    YouTube,
    Text,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Web => write!(f, "web"),
            SourceKind::Html => write!(f, "html"),
            SourceKind::Pdf => write!(f, "pdf"),
            SourceKind::ReadTheDocs => write!(f, "rtdocs"),
            SourceKind::YouTube => write!(f, "youtube"),
            SourceKind::Text => write!(f, "text"),
        }
    }
}

/// One acquisition unit: a URL or a file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSource {
    pub kind: SourceKind,
    pub locator: String,
}

impl RawSource {
    pub fn new(kind: SourceKind, locator: impl Into<String>) -> Self {
        Self {
            kind,
            locator: locator.into(),
        }
    }
}

/// An item that was excluded from the corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedSource {
    pub kind: SourceKind,
    pub locator: String,
    /// Last error seen for the item.
    pub error: String,
}

/// Aggregate success/failure counts for a batch of sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    pub succeeded: usize,
    pub failed: Vec<FailedSource>,
}

impl LoadReport {
    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, source: &RawSource, error: impl ToString) {
        self.failed.push(FailedSource {
            kind: source.kind,
            locator: source.locator.clone(),
            error: error.to_string(),
        });
    }

    pub fn merge(&mut self, other: LoadReport) {
        self.succeeded += other.succeeded;
        self.failed.extend(other.failed);
    }
}

/// Documents produced by a loader together with its report.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub documents: Vec<Document>,
    pub report: LoadReport,
}

impl LoadOutcome {
    pub fn extend(&mut self, other: LoadOutcome) {
        self.documents.extend(other.documents);
        self.report.merge(other.report);
    }
}

/// Produces documents for one source kind.
#[async_trait]
pub trait Loader: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Load every item of this kind below `scope_root`.
    ///
    /// Item failures land in the report; a missing sub-path yields nothing.
    async fn load(&self, scope_root: &Path) -> LoadOutcome;
}

/// The fixed loader table, run in a deterministic order.
pub struct LoaderRegistry {
    loaders: Vec<Box<dyn Loader>>,
}

impl LoaderRegistry {
    pub fn new(loaders: Vec<Box<dyn Loader>>) -> Self {
        Self { loaders }
    }

    /// Standard table: web, html, pdf, rtdocs, youtube, text.
    pub fn standard(
        settings: &Settings,
        fetcher: Arc<dyn PageFetcher>,
        transcripts: Arc<dyn TranscriptService>,
    ) -> Self {
        let dataset = &settings.dataset;
        let ingest = &settings.ingest;
        let retry = RetryPolicy::from_settings(ingest);

        Self::new(vec![
            Box::new(WebLoader::new(
                &dataset.web_urls,
                fetcher,
                retry.clone(),
                ingest.crawl_depth,
                ingest.max_concurrent_fetches,
            )),
            Box::new(HtmlLoader::new(&dataset.html_files)),
            Box::new(PdfLoader::new(&dataset.pdf_files)),
            Box::new(ReadTheDocsLoader::new(&dataset.rtdocs_files)),
            Box::new(YouTubeLoader::new(
                &dataset.yt_video_links,
                transcripts,
                retry,
                ingest.max_concurrent_fetches,
            )),
            Box::new(TextLoader::new(&dataset.text_files)),
        ])
    }

    pub fn kinds(&self) -> Vec<SourceKind> {
        self.loaders.iter().map(|l| l.kind()).collect()
    }

    /// Run every loader against a scope root and concatenate the results.
    pub async fn load_all(&self, scope_root: &Path) -> LoadOutcome {
        let mut outcome = LoadOutcome::default();
        for loader in &self.loaders {
            let part = loader.load(scope_root).await;
            debug!(
                "{} loader: {} documents, {} failed",
                loader.kind(),
                part.documents.len(),
                part.report.failed.len()
            );
            outcome.extend(part);
        }
        info!(
            "Loaded {} documents from {:?} ({} sources ok, {} failed)",
            outcome.documents.len(),
            scope_root,
            outcome.report.succeeded,
            outcome.report.failed.len()
        );
        outcome
    }
}

/// Read a newline-delimited link list.
///
/// `path` may be a single file or a directory of files (sub-directories are
/// not read). Blank lines and lines starting with `#` are ignored. A missing
/// path yields no links.
pub fn read_link_list(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        debug!("Link list {:?} not found", path);
        return Ok(Vec::new());
    }

    let files = if path.is_dir() {
        files::collect_files(path, &[], false)?
    } else {
        vec![path.to_path_buf()]
    };

    let mut links = Vec::new();
    for file in files {
        let content = std::fs::read_to_string(&file)?;
        links.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string),
        );
    }
    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_scope_parse_and_display() {
        assert_eq!("PUBLIC".parse::<AccessScope>().unwrap(), AccessScope::Public);
        assert_eq!(AccessScope::Private.to_string(), "private");
        assert!("secret".parse::<AccessScope>().is_err());
    }

    #[test]
    fn test_read_link_list_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "https://b.example\n").unwrap();
        std::fs::write(
            dir.path().join("a.txt"),
            "# start pages\nhttps://a.example\n\n  https://a.example/faq  \n",
        )
        .unwrap();

        let links = read_link_list(dir.path()).unwrap();
        assert_eq!(
            links,
            vec!["https://a.example", "https://a.example/faq", "https://b.example"]
        );
    }

    #[test]
    fn test_read_link_list_missing_path_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_link_list(&dir.path().join("nope")).unwrap().is_empty());
    }

    #[test]
    fn test_report_merge() {
        let mut a = LoadReport::default();
        a.record_success();
        let mut b = LoadReport::default();
        b.record_failure(&RawSource::new(SourceKind::Web, "https://x"), "timeout");
        a.merge(b);
        assert_eq!(a.succeeded, 1);
        assert_eq!(a.failed.len(), 1);
        assert_eq!(a.failed[0].locator, "https://x");
    }

    #[tokio::test]
    async fn test_standard_registry_order() {
        let settings = Settings::default();
        let registry = LoaderRegistry::standard(
            &settings,
            Arc::new(crate::testing::StaticFetcher::default()),
            Arc::new(crate::testing::StaticTranscripts::default()),
        );
        assert_eq!(
            registry.kinds(),
            vec![
                SourceKind::Web,
                SourceKind::Html,
                SourceKind::Pdf,
                SourceKind::ReadTheDocs,
                SourceKind::YouTube,
                SourceKind::Text,
            ]
        );
    }
}
