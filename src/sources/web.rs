//! Same-site web crawler.

use super::{read_link_list, LoadOutcome, Loader, RawSource, SourceKind};
use crate::chunking::{Document, META_KIND, META_TITLE};
use crate::error::{AifaqError, Result};
use crate::extract::extract_html;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// A fetched web page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: Url,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchedPage {
    /// Pages without a content type are treated as HTML.
    pub fn is_html(&self) -> bool {
        match &self.content_type {
            None => true,
            Some(ct) => {
                let ct = ct.to_ascii_lowercase();
                ct.contains("text/html") || ct.contains("application/xhtml")
            }
        }
    }
}

/// Fetches a single page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Errors must be classified transient or permanent for the retry policy.
    async fn fetch(&self, url: &Url) -> Result<FetchedPage>;
}

/// `reqwest` based fetcher.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("aifaq/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

/// Classify a transport error for the retry policy.
pub(crate) fn classify_http_error(locator: &str, e: reqwest::Error) -> AifaqError {
    if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
        AifaqError::transient(locator, e.to_string())
    } else {
        AifaqError::permanent(locator, e.to_string())
    }
}

/// Classify a non-success HTTP status for the retry policy.
pub(crate) fn classify_status(locator: &str, status: reqwest::StatusCode) -> AifaqError {
    let message = format!("HTTP {}", status);
    if status.is_server_error()
        || status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
    {
        AifaqError::transient(locator, message)
    } else {
        AifaqError::permanent(locator, message)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify_http_error(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(url.as_str(), status));
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| classify_http_error(url.as_str(), e))?;

        Ok(FetchedPage {
            url: final_url,
            content_type,
            body,
        })
    }
}

/// Absolute same-scheme links found in a page, fragments removed, in document order.
pub fn extract_links(html: &str, base: &Url) -> Vec<Url> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let document = Html::parse_document(html);

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Ok(mut link) = base.join(href.trim()) else {
            continue;
        };
        if !matches!(link.scheme(), "http" | "https") {
            continue;
        }
        link.set_fragment(None);
        if seen.insert(link.to_string()) {
            links.push(link);
        }
    }
    links
}

/// Loads pages reachable from the URL list, staying on each start URL's origin.
pub struct WebLoader {
    subdir: String,
    fetcher: Arc<dyn PageFetcher>,
    retry: RetryPolicy,
    depth: usize,
    concurrency: usize,
    permits: Arc<Semaphore>,
}

impl WebLoader {
    pub fn new(
        subdir: &str,
        fetcher: Arc<dyn PageFetcher>,
        retry: RetryPolicy,
        depth: usize,
        concurrency: usize,
    ) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            subdir: subdir.to_string(),
            fetcher,
            retry,
            depth,
            concurrency,
            permits: Arc::new(Semaphore::new(concurrency)),
        }
    }

    async fn fetch_with_retry(&self, url: &Url) -> Result<FetchedPage> {
        self.retry
            .run(url.as_str(), || async {
                let _permit = self
                    .permits
                    .acquire()
                    .await
                    .map_err(|e| AifaqError::permanent(url.as_str(), e.to_string()))?;
                self.fetcher.fetch(url).await
            })
            .await
    }

    /// Breadth-first crawl from one start URL.
    async fn crawl(&self, start: String) -> LoadOutcome {
        let mut outcome = LoadOutcome::default();

        let start_url = match Url::parse(&start) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            Ok(url) => {
                let raw = RawSource::new(SourceKind::Web, &start);
                outcome.report.record_failure(
                    &raw,
                    AifaqError::permanent(&start, format!("unsupported scheme '{}'", url.scheme())),
                );
                return outcome;
            }
            Err(e) => {
                warn!("Invalid URL {}: {}", start, e);
                let raw = RawSource::new(SourceKind::Web, &start);
                outcome
                    .report
                    .record_failure(&raw, AifaqError::permanent(&start, e.to_string()));
                return outcome;
            }
        };

        let mut start_url = start_url;
        start_url.set_fragment(None);

        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(start_url.to_string());
        let mut origins = vec![start_url.origin()];
        let mut frontier = vec![start_url];

        for level in 0..=self.depth {
            if frontier.is_empty() {
                break;
            }

            let results: Vec<(Url, Result<FetchedPage>)> = stream::iter(std::mem::take(&mut frontier))
                .map(|url| async move {
                    let result = self.fetch_with_retry(&url).await;
                    (url, result)
                })
                .buffered(self.concurrency)
                .collect()
                .await;

            for (url, result) in results {
                let raw = RawSource::new(SourceKind::Web, url.as_str());
                let page = match result {
                    Ok(page) => page,
                    Err(e) => {
                        warn!("Giving up on {}: {}", url, e);
                        outcome.report.record_failure(&raw, e);
                        continue;
                    }
                };

                // A redirected start page defines the site as well.
                if level == 0 && !origins.contains(&page.url.origin()) {
                    origins.push(page.url.origin());
                }
                visited.insert(page.url.to_string());

                if !page.is_html() {
                    if level == 0 {
                        outcome.report.record_failure(
                            &raw,
                            AifaqError::permanent(
                                url.as_str(),
                                format!(
                                    "unsupported content type '{}'",
                                    page.content_type.as_deref().unwrap_or("")
                                ),
                            ),
                        );
                    } else {
                        debug!("Skipping non-HTML page {}", url);
                    }
                    continue;
                }

                outcome.report.record_success();
                let extracted = extract_html(&page.body);
                if extracted.text.is_empty() {
                    debug!("No text extracted from {}", url);
                } else {
                    let mut doc = Document::new(extracted.text, page.url.to_string())
                        .with_meta(META_KIND, SourceKind::Web.to_string());
                    if let Some(title) = extracted.title {
                        doc = doc.with_meta(META_TITLE, title);
                    }
                    outcome.documents.push(doc);
                }

                if level < self.depth {
                    for link in extract_links(&page.body, &page.url) {
                        if origins.contains(&link.origin()) && visited.insert(link.to_string()) {
                            frontier.push(link);
                        }
                    }
                }
            }
        }

        outcome
    }
}

#[async_trait]
impl Loader for WebLoader {
    fn kind(&self) -> SourceKind {
        SourceKind::Web
    }

    #[instrument(skip(self), fields(kind = "web"))]
    async fn load(&self, scope_root: &Path) -> LoadOutcome {
        let list = scope_root.join(&self.subdir);
        let mut outcome = LoadOutcome::default();

        let links = match read_link_list(&list) {
            Ok(links) => links,
            Err(e) => {
                warn!("Cannot read URL list {:?}: {}", list, e);
                outcome
                    .report
                    .record_failure(&RawSource::new(SourceKind::Web, list.display().to_string()), e);
                return outcome;
            }
        };
        if links.is_empty() {
            return outcome;
        }

        info!("Crawling {} start URLs (depth {})", links.len(), self.depth);
        let crawls: Vec<LoadOutcome> = stream::iter(links)
            .map(|link| self.crawl(link))
            .buffered(self.concurrency)
            .collect()
            .await;

        // Start URLs on the same site reach the same pages; keep the first copy.
        let mut seen_sources = HashSet::new();
        for crawl in crawls {
            outcome.report.merge(crawl.report);
            for doc in crawl.documents {
                if seen_sources.insert(doc.source().to_string()) {
                    outcome.documents.push(doc);
                }
            }
        }
        outcome
    }
}
