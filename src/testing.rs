//! In-process stand-ins for the network services, used by unit tests.

use crate::embedding::Embedder;
use crate::error::{AifaqError, Result};
use crate::llm::ChatModel;
use crate::sources::{FetchedPage, PageFetcher, TranscriptService};
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;

/// Deterministic bag-of-words embedder: each lowercase word is hashed into
/// one of 64 buckets and the vector is normalized.
pub struct HashEmbedder {
    model: String,
}

impl HashEmbedder {
    pub const MODEL: &'static str = "hash-embedding-64";
    pub const DIMENSIONS: usize = 64;

    pub fn named(model: &str) -> Self {
        Self {
            model: model.to_string(),
        }
    }

    fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; Self::DIMENSIONS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            vector[(hasher.finish() % Self::DIMENSIONS as u64) as usize] += 1.0;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::named(Self::MODEL)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// One recorded chat exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCall {
    pub system: String,
    pub user: String,
}

/// Chat model that records its prompts and replies from a script.
/// The last reply repeats once the script runs out.
pub struct RecordingChat {
    replies: Vec<String>,
    calls: Mutex<Vec<ChatCall>>,
}

impl RecordingChat {
    pub fn replying(reply: &str) -> Self {
        Self::with_replies(vec![reply])
    }

    pub fn with_replies(replies: Vec<&str>) -> Self {
        Self {
            replies: replies.into_iter().map(str::to_string).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<ChatCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for RecordingChat {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let mut calls = self.calls.lock().unwrap();
        let reply = self
            .replies
            .get(calls.len())
            .or_else(|| self.replies.last())
            .cloned()
            .unwrap_or_default();
        calls.push(ChatCall {
            system: system.to_string(),
            user: user.to_string(),
        });
        Ok(reply)
    }

    fn model(&self) -> &str {
        "recording-chat"
    }
}

/// Chat model whose every call fails.
#[derive(Default)]
pub struct FailingChat;

#[async_trait]
impl ChatModel for FailingChat {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
        Err(AifaqError::ExternalService("chat model unavailable".to_string()))
    }

    fn model(&self) -> &str {
        "failing-chat"
    }
}

/// Serves canned pages; unknown URLs fail with a permanent error.
#[derive(Clone, Default)]
pub struct StaticFetcher {
    pages: HashMap<String, (String, Option<String>)>,
    redirects: HashMap<String, String>,
    failures: HashMap<String, usize>,
    requested: Arc<Mutex<Vec<String>>>,
}

fn url_key(url: &str) -> String {
    Url::parse(url).map(|u| u.to_string()).unwrap_or_else(|_| url.to_string())
}

impl StaticFetcher {
    pub fn page(self, url: &str, body: &str) -> Self {
        self.insert(url, body, None)
    }

    pub fn page_with_type(self, url: &str, body: &str, content_type: &str) -> Self {
        self.insert(url, body, Some(content_type.to_string()))
    }

    fn insert(mut self, url: &str, body: &str, content_type: Option<String>) -> Self {
        self.pages.insert(url_key(url), (body.to_string(), content_type));
        self
    }

    /// Requests for `from` are answered with the page at `to`.
    pub fn redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(url_key(from), url_key(to));
        self
    }

    /// The first `n` requests for `url` fail with a transient error.
    pub fn failing_first(mut self, url: &str, n: usize) -> Self {
        self.failures.insert(url_key(url), n);
        self
    }

    /// Every request for `url` fails with a transient error.
    pub fn always_failing(self, url: &str) -> Self {
        self.failing_first(url, usize::MAX)
    }

    pub fn was_requested(&self, url: &str) -> bool {
        self.requests(url) > 0
    }

    /// Number of requests made for `url`.
    pub fn requests(&self, url: &str) -> usize {
        let key = url_key(url);
        self.requested.lock().unwrap().iter().filter(|u| **u == key).count()
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
        let previous = {
            let mut requested = self.requested.lock().unwrap();
            let previous = requested.iter().filter(|u| *u == url.as_str()).count();
            requested.push(url.to_string());
            previous
        };
        if previous < self.failures.get(url.as_str()).copied().unwrap_or(0) {
            return Err(AifaqError::transient(url.as_str(), "HTTP 503 Service Unavailable"));
        }

        let target = match self.redirects.get(url.as_str()) {
            Some(to) => Url::parse(to).map_err(|e| AifaqError::permanent(url.as_str(), e.to_string()))?,
            None => url.clone(),
        };
        match self.pages.get(target.as_str()) {
            Some((body, content_type)) => Ok(FetchedPage {
                url: target,
                content_type: content_type.clone(),
                body: body.clone(),
            }),
            None => Err(AifaqError::permanent(url.as_str(), "HTTP 404 Not Found")),
        }
    }
}

/// Serves canned transcripts and counts calls across clones.
#[derive(Clone, Default)]
pub struct StaticTranscripts {
    transcripts: HashMap<String, String>,
    failures: usize,
    calls: Arc<AtomicUsize>,
}

impl StaticTranscripts {
    pub fn transcript(mut self, video_id: &str, text: &str) -> Self {
        self.transcripts.insert(video_id.to_string(), text.to_string());
        self
    }

    /// Every call fails with a transient error.
    pub fn always_failing(self) -> Self {
        self.failing_first(usize::MAX)
    }

    /// The first `n` calls fail with a transient error.
    pub fn failing_first(mut self, n: usize) -> Self {
        self.failures = n;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscriptService for StaticTranscripts {
    async fn fetch_transcript(&self, video_id: &str) -> Result<Option<String>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(AifaqError::transient(video_id, "connection reset"));
        }
        Ok(self.transcripts.get(video_id).cloned())
    }
}
