//! YouTube transcripts.
//!
//! Transcripts are fetched per video, written to
//! `<yt_video_links>/transcripts/<id>_transcript.txt` and then read back like
//! any other text file. An existing transcript file is reused.

use super::files::load_text_file;
use super::web::{classify_http_error, classify_status};
use super::{read_link_list, LoadOutcome, Loader, RawSource, SourceKind};
use crate::chunking::{Document, META_KIND, META_SOURCE, META_VIDEO_ID};
use crate::error::{AifaqError, Result};
use crate::extract::normalize_whitespace;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Extract the video id from a YouTube URL.
///
/// Supports `youtu.be/<id>`, `youtube.com/watch?v=<id>` and the
/// `/embed/`, `/shorts/`, `/live/` path forms. Anything else is `None`.
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    let url = if input.contains("://") {
        Url::parse(input).ok()?
    } else {
        Url::parse(&format!("https://{}", input)).ok()?
    };

    let host = url.host_str()?;
    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("m."))
        .unwrap_or(host);

    let id = match host {
        "youtu.be" => url.path_segments()?.next().map(str::to_string),
        "youtube.com" | "music.youtube.com" | "youtube-nocookie.com" => {
            if url.path() == "/watch" {
                url.query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned())
            } else {
                let mut segments = url.path_segments()?;
                match (segments.next(), segments.next()) {
                    (Some("embed" | "shorts" | "live" | "v"), Some(id)) => Some(id.to_string()),
                    _ => None,
                }
            }
        }
        _ => None,
    }?;

    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then_some(id)
}

/// Folder below the link folder holding fetched transcripts.
pub fn transcripts_dir(links_folder: &Path) -> PathBuf {
    links_folder.join("transcripts")
}

/// Where the transcript of `video_id` is stored below the link folder.
pub fn transcript_path(links_folder: &Path, video_id: &str) -> PathBuf {
    transcripts_dir(links_folder).join(format!("{}_transcript.txt", video_id))
}

/// External transcript provider.
#[async_trait]
pub trait TranscriptService: Send + Sync {
    /// Fetch the transcript text. `Ok(None)` when the video has none.
    async fn fetch_transcript(&self, video_id: &str) -> Result<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "languageCode", default)]
    language_code: String,
    /// `asr` for auto-generated captions.
    #[serde(default)]
    kind: Option<String>,
}

/// Reads captions the way the YouTube web player does: the watch page lists
/// caption tracks, each track serves timed-text XML.
pub struct YouTubeTranscriptClient {
    client: reqwest::Client,
    languages: Vec<String>,
}

impl YouTubeTranscriptClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("aifaq/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            languages: vec!["en".to_string()],
        })
    }

    async fn get_text(&self, video_id: &str, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| classify_http_error(video_id, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(video_id, status));
        }
        response
            .text()
            .await
            .map_err(|e| classify_http_error(video_id, e))
    }

    fn pick_track<'a>(&self, tracks: &'a [CaptionTrack]) -> Option<&'a CaptionTrack> {
        let manual = |t: &&CaptionTrack| t.kind.as_deref() != Some("asr");
        self.languages
            .iter()
            .find_map(|lang| {
                tracks
                    .iter()
                    .filter(manual)
                    .find(|t| &t.language_code == lang)
                    .or_else(|| tracks.iter().find(|t| &t.language_code == lang))
            })
            .or_else(|| tracks.first())
    }
}

#[async_trait]
impl TranscriptService for YouTubeTranscriptClient {
    async fn fetch_transcript(&self, video_id: &str) -> Result<Option<String>> {
        let watch_url = format!("https://www.youtube.com/watch?v={}", video_id);
        let page = self.get_text(video_id, &watch_url).await?;

        let Some(tracks_json) = caption_tracks_json(&page) else {
            debug!("No caption tracks listed for {}", video_id);
            return Ok(None);
        };
        let tracks: Vec<CaptionTrack> = serde_json::from_str(tracks_json)
            .map_err(|e| AifaqError::permanent(video_id, format!("malformed caption list: {}", e)))?;

        let Some(track) = self.pick_track(&tracks) else {
            return Ok(None);
        };
        debug!("Using {} captions for {}", track.language_code, video_id);

        let xml = self.get_text(video_id, &track.base_url).await?;
        let text = parse_timed_text(&xml, video_id)?;
        Ok((!text.is_empty()).then_some(text))
    }
}

/// Locate the JSON array following `"captionTracks":` in a watch page.
fn caption_tracks_json(page: &str) -> Option<&str> {
    let marker = "\"captionTracks\":";
    let start = page.find(marker)? + marker.len();
    let rest = &page[start..];
    if !rest.starts_with('[') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in rest.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&rest[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Concatenate the text segments of a timed-text XML document.
pub fn parse_timed_text(xml: &str, video_id: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut segments: Vec<String> = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Text(text)) => {
                let once = text.unescape().map_err(|e| AifaqError::Extraction {
                    source_id: video_id.to_string(),
                    message: e.to_string(),
                })?;
                // Caption text is escaped twice (`&amp;#39;`).
                let twice = quick_xml::escape::unescape(&once)
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| once.to_string());
                segments.push(twice);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(AifaqError::Extraction {
                    source_id: video_id.to_string(),
                    message: format!("invalid transcript XML: {}", e),
                })
            }
        }
    }

    Ok(normalize_whitespace(&segments.join(" ")))
}

/// Loads transcripts for the videos listed in the link folder.
pub struct YouTubeLoader {
    subdir: String,
    service: Arc<dyn TranscriptService>,
    retry: RetryPolicy,
    concurrency: usize,
}

impl YouTubeLoader {
    pub fn new(
        subdir: &str,
        service: Arc<dyn TranscriptService>,
        retry: RetryPolicy,
        concurrency: usize,
    ) -> Self {
        Self {
            subdir: subdir.to_string(),
            service,
            retry,
            concurrency: concurrency.max(1),
        }
    }

    /// Fetch (or reuse) one video's transcript. `Ok(None)` for an empty transcript.
    async fn load_video(&self, folder: &Path, link: &str) -> Result<Option<Document>> {
        let video_id = extract_video_id(link)
            .ok_or_else(|| AifaqError::permanent(link, "not a recognized YouTube URL"))?;
        let path = transcript_path(folder, &video_id);

        if path.exists() {
            debug!("Reusing stored transcript {:?}", path);
        } else {
            let transcript = self
                .retry
                .run(&video_id, || self.service.fetch_transcript(&video_id))
                .await?
                .ok_or_else(|| AifaqError::permanent(link, "no transcript available"))?;

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, transcript)?;
            debug!("Saved transcript for {} to {:?}", video_id, path);
        }

        Ok(load_text_file(&path, SourceKind::YouTube)?.map(|doc| {
            doc.with_meta(META_SOURCE, link)
                .with_meta(META_VIDEO_ID, video_id)
                .with_meta(META_KIND, SourceKind::YouTube.to_string())
        }))
    }
}

#[async_trait]
impl Loader for YouTubeLoader {
    fn kind(&self) -> SourceKind {
        SourceKind::YouTube
    }

    #[instrument(skip(self), fields(kind = "youtube"))]
    async fn load(&self, scope_root: &Path) -> LoadOutcome {
        let folder = scope_root.join(&self.subdir);
        let mut outcome = LoadOutcome::default();

        let links = match read_link_list(&folder) {
            Ok(links) => links,
            Err(e) => {
                warn!("Cannot read video list {:?}: {}", folder, e);
                outcome.report.record_failure(
                    &RawSource::new(SourceKind::YouTube, folder.display().to_string()),
                    e,
                );
                return outcome;
            }
        };
        if links.is_empty() {
            return outcome;
        }

        info!("Fetching transcripts for {} videos", links.len());
        let results: Vec<(String, Result<Option<Document>>)> = stream::iter(links)
            .map(|link| {
                let folder = &folder;
                async move {
                    let result = self.load_video(folder, &link).await;
                    (link, result)
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        for (link, result) in results {
            let raw = RawSource::new(SourceKind::YouTube, &link);
            match result {
                Ok(doc) => {
                    outcome.report.record_success();
                    outcome.documents.extend(doc);
                }
                Err(e) => {
                    warn!("Skipping video {}: {}", link, e);
                    outcome.report.record_failure(&raw, e);
                }
            }
        }
        outcome
    }
}
