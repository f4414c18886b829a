use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

pub mod timedtext;
pub mod watch_page;

#[cfg(test)]
pub(crate) mod stub_server;

use crate::extractors::VideoId;

/// Default oEmbed endpoint used for availability probes
pub const OEMBED_ENDPOINT: &str = "https://www.youtube.com/oembed";

/// Individual transcript segment with timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Segment text
    pub text: String,

    /// Start time in seconds
    #[serde(deserialize_with = "non_negative_seconds")]
    pub start: f64,

    /// Duration in seconds
    #[serde(deserialize_with = "non_negative_seconds")]
    pub duration: f64,
}

fn non_negative_seconds<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(f64::deserialize(deserializer)?.max(0.0))
}

impl TranscriptSegment {
    pub fn new(text: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            text: text.into(),
            start: start.max(0.0),
            duration: duration.max(0.0),
        }
    }
}

/// Ordered caption segments for one video.
///
/// A transcript with `is_unavailable_message` set is a synthesized
/// placeholder: it holds one explanatory segment and its timing carries no
/// caption meaning.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    pub segments: Vec<TranscriptSegment>,

    #[serde(default)]
    pub is_unavailable_message: bool,
}

impl Transcript {
    pub fn new(segments: Vec<TranscriptSegment>) -> Self {
        Self {
            segments,
            is_unavailable_message: false,
        }
    }

    /// Single-segment stand-in used when no captions could be obtained
    pub fn placeholder(message: impl Into<String>) -> Self {
        Self {
            segments: vec![TranscriptSegment::new(message, 0.0, 0.0)],
            is_unavailable_message: true,
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// All segment texts joined with single spaces
    pub fn full_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a best-effort metadata probe
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Availability {
    pub exists: bool,
    pub title: Option<String>,
}

/// Failures surfaced by a transcript provider
#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("No transcript found for video {video_id}: {reason}")]
    NotFound { video_id: String, reason: String },

    #[error("Video {video_id} is unavailable: {reason}")]
    Unavailable { video_id: String, reason: String },

    #[error("{provider} request failed: {reason}")]
    Upstream {
        provider: &'static str,
        reason: String,
    },
}

impl ProviderError {
    pub fn not_found(video_id: &VideoId, reason: impl Into<String>) -> Self {
        Self::NotFound {
            video_id: video_id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn unavailable(video_id: &VideoId, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            video_id: video_id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn upstream(provider: &'static str, reason: impl ToString) -> Self {
        Self::Upstream {
            provider,
            reason: reason.to_string(),
        }
    }
}

/// Uniform contract over one external transcript source
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    /// Get the name of this provider
    fn name(&self) -> &'static str;

    /// Fetch the captions of a video in (or near) the requested language
    async fn fetch_transcript(
        &self,
        video_id: &VideoId,
        language: &str,
    ) -> Result<Transcript, ProviderError>;

    /// Probe video metadata independently of caption availability
    async fn check_availability(&self, video_id: &VideoId) -> Availability;

    /// Build a placeholder transcript; never fails
    async fn generate_placeholder(&self, video_id: &VideoId) -> Transcript {
        let availability = self.check_availability(video_id).await;
        Transcript::placeholder(placeholder_message(video_id, &availability))
    }
}

/// Sentence used as the single segment of a placeholder transcript
pub fn placeholder_message(video_id: &VideoId, availability: &Availability) -> String {
    match availability.title.as_deref().map(str::trim) {
        Some(title) if availability.exists && !title.is_empty() => format!(
            "A transcript is not available for \"{}\". The video exists, but its captions could not be retrieved. \
             Captions may be disabled by the uploader or restricted in this region.",
            title
        ),
        _ => format!(
            "A transcript is not available for video {}. Captions may be disabled, \
             or the video may be private, deleted or age-restricted.",
            video_id
        ),
    }
}

/// Build the HTTP client shared by a provider's requests
pub(crate) fn build_http_client(timeout: Duration, user_agent: &str) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// oEmbed metadata lookup shared by both providers
#[derive(Clone)]
pub struct OembedProbe {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct OembedResponse {
    title: Option<String>,
}

impl OembedProbe {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_endpoint(client, OEMBED_ENDPOINT)
    }

    pub fn with_endpoint(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Look the video up; any failure reads as "does not exist"
    pub async fn probe(&self, video_id: &VideoId) -> Availability {
        let url = format!(
            "{}?url={}&format=json",
            self.endpoint,
            urlencoding::encode(&video_id.watch_url())
        );

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(video_id = %video_id, "Availability probe failed: {}", e);
                return Availability::default();
            }
        };

        if !response.status().is_success() {
            tracing::debug!(
                video_id = %video_id,
                status = response.status().as_u16(),
                "Availability probe reported missing video"
            );
            return Availability::default();
        }

        let title = match response.json::<OembedResponse>().await {
            Ok(body) => body.title,
            Err(e) => {
                tracing::debug!(video_id = %video_id, "Could not parse oEmbed body: {}", e);
                None
            }
        };

        Availability {
            exists: true,
            title,
        }
    }
}

/// YouTube `json3` caption document
#[derive(Debug, Deserialize)]
struct Json3Document {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Json3Event {
    t_start_ms: Option<f64>,
    d_duration_ms: Option<f64>,
    #[serde(default)]
    segs: Vec<Json3Seg>,
}

#[derive(Debug, Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

/// Parse a `json3` caption body into segments, skipping empty events.
///
/// An empty body is how the upstream reports "no such track", so it parses
/// to an empty list rather than an error.
pub(crate) fn parse_json3(body: &str) -> Result<Vec<TranscriptSegment>, serde_json::Error> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let document: Json3Document = serde_json::from_str(body)?;

    let segments = document
        .events
        .into_iter()
        .filter_map(|event| {
            let text = event
                .segs
                .iter()
                .map(|seg| seg.utf8.as_str())
                .collect::<String>()
                .replace('\n', " ");
            let text = text.trim();

            if text.is_empty() {
                return None;
            }

            Some(TranscriptSegment::new(
                text,
                event.t_start_ms.unwrap_or(0.0) / 1000.0,
                event.d_duration_ms.unwrap_or(0.0) / 1000.0,
            ))
        })
        .collect();

    Ok(segments)
}
