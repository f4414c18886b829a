use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of every YouTube video identifier
pub const VIDEO_ID_LEN: usize = 11;

/// Canonical URL shapes: `watch?v=`, `youtu.be/`, `/v/`, `/embed/`, `/u/<user>/`
static CANONICAL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^.*(?:youtu\.be/|v/|/u/[\w-]+/|embed/|watch\?)\??v?=?([^#&?]*).*")
        .expect("canonical video id pattern is valid")
});

/// Shorts URLs, tried only when the canonical pattern does not yield an id
static SHORTS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"youtube\.com/shorts/([^#&?/]*)").expect("shorts video id pattern is valid")
});

/// An 11-character token naming a single video
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    /// Wrap a raw identifier, rejecting anything that is not 11 id characters
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = raw.len() == VIDEO_ID_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        valid.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch page URL for this video
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Extract the video identifier from a user supplied URL.
///
/// Returns `None` for empty input or when neither the canonical nor the
/// shorts pattern produces an 11-character identifier. Callers treat `None`
/// as a bad request.
pub fn extract_video_id(url: &str) -> Option<VideoId> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }

    let canonical = CANONICAL_PATTERN
        .captures(url)
        .and_then(|caps| caps.get(1))
        .and_then(|m| VideoId::parse(m.as_str()));

    if canonical.is_some() {
        return canonical;
    }

    tracing::debug!("Canonical pattern did not match, trying shorts pattern: {}", url);

    SHORTS_PATTERN
        .captures(url)
        .and_then(|caps| caps.get(1))
        .and_then(|m| VideoId::parse(m.as_str()))
}

/// Check if the URL points at a YouTube host at all
pub fn is_youtube_url(url: &str) -> bool {
    let url_lower = url.to_lowercase();
    url_lower.contains("youtube.com/") || url_lower.contains("youtu.be/")
}
