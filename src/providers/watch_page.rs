use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use super::{
    build_http_client, parse_json3, Availability, OembedProbe, ProviderError, Transcript,
    TranscriptProvider,
};
use crate::config::ProvidersConfig;
use crate::extractors::VideoId;

/// Default watch page endpoint
pub const WATCH_ENDPOINT: &str = "https://www.youtube.com/watch";

const PROVIDER_NAME: &str = "watch-page";
const PLAYER_RESPONSE_MARKER: &str = "ytInitialPlayerResponse = ";

/// A caption track advertised by the watch page
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    pub base_url: String,
    pub language_code: String,
    #[serde(default)]
    pub kind: Option<String>,
}

/// Alternative provider that scrapes caption tracks from the watch page
pub struct WatchPageProvider {
    client: reqwest::Client,
    endpoint: String,
    probe: OembedProbe,
}

impl WatchPageProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            probe: OembedProbe::new(client.clone()),
            client,
            endpoint: WATCH_ENDPOINT.to_string(),
        }
    }

    pub fn from_config(config: &ProvidersConfig) -> Self {
        let client = build_http_client(
            Duration::from_secs(config.request_timeout_secs),
            &config.user_agent,
        );
        Self::new(client)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Send availability probes to another oEmbed endpoint
    pub fn with_oembed_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.probe = OembedProbe::with_endpoint(self.client.clone(), endpoint);
        self
    }

    async fn get_text(&self, url: &str) -> Result<(u16, String), ProviderError> {
        let response = self
            .client
            .get(url)
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| ProviderError::upstream(PROVIDER_NAME, e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::upstream(PROVIDER_NAME, e))?;

        Ok((status, body))
    }

    /// Load the watch page and list its caption tracks
    async fn list_tracks(&self, video_id: &VideoId) -> Result<Vec<CaptionTrack>, ProviderError> {
        let url = format!("{}?v={}&hl=en", self.endpoint, video_id);
        let (status, html) = self.get_text(&url).await?;

        match status {
            200..=299 => {}
            404 | 410 => {
                return Err(ProviderError::unavailable(
                    video_id,
                    format!("watch page returned HTTP {}", status),
                ))
            }
            429 => {
                return Err(ProviderError::upstream(PROVIDER_NAME, "rate limited (HTTP 429)"))
            }
            other => {
                return Err(ProviderError::upstream(
                    PROVIDER_NAME,
                    format!("watch page returned HTTP {}", other),
                ))
            }
        }

        let player = extract_player_response(&html).ok_or_else(|| {
            ProviderError::upstream(PROVIDER_NAME, "player response not found in watch page")
        })?;

        if let Some(reason) = unplayable_reason(&player) {
            return Err(ProviderError::unavailable(video_id, reason));
        }

        Ok(caption_tracks(&player))
    }
}

/// Pull the embedded player response JSON out of the watch page HTML
pub fn extract_player_response(html: &str) -> Option<Value> {
    let start = html.find(PLAYER_RESPONSE_MARKER)? + PLAYER_RESPONSE_MARKER.len();

    // The object is followed by `;var ...` or `;</script>`; stop after one value.
    serde_json::Deserializer::from_str(&html[start..])
        .into_iter::<Value>()
        .next()?
        .ok()
}

/// Reason the video cannot be played, if the player reports one
pub fn unplayable_reason(player: &Value) -> Option<String> {
    let status = player["playabilityStatus"]["status"].as_str()?;

    match status {
        "OK" | "LIVE_STREAM_OFFLINE" => None,
        other => {
            let reason = player["playabilityStatus"]["reason"]
                .as_str()
                .unwrap_or("no reason given");
            Some(format!("{} ({})", reason, other))
        }
    }
}

/// Caption tracks listed by the player; missing lists read as empty
pub fn caption_tracks(player: &Value) -> Vec<CaptionTrack> {
    let tracks = &player["captions"]["playerCaptionsTracklistRenderer"]["captionTracks"];

    serde_json::from_value::<Vec<CaptionTrack>>(tracks.clone()).unwrap_or_default()
}

fn primary_subtag(code: &str) -> String {
    code.split(['-', '_'])
        .next()
        .unwrap_or(code)
        .to_lowercase()
}

/// Pick a track: exact code, then same primary language, then English,
/// then whatever comes first.
pub fn select_track<'a>(tracks: &'a [CaptionTrack], language: &str) -> Option<&'a CaptionTrack> {
    let wanted = language.trim().to_lowercase();
    let wanted_prefix = primary_subtag(&wanted);

    tracks
        .iter()
        .find(|t| t.language_code.to_lowercase() == wanted)
        .or_else(|| {
            tracks
                .iter()
                .find(|t| !wanted_prefix.is_empty() && primary_subtag(&t.language_code) == wanted_prefix)
        })
        .or_else(|| tracks.iter().find(|t| primary_subtag(&t.language_code) == "en"))
        .or_else(|| tracks.first())
}

/// Caption download URL for a track, forced to the json3 format
pub fn track_url(track: &CaptionTrack) -> Result<String, ProviderError> {
    let mut url = Url::parse(&track.base_url).map_err(|e| {
        ProviderError::upstream(PROVIDER_NAME, format!("invalid caption url: {}", e))
    })?;

    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "fmt")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(retained)
        .append_pair("fmt", "json3");

    Ok(url.to_string())
}

#[async_trait]
impl TranscriptProvider for WatchPageProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn fetch_transcript(
        &self,
        video_id: &VideoId,
        language: &str,
    ) -> Result<Transcript, ProviderError> {
        let tracks = self.list_tracks(video_id).await?;
        tracing::debug!(video_id = %video_id, tracks = tracks.len(), "Listed caption tracks");

        let track = select_track(&tracks, language)
            .ok_or_else(|| ProviderError::not_found(video_id, "video has no caption tracks"))?;

        tracing::info!(
            video_id = %video_id,
            requested = language,
            selected = %track.language_code,
            "Selected caption track"
        );

        let (status, body) = self.get_text(&track_url(track)?).await?;
        if !(200..300).contains(&status) {
            return Err(ProviderError::upstream(
                PROVIDER_NAME,
                format!("caption download returned HTTP {}", status),
            ));
        }

        let segments = parse_json3(&body).map_err(|e| {
            ProviderError::upstream(PROVIDER_NAME, format!("malformed caption body: {}", e))
        })?;

        if segments.is_empty() {
            return Err(ProviderError::not_found(
                video_id,
                format!("caption track '{}' is empty", track.language_code),
            ));
        }

        Ok(Transcript::new(segments))
    }

    async fn check_availability(&self, video_id: &VideoId) -> Availability {
        self.probe.probe(video_id).await
    }
}
