use async_trait::async_trait;
use std::time::Duration;

use super::{
    build_http_client, parse_json3, Availability, OembedProbe, ProviderError, Transcript,
    TranscriptProvider,
};
use crate::config::ProvidersConfig;
use crate::extractors::VideoId;
use crate::utils::normalize_language_code;

/// Default caption endpoint
pub const TIMEDTEXT_ENDPOINT: &str = "https://www.youtube.com/api/timedtext";

const PROVIDER_NAME: &str = "timedtext";

/// Primary provider backed by the public timedtext caption endpoint.
///
/// A single fetch walks several language permutations before giving up,
/// so callers only ever see the final outcome.
pub struct TimedTextProvider {
    client: reqwest::Client,
    endpoint: String,
    probe: OembedProbe,
}

impl TimedTextProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            probe: OembedProbe::new(client.clone()),
            client,
            endpoint: TIMEDTEXT_ENDPOINT.to_string(),
        }
    }

    pub fn from_config(config: &ProvidersConfig) -> Self {
        let client = build_http_client(
            Duration::from_secs(config.request_timeout_secs),
            &config.user_agent,
        );
        Self::new(client)
    }

    /// Point the provider at another caption endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Send availability probes to another oEmbed endpoint
    pub fn with_oembed_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.probe = OembedProbe::with_endpoint(self.client.clone(), endpoint);
        self
    }

    fn request_url(&self, video_id: &VideoId, language: Option<&str>) -> String {
        let mut url = format!("{}?v={}&fmt=json3", self.endpoint, video_id);
        if let Some(lang) = language {
            url.push_str("&lang=");
            url.push_str(&urlencoding::encode(lang));
        }
        url
    }

    async fn fetch_once(
        &self,
        video_id: &VideoId,
        language: Option<&str>,
    ) -> Result<Transcript, ProviderError> {
        let url = self.request_url(video_id, language);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::upstream(PROVIDER_NAME, e))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::upstream(PROVIDER_NAME, "rate limited (HTTP 429)"));
        }
        if !status.is_success() {
            return Err(ProviderError::upstream(
                PROVIDER_NAME,
                format!("HTTP {}", status),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::upstream(PROVIDER_NAME, e))?;

        let segments = parse_json3(&body).map_err(|e| {
            ProviderError::upstream(PROVIDER_NAME, format!("malformed caption body: {}", e))
        })?;

        Ok(Transcript::new(segments))
    }
}

/// Language permutations in the order they are attempted:
/// requested language, unspecified, English, requested language with region.
pub fn language_attempts(language: &str) -> Vec<Option<String>> {
    let language = language.trim();
    let mut attempts: Vec<Option<String>> = Vec::with_capacity(4);

    let mut push = |candidate: Option<String>| {
        if !attempts.contains(&candidate) {
            attempts.push(candidate);
        }
    };

    if !language.is_empty() {
        push(Some(language.to_string()));
    }
    push(None);
    push(Some("en".to_string()));
    if !language.is_empty() {
        push(Some(normalize_language_code(language)));
    }

    attempts
}

#[async_trait]
impl TranscriptProvider for TimedTextProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn fetch_transcript(
        &self,
        video_id: &VideoId,
        language: &str,
    ) -> Result<Transcript, ProviderError> {
        let mut last_error = None;

        for attempt in language_attempts(language) {
            let label = attempt.as_deref().unwrap_or("<unspecified>");

            match self.fetch_once(video_id, attempt.as_deref()).await {
                Ok(transcript) if !transcript.is_empty() => {
                    tracing::info!(
                        video_id = %video_id,
                        language = label,
                        segments = transcript.len(),
                        "Fetched captions from timedtext"
                    );
                    return Ok(transcript);
                }
                Ok(_) => {
                    tracing::debug!(video_id = %video_id, language = label, "No captions for language");
                }
                Err(e) => {
                    tracing::warn!(video_id = %video_id, language = label, "Timedtext attempt failed: {}", e);
                    last_error = Some(e);
                }
            }
        }

        if let Some(err) = last_error {
            return Err(err);
        }

        let availability = self.check_availability(video_id).await;
        if !availability.exists {
            return Err(ProviderError::unavailable(
                video_id,
                "video could not be accessed",
            ));
        }

        Err(ProviderError::not_found(
            video_id,
            format!("no caption track for language '{}'", language),
        ))
    }

    async fn check_availability(&self, video_id: &VideoId) -> Availability {
        self.probe.probe(video_id).await
    }
}
