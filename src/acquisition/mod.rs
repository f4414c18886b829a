use std::fmt;
use std::sync::Arc;

use crate::extractors::VideoId;
use crate::providers::{ProviderError, Transcript, TranscriptProvider};

/// Per-request acquisition options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquisitionOptions {
    pub language: String,

    /// Try the alternative provider first
    pub prefer_alternative: bool,

    /// Substitute a placeholder instead of failing when every provider fails
    pub allow_placeholder: bool,
}

/// States the orchestrator moves through for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    Idle,
    TryPrimary,
    TrySecondary,
    Synthesize,
    Done,
}

/// Successful acquisition
#[derive(Debug, Clone, PartialEq)]
pub struct Acquired {
    pub transcript: Transcript,

    /// The transcript came from the alternative provider
    pub used_alternative: bool,

    /// Name of the provider that produced the transcript
    pub provider: &'static str,
}

impl Acquired {
    pub fn is_placeholder(&self) -> bool {
        self.transcript.is_unavailable_message
    }
}

/// Every provider failed and placeholders were not allowed
#[derive(Debug)]
pub struct AcquisitionFailure {
    pub primary: ProviderError,
    pub secondary: Option<ProviderError>,
}

impl fmt::Display for AcquisitionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The primary provider's message leads; it is the most useful diagnostic.
        write!(f, "{}", self.primary)?;
        if let Some(secondary) = &self.secondary {
            write!(f, " (alternative also failed: {})", secondary)?;
        }
        Ok(())
    }
}

impl std::error::Error for AcquisitionFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.primary)
    }
}

/// Drives transcript providers through the fallback order.
///
/// With placeholders allowed, `acquire` always ends in a transcript. With
/// placeholders disallowed, exhaustion yields an [`AcquisitionFailure`].
pub struct Acquisition {
    default_provider: Arc<dyn TranscriptProvider>,
    alternative: Option<Arc<dyn TranscriptProvider>>,
}

struct Ordered<'a> {
    provider: &'a Arc<dyn TranscriptProvider>,
    is_alternative: bool,
}

impl Acquisition {
    pub fn new(default_provider: Arc<dyn TranscriptProvider>) -> Self {
        Self {
            default_provider,
            alternative: None,
        }
    }

    /// Register the alternative provider used as the second tier
    pub fn with_alternative(mut self, alternative: Arc<dyn TranscriptProvider>) -> Self {
        self.alternative = Some(alternative);
        self
    }

    /// Provider names in fallback order for the given preference
    pub fn provider_order(&self, prefer_alternative: bool) -> Vec<&'static str> {
        let (primary, secondary) = self.order(prefer_alternative);
        std::iter::once(primary)
            .chain(secondary)
            .map(|o| o.provider.name())
            .collect()
    }

    /// Video title from the default provider's metadata probe, if it has one
    pub async fn video_title(&self, video_id: &VideoId) -> Option<String> {
        self.default_provider
            .check_availability(video_id)
            .await
            .title
            .filter(|t| !t.trim().is_empty())
    }

    fn order(&self, prefer_alternative: bool) -> (Ordered<'_>, Option<Ordered<'_>>) {
        let default = Ordered {
            provider: &self.default_provider,
            is_alternative: false,
        };

        match &self.alternative {
            Some(alternative) => {
                let alternative = Ordered {
                    provider: alternative,
                    is_alternative: true,
                };
                if prefer_alternative {
                    (alternative, Some(default))
                } else {
                    (default, Some(alternative))
                }
            }
            None => (default, None),
        }
    }

    pub async fn acquire(
        &self,
        video_id: &VideoId,
        options: &AcquisitionOptions,
    ) -> Result<Acquired, AcquisitionFailure> {
        let (primary, secondary) = self.order(options.prefer_alternative);

        let mut state = AcquisitionState::Idle;
        let mut primary_error: Option<ProviderError> = None;
        let mut secondary_error: Option<ProviderError> = None;
        let mut outcome: Option<Acquired> = None;

        while state != AcquisitionState::Done {
            tracing::debug!(video_id = %video_id, ?state, "Acquisition step");

            state = match state {
                AcquisitionState::Idle => AcquisitionState::TryPrimary,

                AcquisitionState::TryPrimary => {
                    match primary
                        .provider
                        .fetch_transcript(video_id, &options.language)
                        .await
                    {
                        Ok(transcript) => {
                            outcome = Some(Acquired {
                                transcript,
                                used_alternative: primary.is_alternative,
                                provider: primary.provider.name(),
                            });
                            AcquisitionState::Done
                        }
                        Err(e) => {
                            tracing::warn!(
                                video_id = %video_id,
                                provider = primary.provider.name(),
                                "Primary provider failed: {}", e
                            );
                            primary_error = Some(e);
                            if secondary.is_some() {
                                AcquisitionState::TrySecondary
                            } else if options.allow_placeholder {
                                AcquisitionState::Synthesize
                            } else {
                                AcquisitionState::Done
                            }
                        }
                    }
                }

                AcquisitionState::TrySecondary => {
                    let attempt = match secondary.as_ref() {
                        Some(secondary) => Some((
                            secondary,
                            secondary
                                .provider
                                .fetch_transcript(video_id, &options.language)
                                .await,
                        )),
                        None => None,
                    };

                    match attempt {
                        Some((secondary, Ok(transcript))) => {
                            outcome = Some(Acquired {
                                transcript,
                                used_alternative: secondary.is_alternative,
                                provider: secondary.provider.name(),
                            });
                            AcquisitionState::Done
                        }
                        Some((secondary, Err(e))) => {
                            tracing::warn!(
                                video_id = %video_id,
                                provider = secondary.provider.name(),
                                "Secondary provider failed: {}", e
                            );
                            secondary_error = Some(e);
                            if options.allow_placeholder {
                                AcquisitionState::Synthesize
                            } else {
                                AcquisitionState::Done
                            }
                        }
                        None if options.allow_placeholder => AcquisitionState::Synthesize,
                        None => AcquisitionState::Done,
                    }
                }

                AcquisitionState::Synthesize => {
                    let transcript = primary.provider.generate_placeholder(video_id).await;
                    tracing::info!(video_id = %video_id, "Using placeholder transcript");
                    outcome = Some(Acquired {
                        transcript: Transcript {
                            is_unavailable_message: true,
                            ..transcript
                        },
                        used_alternative: false,
                        provider: primary.provider.name(),
                    });
                    AcquisitionState::Done
                }

                AcquisitionState::Done => AcquisitionState::Done,
            };
        }

        outcome.ok_or_else(|| AcquisitionFailure {
            primary: primary_error.unwrap_or_else(|| {
                ProviderError::upstream(primary.provider.name(), "no provider produced a result")
            }),
            secondary: secondary_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{Availability, MockTranscriptProvider, TranscriptSegment};

    fn video() -> VideoId {
        VideoId::parse("dQw4w9WgXcQ").unwrap()
    }

    fn options(prefer_alternative: bool, allow_placeholder: bool) -> AcquisitionOptions {
        AcquisitionOptions {
            language: "en".into(),
            prefer_alternative,
            allow_placeholder,
        }
    }

    fn segments(count: usize) -> Transcript {
        Transcript::new(
            (0..count)
                .map(|i| TranscriptSegment::new(format!("segment {}", i), i as f64, 1.0))
                .collect(),
        )
    }

    fn provider(name: &'static str) -> MockTranscriptProvider {
        let mut mock = MockTranscriptProvider::new();
        mock.expect_name().return_const(name);
        mock
    }

    fn succeeding(name: &'static str, count: usize) -> MockTranscriptProvider {
        let mut mock = provider(name);
        mock.expect_fetch_transcript()
            .times(1)
            .returning(move |_, _| Ok(segments(count)));
        mock
    }

    fn not_found(name: &'static str) -> MockTranscriptProvider {
        let mut mock = provider(name);
        mock.expect_fetch_transcript()
            .times(1)
            .returning(|id, _| Err(ProviderError::not_found(id, "no captions")));
        mock
    }

    fn upstream_failure(name: &'static str) -> MockTranscriptProvider {
        let mut mock = provider(name);
        mock.expect_fetch_transcript()
            .times(1)
            .returning(move |_, _| Err(ProviderError::upstream(name, "connection reset")));
        mock
    }

    #[tokio::test]
    async fn test_primary_success() {
        let mut alternative = provider("alternative");
        alternative.expect_fetch_transcript().never();

        let acquisition = Acquisition::new(Arc::new(succeeding("default", 2)))
            .with_alternative(Arc::new(alternative));

        let acquired = acquisition.acquire(&video(), &options(false, false)).await.unwrap();
        assert_eq!(acquired.transcript.len(), 2);
        assert!(!acquired.used_alternative);
        assert_eq!(acquired.provider, "default");
    }

    #[tokio::test]
    async fn test_falls_back_to_alternative() {
        let acquisition = Acquisition::new(Arc::new(not_found("default")))
            .with_alternative(Arc::new(succeeding("alternative", 3)));

        let acquired = acquisition.acquire(&video(), &options(false, false)).await.unwrap();
        assert_eq!(acquired.transcript.len(), 3);
        assert!(acquired.used_alternative);
        assert!(!acquired.is_placeholder());
    }

    #[tokio::test]
    async fn test_prefer_alternative_swaps_order() {
        let mut default = provider("default");
        default.expect_fetch_transcript().never();

        let acquisition = Acquisition::new(Arc::new(default))
            .with_alternative(Arc::new(succeeding("alternative", 1)));

        assert_eq!(acquisition.provider_order(true), vec!["alternative", "default"]);

        let acquired = acquisition.acquire(&video(), &options(true, false)).await.unwrap();
        assert!(acquired.used_alternative);
    }

    #[tokio::test]
    async fn test_preferred_alternative_fails_over_to_default() {
        let acquisition = Acquisition::new(Arc::new(succeeding("default", 4)))
            .with_alternative(Arc::new(upstream_failure("alternative")));

        let acquired = acquisition.acquire(&video(), &options(true, false)).await.unwrap();
        assert_eq!(acquired.transcript.len(), 4);
        assert!(!acquired.used_alternative);
    }

    #[tokio::test]
    async fn test_both_fail_with_placeholder() {
        let mut default = not_found("default");
        default
            .expect_generate_placeholder()
            .times(1)
            .returning(|_| Transcript::placeholder("A transcript is not available."));

        let acquisition = Acquisition::new(Arc::new(default))
            .with_alternative(Arc::new(upstream_failure("alternative")));

        let acquired = acquisition.acquire(&video(), &options(false, true)).await.unwrap();
        assert!(acquired.is_placeholder());
        assert_eq!(acquired.transcript.len(), 1);
        assert!(!acquired.transcript.segments[0].text.is_empty());
        assert!(!acquired.used_alternative);
    }

    #[tokio::test]
    async fn test_both_fail_without_placeholder_reports_primary() {
        let acquisition = Acquisition::new(Arc::new(upstream_failure("default")))
            .with_alternative(Arc::new(not_found("alternative")));

        let failure = acquisition
            .acquire(&video(), &options(false, false))
            .await
            .unwrap_err();

        assert!(matches!(failure.primary, ProviderError::Upstream { .. }));
        assert!(matches!(failure.secondary, Some(ProviderError::NotFound { .. })));
        let message = failure.to_string();
        assert!(message.starts_with("default request failed: connection reset"));
    }

    #[tokio::test]
    async fn test_single_provider_without_placeholder() {
        let acquisition = Acquisition::new(Arc::new(not_found("default")));

        let failure = acquisition
            .acquire(&video(), &options(true, false))
            .await
            .unwrap_err();
        assert!(failure.secondary.is_none());
        assert!(failure.to_string().contains("No transcript found"));
    }

    #[tokio::test]
    async fn test_single_provider_with_placeholder() {
        let mut default = not_found("default");
        default.expect_generate_placeholder().times(1).returning(|id| {
            Transcript::placeholder(crate::providers::placeholder_message(
                id,
                &Availability::default(),
            ))
        });

        let acquisition = Acquisition::new(Arc::new(default));
        let acquired = acquisition.acquire(&video(), &options(false, true)).await.unwrap();

        assert!(acquired.is_placeholder());
        assert!(acquired.transcript.segments[0].text.contains("dQw4w9WgXcQ"));
    }

    #[tokio::test]
    async fn test_placeholder_flag_is_forced() {
        let mut default = not_found("default");
        default
            .expect_generate_placeholder()
            .returning(|_| segments(1));

        let acquisition = Acquisition::new(Arc::new(default));
        let acquired = acquisition.acquire(&video(), &options(false, true)).await.unwrap();
        assert!(acquired.transcript.is_unavailable_message);
    }
}
