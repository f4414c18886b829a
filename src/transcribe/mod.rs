use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::acquisition::{Acquisition, AcquisitionOptions};
use crate::api::types::{
    BlogRequest, ProcessRequest, ProcessResponse, TranscriptRequest, TranscriptResponse,
};
use crate::cache::{cache_key, ResultCache};
use crate::compose::{Article, ComposeError, Composer};
use crate::config::Config;
use crate::extractors::{extract_video_id, is_youtube_url, VideoId};
use crate::llm::{ChatCompletionsClient, TextGenerator};
use crate::providers::timedtext::TimedTextProvider;
use crate::providers::watch_page::WatchPageProvider;
use crate::refine::{RefinedTranscript, Refiner};
use crate::TranscriptorError;

/// Main pipeline: extract, acquire, refine, compose, cache
pub struct TranscriptionPipeline {
    config: Config,
    acquisition: Acquisition,
    refiner: Refiner,
    composer: Composer,
    cache: Arc<ResultCache<ProcessResponse>>,
    sweeper: Option<JoinHandle<()>>,
}

impl TranscriptionPipeline {
    /// Build the pipeline with the HTTP providers and generative client described by `config`.
    ///
    /// Inside a Tokio runtime this also starts the periodic cache sweep,
    /// which stops when the pipeline is dropped.
    pub fn from_config(config: Config) -> Self {
        let mut acquisition = Acquisition::new(Arc::new(TimedTextProvider::from_config(
            &config.providers,
        )));
        if config.providers.enable_alternative {
            acquisition = acquisition
                .with_alternative(Arc::new(WatchPageProvider::from_config(&config.providers)));
        }

        let generator: Arc<dyn TextGenerator> =
            Arc::new(ChatCompletionsClient::from_config(&config.llm));

        let mut pipeline = Self::with_components(config, acquisition, generator);
        if tokio::runtime::Handle::try_current().is_ok() {
            pipeline.sweeper = Some(pipeline.spawn_cache_sweeper());
        } else {
            tracing::debug!("No Tokio runtime, cache entries expire on read only");
        }
        pipeline
    }

    /// Build the pipeline around explicit collaborators. The cache sweep is
    /// left to the caller, see [`Self::spawn_cache_sweeper`].
    pub fn with_components(
        config: Config,
        acquisition: Acquisition,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        let refiner =
            Refiner::new(Arc::clone(&generator)).with_batch_size(config.llm.refine_batch_size);
        let composer = Composer::new(generator)
            .with_timeout(Duration::from_secs(config.llm.timeout_secs))
            .with_min_input_chars(config.llm.min_article_input_chars);
        let cache = Arc::new(ResultCache::new(Duration::from_secs(config.cache.ttl_secs)));

        Self {
            config,
            acquisition,
            refiner,
            composer,
            cache,
            sweeper: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn acquisition(&self) -> &Acquisition {
        &self.acquisition
    }

    pub fn cache(&self) -> &Arc<ResultCache<ProcessResponse>> {
        &self.cache
    }

    /// Whether a background cache sweep is attached to this pipeline
    pub fn is_sweeping(&self) -> bool {
        self.sweeper.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Start the background sweep of expired cache entries
    pub fn spawn_cache_sweeper(&self) -> JoinHandle<()> {
        self.cache
            .spawn_sweeper(Duration::from_secs(self.config.cache.sweep_interval_secs))
    }

    /// Fetch a transcript, refined unless asked otherwise. Never substitutes a placeholder.
    pub async fn transcript(
        &self,
        request: TranscriptRequest,
    ) -> Result<TranscriptResponse, TranscriptorError> {
        let span = request_span("transcript");

        async move {
            let video_id = parse_url(&request.url)?;
            let options = AcquisitionOptions {
                language: self.language(request.language.as_deref()),
                prefer_alternative: self.config.providers.prefer_alternative,
                allow_placeholder: false,
            };

            tracing::info!(video_id = %video_id, language = %options.language, "Fetching transcript");
            let acquired = self.acquisition.acquire(&video_id, &options).await?;

            let refined = if request.skip_refinement {
                None
            } else {
                Some(self.refiner.refine(&acquired.transcript).await)
            };

            Ok(TranscriptResponse {
                video_id: video_id.to_string(),
                raw: acquired.transcript,
                refined,
            })
        }
        .instrument(span)
        .await
    }

    /// Compose an article from caller-supplied transcript text
    pub async fn blog(&self, request: BlogRequest) -> Result<Article, TranscriptorError> {
        let span = request_span("blog");

        async move {
            let video_id = request.video_id.trim();
            if video_id.is_empty() {
                return Err(TranscriptorError::Validation("videoId is required".into()));
            }

            let text = request.transcript.text();
            if text.is_empty() {
                return Err(TranscriptorError::Validation("transcript is required".into()));
            }

            let article = self
                .composer
                .compose_text(&text, video_id, request.title.as_deref())
                .await?;
            Ok(article)
        }
        .instrument(span)
        .await
    }

    /// Full pipeline with placeholder fallback, optional article and caching
    pub async fn process(
        &self,
        request: ProcessRequest,
    ) -> Result<ProcessResponse, TranscriptorError> {
        let span = request_span("process");

        async move {
            let video_id = parse_url(&request.url)?;
            let options = AcquisitionOptions {
                language: self.language(request.language.as_deref()),
                prefer_alternative: request
                    .prefer_alternative_service
                    .unwrap_or(self.config.providers.prefer_alternative),
                allow_placeholder: request.fallback_message,
            };

            let key = cache_key(
                video_id.as_str(),
                &options.language,
                request.skip_refinement,
                request.generate_blog,
                options.allow_placeholder,
                options.prefer_alternative,
            );

            if let Some(hit) = self.cache.get(&key) {
                tracing::info!(video_id = %video_id, "Serving cached result");
                return Ok(ProcessResponse { cached: true, ..hit });
            }

            let acquired = self.acquisition.acquire(&video_id, &options).await?;
            let placeholder = acquired.is_placeholder();

            let refined = if request.skip_refinement {
                RefinedTranscript::passthrough(&acquired.transcript)
            } else {
                self.refiner.refine(&acquired.transcript).await
            };

            let mut response = ProcessResponse {
                video_id: video_id.to_string(),
                raw: acquired.transcript,
                refined,
                blog: None,
                transcript_unavailable: placeholder,
                used_alternative_service: acquired.used_alternative,
                cached: false,
            };

            if request.generate_blog && placeholder {
                tracing::info!(video_id = %video_id, "Skipping article for placeholder transcript");
            } else if request.generate_blog {
                response.blog = self.compose_for(&video_id, &response).await?;
            }

            // Placeholders stem from upstream failures that may be transient.
            if !placeholder {
                self.cache.insert(key, response.clone());
            }

            Ok(response)
        }
        .instrument(span)
        .await
    }

    async fn compose_for(
        &self,
        video_id: &VideoId,
        response: &ProcessResponse,
    ) -> Result<Option<Article>, TranscriptorError> {
        let title = self.acquisition.video_title(video_id).await;
        let transcript = response.refined.to_transcript();

        match self
            .composer
            .compose(&transcript, video_id.as_str(), title.as_deref())
            .await
        {
            Ok(article) => Ok(Some(article)),
            Err(ComposeError::InputTooShort { chars, min }) => {
                tracing::warn!(
                    video_id = %video_id,
                    chars,
                    min,
                    "Transcript too short for an article"
                );
                Ok(None)
            }
            Err(e) => Err(TranscriptorError::Composition {
                message: e.to_string(),
                partial: serde_json::to_value(response).ok(),
            }),
        }
    }

    fn language(&self, requested: Option<&str>) -> String {
        requested
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(&self.config.providers.default_language)
            .to_string()
    }
}

impl Drop for TranscriptionPipeline {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}

fn request_span(operation: &'static str) -> tracing::Span {
    tracing::info_span!("request", operation, request_id = %Uuid::new_v4())
}

fn parse_url(url: &str) -> Result<VideoId, TranscriptorError> {
    if url.trim().is_empty() {
        return Err(TranscriptorError::Validation("url is required".into()));
    }

    extract_video_id(url).ok_or_else(|| {
        let hint = if is_youtube_url(url) { "" } else { " (not a YouTube URL)" };
        TranscriptorError::Validation(format!(
            "Could not extract a video id from URL: {}{}",
            url, hint
        ))
    })
}
