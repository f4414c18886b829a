//! Transcript Composer - fetch YouTube transcripts and turn them into articles
//!
//! This library obtains captions for a video through interchangeable transcript
//! providers with fallback and placeholder synthesis, optionally corrects them
//! with a generative-text service, and can compose the result into a long-form
//! article. Full pipeline results are memoized in an in-memory TTL cache.

pub mod acquisition;
pub mod api;
pub mod cache;
pub mod cli;
pub mod compose;
pub mod config;
pub mod extractors;
pub mod llm;
pub mod output;
pub mod providers;
pub mod refine;
pub mod transcribe;
pub mod utils;

pub use acquisition::{Acquisition, AcquisitionFailure};
pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use extractors::{extract_video_id, VideoId};
pub use providers::{Transcript, TranscriptProvider, TranscriptSegment};
pub use transcribe::TranscriptionPipeline;

use compose::ComposeError;
use providers::ProviderError;

/// Result type used at the binary edge
pub type Result<T> = anyhow::Result<T>;

/// Error types surfaced by the pipeline operations
#[derive(thiserror::Error, Debug)]
pub enum TranscriptorError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("Transcript provider failed: {0}")]
    Provider(String),

    #[error("{0}")]
    InputTooShort(String),

    /// Article generation failed; `partial` carries whatever was already computed
    #[error("{message}")]
    Composition {
        message: String,
        partial: Option<serde_json::Value>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TranscriptorError {
    /// HTTP status the error maps to at the transport boundary
    pub fn status_code(&self) -> u16 {
        match self {
            TranscriptorError::Validation(_) | TranscriptorError::InputTooShort(_) => 400,
            TranscriptorError::NotFound(_) | TranscriptorError::Unavailable(_) => 404,
            TranscriptorError::Provider(_) => 502,
            TranscriptorError::Composition { .. } | TranscriptorError::Internal(_) => 500,
        }
    }

    /// Message safe to return to a caller; production hides internal details
    pub fn public_message(&self, production: bool) -> String {
        match self {
            TranscriptorError::Internal(_) if production => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<ProviderError> for TranscriptorError {
    fn from(e: ProviderError) -> Self {
        let message = e.to_string();
        match e {
            ProviderError::NotFound { .. } => TranscriptorError::NotFound(message),
            ProviderError::Unavailable { .. } => TranscriptorError::Unavailable(message),
            ProviderError::Upstream { .. } => TranscriptorError::Provider(message),
        }
    }
}

impl From<AcquisitionFailure> for TranscriptorError {
    /// Classified by the most specific failure across providers, worded after the primary's
    fn from(failure: AcquisitionFailure) -> Self {
        let message = failure.to_string();
        let errors = std::iter::once(&failure.primary).chain(failure.secondary.as_ref());

        let mut unavailable = false;
        let mut not_found = false;
        for error in errors {
            match error {
                ProviderError::Unavailable { .. } => unavailable = true,
                ProviderError::NotFound { .. } => not_found = true,
                ProviderError::Upstream { .. } => {}
            }
        }

        if unavailable {
            TranscriptorError::Unavailable(message)
        } else if not_found {
            TranscriptorError::NotFound(message)
        } else {
            TranscriptorError::Provider(message)
        }
    }
}

impl From<ComposeError> for TranscriptorError {
    fn from(e: ComposeError) -> Self {
        match e {
            ComposeError::InputTooShort { .. } => TranscriptorError::InputTooShort(e.to_string()),
            ComposeError::Failed { .. } => TranscriptorError::Composition {
                message: e.to_string(),
                partial: None,
            },
        }
    }
}
