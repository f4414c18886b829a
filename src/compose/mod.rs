use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::llm::TextGenerator;
use crate::providers::Transcript;
use crate::utils::{reading_time_minutes, truncate_chars, word_count};

/// Transcripts shorter than this cannot carry an article
pub const DEFAULT_MIN_INPUT_CHARS: usize = 100;

/// Responses shorter than this are treated as failed generations
pub const MIN_RESPONSE_CHARS: usize = 200;

/// Extracted titles shorter than this fall back to a default
pub const MIN_TITLE_CHARS: usize = 5;

pub const DEFAULT_MAX_ATTEMPTS: usize = 2;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

const EXCERPT_CHARS: usize = 500;

/// Long-form article composed from a transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub title: String,
    pub content: String,
    pub video_id: String,
    pub generated_at: DateTime<Utc>,
    pub word_count: usize,

    /// Estimated minutes to read
    pub reading_time: usize,
}

#[derive(thiserror::Error, Debug)]
pub enum ComposeError {
    #[error("Transcript is too short to compose an article ({chars} characters, need at least {min})")]
    InputTooShort { chars: usize, min: usize },

    #[error("Article generation failed after {attempts} attempts: {reason}")]
    Failed { attempts: usize, reason: String },
}

/// Turns transcript text into an [`Article`] with bounded retries and a per-attempt timeout
pub struct Composer {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
    max_attempts: usize,
    retry_delay: Duration,
    min_input_chars: usize,
}

impl Composer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            timeout: DEFAULT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            min_input_chars: DEFAULT_MIN_INPUT_CHARS,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_min_input_chars(mut self, chars: usize) -> Self {
        self.min_input_chars = chars;
        self
    }

    /// Compose an article from a transcript's segments
    pub async fn compose(
        &self,
        transcript: &Transcript,
        video_id: &str,
        video_title: Option<&str>,
    ) -> Result<Article, ComposeError> {
        self.compose_text(&transcript.full_text(), video_id, video_title)
            .await
    }

    /// Compose an article from already concatenated transcript text
    pub async fn compose_text(
        &self,
        text: &str,
        video_id: &str,
        video_title: Option<&str>,
    ) -> Result<Article, ComposeError> {
        let text = text.trim();
        let chars = text.chars().count();
        if chars < self.min_input_chars {
            return Err(ComposeError::InputTooShort {
                chars,
                min: self.min_input_chars,
            });
        }

        let prompt = build_article_prompt(text, video_title);
        let mut last_reason = String::from("no attempt made");

        for attempt in 1..=self.max_attempts {
            tracing::debug!(video_id, attempt, "Requesting article");

            match tokio::time::timeout(self.timeout, self.generator.generate(&prompt)).await {
                Ok(Ok(content)) if content.trim().chars().count() >= MIN_RESPONSE_CHARS => {
                    let article = build_article(content.trim(), video_id, video_title);
                    tracing::info!(
                        video_id,
                        attempt,
                        words = article.word_count,
                        "Article composed"
                    );
                    return Ok(article);
                }
                Ok(Ok(content)) => {
                    last_reason = format!(
                        "response too short ({} characters)",
                        content.trim().chars().count()
                    );
                }
                Ok(Err(e)) => last_reason = e.to_string(),
                Err(_) => last_reason = format!("timed out after {}s", self.timeout.as_secs_f32()),
            }

            tracing::warn!(video_id, attempt, "Article attempt failed: {}", last_reason);

            if attempt < self.max_attempts && !self.retry_delay.is_zero() {
                tokio::time::sleep(self.retry_delay * attempt as u32).await;
            }
        }

        Err(ComposeError::Failed {
            attempts: self.max_attempts,
            reason: last_reason,
        })
    }
}

/// Prompt with formatting instructions, an opening excerpt and the full text
pub fn build_article_prompt(text: &str, video_title: Option<&str>) -> String {
    let mut prompt = String::from(
        "Write a well-structured blog article based on the video transcript below.\n\n\
         Requirements:\n\
         - Put a compelling title alone on the first line, without any label\n\
         - Follow it with a short introduction\n\
         - Organize the body into 3 to 5 sections with markdown headings\n\
         - Finish with a conclusion\n\
         - Aim for roughly 800 to 1200 words\n\
         - Write clear, flowing prose and do not mention that the source is a transcript\n\n",
    );

    if let Some(title) = video_title.map(str::trim).filter(|t| !t.is_empty()) {
        prompt.push_str(&format!("Video title: {}\n\n", title));
    }

    prompt.push_str(&format!(
        "Opening excerpt:\n\"\"\"\n{}\n\"\"\"\n\nFull transcript:\n\"\"\"\n{}\n\"\"\"\n",
        truncate_chars(text, EXCERPT_CHARS),
        text
    ));

    prompt
}

/// Best-effort title from the first non-empty line: heading markers and quotes removed
pub fn extract_title(content: &str) -> Option<String> {
    let first_line = content.lines().map(str::trim).find(|l| !l.is_empty())?;

    let mut title = first_line.trim_start_matches('#').trim();
    for prefix in ["Title:", "title:", "TITLE:"] {
        if let Some(rest) = title.strip_prefix(prefix) {
            title = rest.trim();
        }
    }

    let title = title
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '*' | '“' | '”' | '‘' | '’'))
        .trim();

    (title.chars().count() >= MIN_TITLE_CHARS).then(|| title.to_string())
}

fn build_article(content: &str, video_id: &str, video_title: Option<&str>) -> Article {
    let title = extract_title(content)
        .or_else(|| {
            video_title
                .map(str::trim)
                .filter(|t| t.chars().count() >= MIN_TITLE_CHARS)
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("Insights from video {}", video_id));

    let words = word_count(content);

    Article {
        title,
        content: content.to_string(),
        video_id: video_id.to_string(),
        generated_at: Utc::now(),
        word_count: words,
        reading_time: reading_time_minutes(words),
    }
}
