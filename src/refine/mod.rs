use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::llm::TextGenerator;
use crate::providers::{Transcript, TranscriptSegment};

/// Segments sent to the generative service per request
pub const DEFAULT_BATCH_SIZE: usize = 15;

/// A transcript segment after refinement, keeping the caption text it replaced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinedSegment {
    #[serde(flatten)]
    pub segment: TranscriptSegment,

    /// Text before refinement
    pub original: String,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub refinement_failed: bool,
}

impl RefinedSegment {
    fn unchanged(segment: &TranscriptSegment, failed: bool) -> Self {
        Self {
            segment: segment.clone(),
            original: segment.text.clone(),
            refinement_failed: failed,
        }
    }

    fn rewritten(segment: &TranscriptSegment, refined: String) -> Self {
        Self {
            segment: TranscriptSegment {
                text: refined,
                ..segment.clone()
            },
            original: segment.text.clone(),
            refinement_failed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinedTranscript {
    pub segments: Vec<RefinedSegment>,

    #[serde(default)]
    pub is_unavailable_message: bool,
}

impl RefinedTranscript {
    /// Wrap a transcript without rewriting anything
    pub fn passthrough(transcript: &Transcript) -> Self {
        Self {
            segments: transcript
                .segments
                .iter()
                .map(|s| RefinedSegment::unchanged(s, false))
                .collect(),
            is_unavailable_message: transcript.is_unavailable_message,
        }
    }

    /// Drop the refinement bookkeeping and keep the (possibly corrected) text
    pub fn to_transcript(&self) -> Transcript {
        Transcript {
            segments: self.segments.iter().map(|s| s.segment.clone()).collect(),
            is_unavailable_message: self.is_unavailable_message,
        }
    }

    pub fn failed_count(&self) -> usize {
        self.segments.iter().filter(|s| s.refinement_failed).count()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct RefinementItem {
    index: serde_json::Value,
    refined: String,
}

#[derive(thiserror::Error, Debug)]
pub enum RefineParseError {
    #[error("response contains no JSON array")]
    NoArray,

    #[error("response array is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Grammar and spelling pass over a transcript, in sequential batches.
///
/// Never fails: a batch that cannot be refined keeps its original text and
/// every segment in it is flagged `refinement_failed`.
pub struct Refiner {
    generator: Arc<dyn TextGenerator>,
    batch_size: usize,
}

impl Refiner {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub async fn refine(&self, transcript: &Transcript) -> RefinedTranscript {
        if transcript.is_empty() {
            return RefinedTranscript::default();
        }

        if transcript.is_unavailable_message {
            return RefinedTranscript::passthrough(transcript);
        }

        let batches = transcript.segments.chunks(self.batch_size);
        let total = batches.len();
        let mut segments = Vec::with_capacity(transcript.len());

        // Sequential on purpose: the generative service is rate limited.
        for (batch_index, batch) in batches.enumerate() {
            let refined = self.refine_batch(batch_index, batch).await;
            segments.extend(refined);
        }

        let result = RefinedTranscript {
            segments,
            is_unavailable_message: false,
        };

        tracing::info!(
            batches = total,
            segments = result.len(),
            failed = result.failed_count(),
            "Refinement finished"
        );

        result
    }

    async fn refine_batch(&self, batch_index: usize, batch: &[TranscriptSegment]) -> Vec<RefinedSegment> {
        let prompt = build_refinement_prompt(batch);

        let response = match self.generator.generate(&prompt).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(batch = batch_index, "Refinement request failed, keeping original text: {}", e);
                return batch.iter().map(|s| RefinedSegment::unchanged(s, true)).collect();
            }
        };

        let refinements = match parse_refinements(&response) {
            Ok(refinements) => refinements,
            Err(e) => {
                tracing::warn!(batch = batch_index, "Unusable refinement response, keeping original text: {}", e);
                return batch.iter().map(|s| RefinedSegment::unchanged(s, true)).collect();
            }
        };

        merge_refinements(batch, &refinements)
    }
}

/// Prompt listing the batch's texts by 1-based index
pub fn build_refinement_prompt(batch: &[TranscriptSegment]) -> String {
    let mut prompt = String::from(
        "You are correcting an automatically generated video transcript.\n\
         Fix grammar, spelling and punctuation in each numbered line below. \
         Keep the original meaning and language, do not merge or split lines, \
         and do not add commentary.\n\nLines:\n",
    );

    for (i, segment) in batch.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, segment.text.replace('\n', " ").trim()));
    }

    prompt.push_str(
        "\nRespond with only a JSON array containing one object per line, \
         in the form {\"index\": <line number>, \"refined\": \"<corrected text>\"}.",
    );

    prompt
}

/// Parse `[{index, refined}]` out of a response that may be wrapped in prose or code fences
pub fn parse_refinements(response: &str) -> Result<HashMap<usize, String>, RefineParseError> {
    let start = response.find('[').ok_or(RefineParseError::NoArray)?;
    let end = response.rfind(']').ok_or(RefineParseError::NoArray)?;
    if end < start {
        return Err(RefineParseError::NoArray);
    }

    let items: Vec<RefinementItem> = serde_json::from_str(&response[start..=end])?;

    let refinements = items
        .into_iter()
        .filter_map(|item| {
            let index = match &item.index {
                serde_json::Value::Number(n) => whole_number(n)?,
                serde_json::Value::String(s) => s.trim().parse().ok()?,
                _ => return None,
            };
            Some((index, item.refined))
        })
        .collect();

    Ok(refinements)
}

/// Integer value of an index, accepting floats such as `1.0` that carry no fraction
fn whole_number(n: &serde_json::Number) -> Option<usize> {
    if let Some(i) = n.as_u64() {
        return usize::try_from(i).ok();
    }

    let f = n.as_f64()?;
    (f >= 0.0 && f.fract() == 0.0 && f <= usize::MAX as f64).then_some(f as usize)
}

/// Put corrected text back by 1-based index; missing or blank entries keep the original
pub fn merge_refinements(
    batch: &[TranscriptSegment],
    refinements: &HashMap<usize, String>,
) -> Vec<RefinedSegment> {
    batch
        .iter()
        .enumerate()
        .map(|(i, segment)| match refinements.get(&(i + 1)) {
            Some(refined) if !refined.trim().is_empty() => {
                RefinedSegment::rewritten(segment, refined.trim().to_string())
            }
            _ => RefinedSegment::unchanged(segment, true),
        })
        .collect()
}
