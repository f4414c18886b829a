//! Request and response bodies of the JSON surface.

use serde::{Deserialize, Serialize};

use crate::compose::Article;
use crate::providers::{Transcript, TranscriptSegment};
use crate::refine::RefinedTranscript;

/// Body of `POST /api/transcript`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptRequest {
    #[serde(default)]
    pub url: String,

    pub language: Option<String>,

    #[serde(default)]
    pub skip_refinement: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptResponse {
    pub video_id: String,
    pub raw: Transcript,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub refined: Option<RefinedTranscript>,
}

/// Transcript supplied to `POST /api/blog`: plain text, a segment list or a full transcript object
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlogTranscript {
    Text(String),
    Segments(Vec<TranscriptSegment>),
    Document(Transcript),
}

impl BlogTranscript {
    pub fn text(&self) -> String {
        match self {
            BlogTranscript::Text(text) => text.trim().to_string(),
            BlogTranscript::Segments(segments) => Transcript::new(segments.clone()).full_text(),
            BlogTranscript::Document(transcript) => transcript.full_text(),
        }
    }
}

impl Default for BlogTranscript {
    fn default() -> Self {
        BlogTranscript::Text(String::new())
    }
}

/// Body of `POST /api/blog`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogRequest {
    #[serde(default)]
    pub transcript: BlogTranscript,

    #[serde(default)]
    pub video_id: String,

    pub title: Option<String>,
}

/// Body of `POST /api/process`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    #[serde(default)]
    pub url: String,

    pub language: Option<String>,

    #[serde(default)]
    pub skip_refinement: bool,

    #[serde(default)]
    pub generate_blog: bool,

    /// Substitute a placeholder transcript when no captions can be fetched
    #[serde(default)]
    pub fallback_message: bool,

    /// Falls back to the configured preference when absent
    pub prefer_alternative_service: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub video_id: String,
    pub raw: Transcript,
    pub refined: RefinedTranscript,
    pub blog: Option<Article>,
    pub transcript_unavailable: bool,
    pub used_alternative_service: bool,
    pub cached: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_request_defaults() {
        let request: ProcessRequest =
            serde_json::from_str(r#"{"url": "https://youtu.be/dQw4w9WgXcQ"}"#).unwrap();
        assert!(!request.skip_refinement);
        assert!(!request.generate_blog);
        assert!(!request.fallback_message);
        assert_eq!(request.prefer_alternative_service, None);
        assert_eq!(request.language, None);
    }

    #[test]
    fn test_process_request_camel_case() {
        let request: ProcessRequest = serde_json::from_str(
            r#"{"url": "u", "skipRefinement": true, "generateBlog": true,
                "fallbackMessage": true, "preferAlternativeService": false, "language": "es"}"#,
        )
        .unwrap();
        assert!(request.skip_refinement && request.generate_blog && request.fallback_message);
        assert_eq!(request.prefer_alternative_service, Some(false));
        assert_eq!(request.language.as_deref(), Some("es"));
    }

    #[test]
    fn test_blog_transcript_shapes() {
        let text: BlogRequest =
            serde_json::from_str(r#"{"transcript": " hello there ", "videoId": "abc"}"#).unwrap();
        assert_eq!(text.transcript.text(), "hello there");

        let segments: BlogRequest = serde_json::from_str(
            r#"{"transcript": [{"text": "one", "start": 0, "duration": 1},
                               {"text": "two", "start": 1, "duration": 1, "original": "tow"}],
                "videoId": "abc"}"#,
        )
        .unwrap();
        assert_eq!(segments.transcript.text(), "one two");

        let document: BlogRequest = serde_json::from_str(
            r#"{"transcript": {"segments": [{"text": "solo", "start": 0, "duration": 1}]},
                "videoId": "abc"}"#,
        )
        .unwrap();
        assert_eq!(document.transcript.text(), "solo");
    }

    #[test]
    fn test_blog_segments_negative_timing_clamped() {
        let request: BlogRequest = serde_json::from_str(
            r#"{"transcript": [{"text": "early", "start": -4, "duration": -0.5}], "videoId": "abc"}"#,
        )
        .unwrap();

        match request.transcript {
            BlogTranscript::Segments(segments) => {
                assert_eq!(segments[0].start, 0.0);
                assert_eq!(segments[0].duration, 0.0);
            }
            other => panic!("expected segments, got {:?}", other),
        }
    }

    #[test]
    fn test_transcript_response_omits_missing_refinement() {
        let response = TranscriptResponse {
            video_id: "abc".into(),
            raw: Transcript::default(),
            refined: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["videoId"], "abc");
        assert!(json.get("refined").is_none());
    }

    #[test]
    fn test_process_response_serializes_null_blog() {
        let response = ProcessResponse {
            video_id: "abc".into(),
            raw: Transcript::placeholder("none"),
            refined: RefinedTranscript::default(),
            blog: None,
            transcript_unavailable: true,
            used_alternative_service: false,
            cached: false,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json["blog"].is_null());
        assert_eq!(json["transcriptUnavailable"], true);
        assert_eq!(json["usedAlternativeService"], false);
    }
}
