//! Transport-agnostic handling of the JSON surface.
//!
//! [`handle`] takes a method, a path and a raw body and returns the status
//! and JSON body an HTTP front end would write back. Routing, body parsing
//! and error to status mapping all live here so any transport can reuse them.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::transcribe::TranscriptionPipeline;
use crate::TranscriptorError;

pub mod types;

pub use types::{
    BlogRequest, BlogTranscript, ProcessRequest, ProcessResponse, TranscriptRequest,
    TranscriptResponse,
};

/// Status and JSON body produced for one request
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    fn ok<T: Serialize>(payload: &T) -> Self {
        match serde_json::to_value(payload) {
            Ok(body) => Self { status: 200, body },
            Err(e) => Self::error(500, format!("Failed to serialize response: {}", e)),
        }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }

    /// Error body; composition failures carry the partial result alongside the message
    fn from_error(error: TranscriptorError, production: bool) -> Self {
        let status = error.status_code();
        let message = error.public_message(production);

        let mut body = match error {
            TranscriptorError::Composition {
                partial: Some(Value::Object(partial)),
                ..
            } => Value::Object(partial),
            _ => json!({}),
        };
        body["error"] = Value::String(message);

        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Health,
    Transcript,
    Blog,
    Process,
}

impl Route {
    fn resolve(path: &str) -> Option<Self> {
        let path = path.split('?').next().unwrap_or(path);
        match path.trim_end_matches('/') {
            "/api/health" => Some(Route::Health),
            "/api/transcript" => Some(Route::Transcript),
            "/api/blog" => Some(Route::Blog),
            "/api/process" => Some(Route::Process),
            _ => None,
        }
    }

    fn method(self) -> &'static str {
        match self {
            Route::Health => "GET",
            _ => "POST",
        }
    }
}

/// Dispatch one request against the pipeline
pub async fn handle(
    pipeline: &TranscriptionPipeline,
    method: &str,
    path: &str,
    body: &str,
) -> ApiResponse {
    let Some(route) = Route::resolve(path) else {
        return ApiResponse::error(404, format!("No route for {}", path));
    };

    if !method.eq_ignore_ascii_case(route.method()) {
        return ApiResponse::error(405, format!("Method {} not allowed for {}", method, path));
    }

    tracing::debug!(?route, "Handling request");
    let production = pipeline.config().is_production();

    let result = match route {
        Route::Health => return ApiResponse::ok(&json!({ "status": "ok" })),
        Route::Transcript => match parse_body::<TranscriptRequest>(body) {
            Ok(request) => pipeline.transcript(request).await.map(|r| ApiResponse::ok(&r)),
            Err(e) => Err(e),
        },
        Route::Blog => match parse_body::<BlogRequest>(body) {
            Ok(request) => pipeline.blog(request).await.map(|r| ApiResponse::ok(&r)),
            Err(e) => Err(e),
        },
        Route::Process => match parse_body::<ProcessRequest>(body) {
            Ok(request) => pipeline.process(request).await.map(|r| ApiResponse::ok(&r)),
            Err(e) => Err(e),
        },
    };

    result.unwrap_or_else(|e| {
        if e.status_code() >= 500 {
            tracing::error!(status = e.status_code(), "Request failed: {}", e);
        } else {
            tracing::info!(status = e.status_code(), "Request rejected: {}", e);
        }
        ApiResponse::from_error(e, production)
    })
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, TranscriptorError> {
    if body.trim().is_empty() {
        return Err(TranscriptorError::Validation("Request body is required".into()));
    }

    serde_json::from_str(body)
        .map_err(|e| TranscriptorError::Validation(format!("Invalid request body: {}", e)))
}
