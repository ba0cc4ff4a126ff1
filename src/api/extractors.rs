//! Path extractors for API routes

use axum::Json;
use axum::extract::rejection::PathRejection;
use axum::extract::{FromRequestParts, Path};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TopicPathRaw {
    name: String,
}

/// Validated topic-name path extractor used by the management routes.
///
/// Extracts `name` from the URL path and rejects empty names before the
/// handler ever sees them, so handlers only have to deal with broker-level
/// failures (not found, already exists).
#[derive(Debug)]
pub struct TopicPath {
    pub name: String,
}

impl<S> FromRequestParts<S> for TopicPath
where
    S: Send + Sync,
{
    type Rejection = ExtractorRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<TopicPathRaw>::from_request_parts(parts, state)
            .await
            .map_err(ExtractorRejection::Path)?;

        if raw.name.trim().is_empty() {
            return Err(ExtractorRejection::EmptyTopicName);
        }

        Ok(Self { name: raw.name })
    }
}

pub enum ExtractorRejection {
    Path(PathRejection),
    EmptyTopicName,
}

impl IntoResponse for ExtractorRejection {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::Path(rejection) => (
                StatusCode::BAD_REQUEST,
                "PATH_PARSE_ERROR",
                rejection.body_text(),
            ),
            Self::EmptyTopicName => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                "topic name must not be empty".to_string(),
            ),
        };
        (
            status,
            Json(serde_json::json!({
                "error": "bad_request",
                "code": code,
                "message": message
            })),
        )
            .into_response()
    }
}
