//! Response mapping.
//!
//! # Responsibilities
//! - Map a `FormatReply` onto status code, body and content type
//! - Keep the plain-text error bodies in one place
//!
//! # Status codes
//! - 200: clean (empty body), changed (canonical body), dry run (empty body)
//! - 400: missing `path`
//! - 404: path not covered by any rule set
//! - 500: did not converge (best-effort body) or formatting failed
//! - 503: daemon is draining

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::dispatch::FormatReply;
use crate::rules::TextEncoding;

pub const MISSING_PATH: &str = "Missing path query parameter";
pub const SHUTTING_DOWN: &str = "Daemon is shutting down";

pub fn missing_path() -> Response {
    (StatusCode::BAD_REQUEST, MISSING_PATH).into_response()
}

pub fn not_covered(path: &str) -> Response {
    (StatusCode::NOT_FOUND, format!("File not covered by any rule set: {path}")).into_response()
}

pub fn shutting_down() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, SHUTTING_DOWN).into_response()
}

/// Plain text in the given encoding.
pub fn encoded_text(status: StatusCode, content: Vec<u8>, encoding: TextEncoding) -> Response {
    let mut response = (status, Body::from(content)).into_response();
    if let Ok(value) = HeaderValue::from_str(&format!("text/plain; charset={}", encoding.name())) {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    response
}

impl IntoResponse for FormatReply {
    fn into_response(self) -> Response {
        match self {
            Self::NotCovered { path } => not_covered(&path),
            Self::DryRun | Self::Clean => StatusCode::OK.into_response(),
            Self::Changed { content, encoding } => encoded_text(StatusCode::OK, content, encoding),
            Self::DidNotConverge { content, encoding } => {
                encoded_text(StatusCode::INTERNAL_SERVER_ERROR, content, encoding)
            }
            Self::Failed { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error formatting file: {message}"),
            )
                .into_response(),
        }
    }
}
