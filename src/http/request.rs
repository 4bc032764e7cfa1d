//! Request parsing.
//!
//! # Responsibilities
//! - Extract the `path` and `dryrun` query parameters
//! - Decode the request body into text
//!
//! # Design Decisions
//! - `dryrun` is a presence flag: `?dryrun`, `?dryrun=` and `?dryrun=true`
//!   all enable it
//! - The body is decoded with the charset named in `Content-Type` when it is
//!   one the daemon knows, otherwise with the covering rule set's encoding;
//!   malformed sequences are replaced

use axum::http::{header, HeaderMap};
use serde::Deserialize;

use crate::rules::TextEncoding;

/// Header carrying the per-request correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Query parameters of `POST /`.
#[derive(Debug, Default, Deserialize)]
pub struct FormatParams {
    pub path: Option<String>,
    pub dryrun: Option<String>,
}

impl FormatParams {
    pub fn dry_run(&self) -> bool {
        self.dryrun.is_some()
    }
}

/// Query parameters of `GET /encoding`.
#[derive(Debug, Default, Deserialize)]
pub struct PathParams {
    pub path: Option<String>,
}

/// Return the `path` parameter unless it is missing or empty.
pub fn required_path(path: Option<String>) -> Option<String> {
    path.filter(|p| !p.is_empty())
}

/// Decode a request body using the charset from its content type, or
/// `fallback` when none is named.
pub fn decode_body(headers: &HeaderMap, body: &[u8], fallback: TextEncoding) -> String {
    charset(headers)
        .and_then(|name| TextEncoding::from_name(&name))
        .unwrap_or(fallback)
        .decode(body)
}

fn charset(headers: &HeaderMap) -> Option<String> {
    let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_string())
    })
}

/// The request id assigned by the request-id layer, for log fields.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}
