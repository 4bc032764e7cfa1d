use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("daemon returned status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Status summary reported by `GET /status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub version: String,
    pub state: String,
    pub rule_sets: usize,
    pub warm_rule_sets: usize,
    pub in_flight: usize,
    pub queued_cold_starts: usize,
}

/// What the daemon did with a format request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatOutcome {
    /// Content is already canonical, or this was a dry run.
    Unchanged,
    /// Canonical content differs from the input.
    Formatted(Vec<u8>),
    /// The formatter never settled; the best-effort result is attached.
    DidNotConverge(Vec<u8>),
    /// No rule set covers the path.
    NotCovered(String),
    /// Formatting failed.
    Failed(String),
}

impl FormatOutcome {
    /// Interpret a response to `POST /`.
    pub fn from_response(status: u16, body: Vec<u8>) -> Result<Self, ClientError> {
        match status {
            200 if body.is_empty() => Ok(Self::Unchanged),
            200 => Ok(Self::Formatted(body)),
            404 => Ok(Self::NotCovered(String::from_utf8_lossy(&body).into_owned())),
            500 => {
                let text = String::from_utf8_lossy(&body);
                match text.strip_prefix("Error formatting file: ") {
                    Some(message) => Ok(Self::Failed(message.to_string())),
                    None => Ok(Self::DidNotConverge(body)),
                }
            }
            _ => Err(ClientError::Status {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            }),
        }
    }
}

/// Client for one daemon reachable over TCP.
pub struct DaemonClient {
    client: Client,
    base_url: String,
}

impl DaemonClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Liveness probe; returns the daemon's greeting.
    pub async fn ping(&self) -> Result<String, ClientError> {
        let resp = self.client.get(format!("{}/", self.base_url)).send().await?;
        Self::expect_text(resp).await
    }

    pub async fn status(&self) -> Result<DaemonStatus, ClientError> {
        let resp = self.client.get(format!("{}/status", self.base_url)).send().await?;
        if resp.status() != StatusCode::OK {
            return Err(Self::status_error(resp).await);
        }
        Ok(resp.json().await?)
    }

    /// Format `content` as the file at `path`.
    pub async fn format(&self, path: &str, content: &str, dry_run: bool) -> Result<FormatOutcome, ClientError> {
        let mut request = self
            .client
            .post(format!("{}/", self.base_url))
            .query(&[("path", path)]);
        if dry_run {
            request = request.query(&[("dryrun", "")]);
        }
        let resp = request
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=UTF-8")
            .body(content.to_string())
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body = resp.bytes().await?.to_vec();
        FormatOutcome::from_response(status, body)
    }

    /// Encoding name the daemon uses for `path`, or `None` if not covered.
    pub async fn encoding(&self, path: &str) -> Result<Option<String>, ClientError> {
        let resp = self
            .client
            .get(format!("{}/encoding", self.base_url))
            .query(&[("path", path)])
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::expect_text(resp).await.map(Some)
    }

    /// Ask the daemon to stop.
    pub async fn stop(&self) -> Result<(), ClientError> {
        let resp = self.client.post(format!("{}/stop", self.base_url)).send().await?;
        Self::expect_text(resp).await.map(|_| ())
    }

    async fn expect_text(resp: reqwest::Response) -> Result<String, ClientError> {
        if resp.status() != StatusCode::OK {
            return Err(Self::status_error(resp).await);
        }
        Ok(resp.text().await?)
    }

    async fn status_error(resp: reqwest::Response) -> ClientError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        ClientError::Status { status, body }
    }
}
