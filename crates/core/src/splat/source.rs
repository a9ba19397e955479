//! Out-of-band status checks against the artifact resource.

use super::{GET_SPLAT_PATH, endpoint};
use crate::model::SplatStatus;
use async_trait::async_trait;
use reqwest::{
    StatusCode,
    header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA},
};
use serde::Deserialize;
use tracing::{debug, instrument};

/// What a single status check observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The resource served the model file itself.
    ArtifactPresent,
    /// The resource answered 404.
    NotFound,
    /// The resource answered with a structured `{status}` body.
    Status(SplatStatus),
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("Status request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Unexpected HTTP status {0}")]
    UnexpectedStatus(u16),
    #[error("Could not parse status body: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct StatusBody {
    status: SplatStatus,
}

/// Anything that can report the current state of the splat job.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SplatStatusSource: Send + Sync {
    async fn check(&self) -> Result<PollOutcome, PollError>;
}

/// Polls `GET {api}/api/get-splat`.
pub struct HttpStatusSource {
    client: reqwest::Client,
    url: String,
    artifact_content_type: String,
}

impl HttpStatusSource {
    pub fn new(api_base_url: &str, artifact_content_type: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_base_url, artifact_content_type)
    }

    pub fn with_client(
        client: reqwest::Client,
        api_base_url: &str,
        artifact_content_type: impl Into<String>,
    ) -> Self {
        Self {
            client,
            url: endpoint(api_base_url, GET_SPLAT_PATH),
            artifact_content_type: artifact_content_type.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Classifies a response from its status line and headers alone. `None`
/// means the body has to be inspected.
fn classify_head(
    status: StatusCode,
    content_type: Option<&str>,
    artifact_content_type: &str,
) -> Option<Result<PollOutcome, PollError>> {
    if status == StatusCode::NOT_FOUND {
        return Some(Ok(PollOutcome::NotFound));
    }
    if !status.is_success() {
        return Some(Err(PollError::UnexpectedStatus(status.as_u16())));
    }
    match content_type {
        Some(ct) if ct.contains(artifact_content_type) => Some(Ok(PollOutcome::ArtifactPresent)),
        _ => None,
    }
}

fn parse_status_body(body: &[u8]) -> Result<PollOutcome, PollError> {
    let parsed: StatusBody = serde_json::from_slice(body)?;
    Ok(PollOutcome::Status(parsed.status))
}

#[async_trait]
impl SplatStatusSource for HttpStatusSource {
    #[instrument(name = "splat_check", skip(self), fields(url = %self.url))]
    async fn check(&self) -> Result<PollOutcome, PollError> {
        let response = self
            .client
            .get(&self.url)
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .send()
            .await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let outcome = match classify_head(
            response.status(),
            content_type.as_deref(),
            &self.artifact_content_type,
        ) {
            Some(result) => result,
            None => parse_status_body(&response.bytes().await?),
        };
        debug!(?outcome, "Splat status checked");
        outcome
    }
}
