//! HTTP channel to the diagnostics agent running alongside each managed VM.
//!
//! The agent exposes `POST /api/v1/vms/{id}/diagnostics`; it copies the
//! requested files off the VM, stages a bundle on the management host and
//! answers with the bundle location.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::collaborators::{FetchError, FetchedBundle, RemoteFetch};

#[derive(Debug, Serialize)]
struct FetchRequestBody<'a> {
    files: &'a [String],
    timeout_secs: i64,
}

#[derive(Debug, Deserialize)]
struct FetchResponseBody {
    location: String,
    size_bytes: Option<u64>,
}

/// [`RemoteFetch`] over HTTP to the VM agent.
pub struct AgentChannel {
    client: reqwest::Client,
    base_url: String,
}

impl AgentChannel {
    /// `request_timeout_secs` bounds a single HTTP exchange at the transport
    /// level; the orchestrator's deadline still applies around it.
    pub fn new(base_url: String, request_timeout_secs: u64) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(request_timeout_secs))
            .build()?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, target_id: Uuid) -> String {
        format!(
            "{}/api/v1/vms/{target_id}/diagnostics",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl RemoteFetch for AgentChannel {
    async fn fetch(
        &self,
        target_id: Uuid,
        files: &[String],
        timeout_secs: i64,
    ) -> Result<FetchedBundle, FetchError> {
        let body = FetchRequestBody { files, timeout_secs };

        let response = self
            .client
            .post(self.endpoint(target_id))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else if e.is_connect() {
                    FetchError::Unreachable(e.to_string())
                } else {
                    FetchError::Remote(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(FetchError::Remote(format!("agent returned {status}: {detail}")));
        }

        let parsed: FetchResponseBody = response
            .json()
            .await
            .map_err(|e| FetchError::Remote(format!("malformed agent response: {e}")))?;

        Ok(FetchedBundle {
            location: parsed.location,
            size_bytes: parsed.size_bytes,
        })
    }
}
