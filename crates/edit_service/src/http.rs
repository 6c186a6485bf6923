use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::{
    error::EditError,
    job::{ArtifactRef, JobStatus},
};
use tracing::{debug, warn};

use crate::{EditRequest, EditService, JobHandle};

const SUBMIT_PATH: &str = "/v1/flux-kontext-pro";
const OUTPUT_FORMAT: &str = "jpeg";
const SAFETY_TOLERANCE: u8 = 2;

/// Reqwest-backed [`EditService`] speaking the BFL-style HTTP API:
/// authenticated submission returning a per-job polling URL, status
/// polling against that URL, and a plain GET for the finished artifact.
pub struct HttpEditService {
    http: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct SubmitPayload<'a> {
    prompt: &'a str,
    input_image: &'a str,
    aspect_ratio: &'a str,
    output_format: &'static str,
    safety_tolerance: u8,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
    polling_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PollResponse {
    status: String,
    #[serde(default)]
    result: Option<PollResult>,
    #[serde(default)]
    failure_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PollResult {
    sample: Option<String>,
}

impl HttpEditService {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl EditService for HttpEditService {
    async fn submit_edit_job(&self, request: EditRequest) -> Result<JobHandle, EditError> {
        let payload = SubmitPayload {
            prompt: &request.prompt,
            input_image: &request.image_b64,
            aspect_ratio: &request.aspect_ratio,
            output_format: OUTPUT_FORMAT,
            safety_tolerance: SAFETY_TOLERANCE,
        };

        let response: SubmitResponse = self
            .http
            .post(format!("{}{SUBMIT_PATH}", self.base_url))
            .header("x-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| EditError::Submission(e.to_string()))?
            .error_for_status()
            .map_err(|e| EditError::Submission(e.to_string()))?
            .json()
            .await
            .map_err(|e| EditError::Submission(e.to_string()))?;

        let polling_url = response.polling_url.ok_or_else(|| {
            EditError::Submission(format!(
                "response for request {} is missing polling_url",
                response.id
            ))
        })?;

        debug!(request_id = %response.id, "edit request accepted");
        Ok(JobHandle {
            request_id: response.id,
            polling_url,
        })
    }

    async fn poll_job_status(&self, handle: &JobHandle) -> Result<JobStatus, EditError> {
        let response: PollResponse = self
            .http
            .get(&handle.polling_url)
            .header("x-key", &self.api_key)
            .send()
            .await
            .map_err(|e| EditError::Polling(e.to_string()))?
            .error_for_status()
            .map_err(|e| EditError::Polling(e.to_string()))?
            .json()
            .await
            .map_err(|e| EditError::Polling(e.to_string()))?;

        let status = match response.status.as_str() {
            "Ready" => match response.result.and_then(|r| r.sample) {
                Some(sample) => JobStatus::Succeeded {
                    artifact: ArtifactRef(sample),
                },
                None => JobStatus::Failed {
                    detail: "service reported Ready without a result url".to_string(),
                },
            },
            "Error" | "Failed" => JobStatus::Failed {
                detail: response
                    .failure_reason
                    .unwrap_or_else(|| "unknown error".to_string()),
            },
            "Pending" => JobStatus::Queued,
            "Processing" | "Running" => JobStatus::Running,
            other => {
                warn!(request_id = %handle.request_id, status = %other, "unrecognized job status");
                JobStatus::Running
            }
        };
        Ok(status)
    }

    async fn fetch_artifact(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, EditError> {
        let bytes = self
            .http
            .get(&artifact.0)
            .send()
            .await
            .map_err(|e| EditError::Delivery(e.to_string()))?
            .error_for_status()
            .map_err(|e| EditError::Delivery(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| EditError::Delivery(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
