use std::{sync::Arc, time::Duration};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use shared::{aspect::AspectRatio, error::EditError, job::JobStatus};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{EditRequest, EditService, JobHandle};

/// Service-enforced input ceilings, checked locally before submission
/// so an oversized image never costs a round trip.
pub const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;
pub const MAX_IMAGE_PIXELS: u64 = 20_000_000;

/// Poll schedule for `await_completion`. Typical jobs finish in
/// 10-30 s, so backoff starts at 1 s and caps at 5 s under a 120 s
/// overall deadline.
#[derive(Debug, Clone, Copy)]
pub struct EditJobConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub deadline: Duration,
    pub transient_retries: u32,
}

impl Default for EditJobConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            deadline: Duration::from_secs(120),
            transient_retries: 3,
        }
    }
}

/// A job accepted by the remote service, together with what was asked
/// of it. Owned by the per-job settlement task, not by the session.
#[derive(Debug, Clone)]
pub struct SubmittedJob {
    pub handle: JobHandle,
    pub prompt: String,
    pub aspect_ratio: String,
    pub submitted_at: DateTime<Utc>,
}

/// Submission plus bounded, cancellable completion polling on top of
/// any [`EditService`] backend.
#[derive(Clone)]
pub struct EditJobClient {
    service: Arc<dyn EditService>,
    config: EditJobConfig,
}

impl EditJobClient {
    pub fn new(service: Arc<dyn EditService>, config: EditJobConfig) -> Self {
        Self { service, config }
    }

    /// Sends image + prompt + aspect ratio to the service after the
    /// local size pre-check. Fails with `ImageTooLarge` without
    /// touching the network when the ceilings are exceeded.
    pub async fn submit(
        &self,
        image: &[u8],
        prompt: &str,
        aspect: &AspectRatio,
    ) -> Result<SubmittedJob, EditError> {
        if image.len() > MAX_IMAGE_BYTES {
            return Err(EditError::ImageTooLarge);
        }
        if u64::from(aspect.width) * u64::from(aspect.height) > MAX_IMAGE_PIXELS {
            return Err(EditError::ImageTooLarge);
        }

        let aspect_ratio = aspect.closest_label().to_string();
        let request = EditRequest {
            image_b64: STANDARD.encode(image),
            prompt: prompt.to_string(),
            aspect_ratio: aspect_ratio.clone(),
        };
        let handle = self.service.submit_edit_job(request).await?;
        info!(
            request_id = %handle.request_id,
            aspect_ratio = %aspect_ratio,
            "edit job submitted"
        );
        Ok(SubmittedJob {
            handle,
            prompt: prompt.to_string(),
            aspect_ratio,
            submitted_at: Utc::now(),
        })
    }

    /// Polls until the job settles or the overall deadline elapses.
    /// Transient poll failures are retried up to the configured budget;
    /// an explicit `Failed` status is terminal and surfaced as-is.
    ///
    /// Returns `Ok(None)` when the cancellation token fires: the loop
    /// stops at the next poll boundary and makes no assumption about
    /// the remote job itself.
    pub async fn await_completion(
        &self,
        handle: &JobHandle,
        cancel: &CancellationToken,
    ) -> Result<Option<shared::job::ArtifactRef>, EditError> {
        let deadline = tokio::time::Instant::now() + self.config.deadline;
        let mut delay = self.config.initial_delay;
        let mut consecutive_failures = 0u32;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(request_id = %handle.request_id, "polling cancelled");
                    return Ok(None);
                }
                _ = tokio::time::sleep_until(deadline) => {
                    warn!(request_id = %handle.request_id, "edit job deadline elapsed");
                    return Err(EditError::TimedOut);
                }
                _ = tokio::time::sleep(delay) => {}
            }

            if cancel.is_cancelled() {
                info!(request_id = %handle.request_id, "polling cancelled");
                return Ok(None);
            }

            match self.service.poll_job_status(handle).await {
                Ok(JobStatus::Succeeded { artifact }) => {
                    info!(request_id = %handle.request_id, "edit job succeeded");
                    return Ok(Some(artifact));
                }
                Ok(JobStatus::Failed { detail }) => {
                    warn!(request_id = %handle.request_id, %detail, "edit job failed");
                    return Err(EditError::ServiceFailed { detail });
                }
                Ok(JobStatus::Queued | JobStatus::Running) => {
                    consecutive_failures = 0;
                }
                Err(err) => {
                    consecutive_failures += 1;
                    if consecutive_failures > self.config.transient_retries {
                        return Err(EditError::Polling(err.to_string()));
                    }
                    warn!(
                        request_id = %handle.request_id,
                        attempt = consecutive_failures,
                        "transient poll failure: {err}"
                    );
                }
            }

            delay = (delay * 2).min(self.config.max_delay);
        }
    }
}

#[cfg(test)]
#[path = "tests/client_tests.rs"]
mod tests;
