use std::collections::HashMap;

use chrono::{DateTime, Utc};
use shared::{aspect::AspectRatio, domain::UserId, error::EditError};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// The most recently received, not-yet-edited image and its derived
/// metadata.
#[derive(Debug, Clone)]
pub struct PendingImage {
    pub bytes: Vec<u8>,
    pub aspect: AspectRatio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    AwaitingPrompt,
    Processing,
}

/// In-flight job reference held by the session while `Processing`.
/// The remote handle itself travels with the settlement task; the
/// session keeps what it needs to cancel and to describe the job.
#[derive(Debug, Clone)]
struct ActiveJob {
    prompt: String,
    started_at: DateTime<Utc>,
    cancel: CancellationToken,
}

#[derive(Debug, Default)]
struct Session {
    pending_image: Option<PendingImage>,
    active_job: Option<ActiveJob>,
}

impl Session {
    fn state(&self) -> SessionState {
        match (&self.pending_image, &self.active_job) {
            (None, _) => SessionState::Empty,
            (Some(_), None) => SessionState::AwaitingPrompt,
            (Some(_), Some(_)) => SessionState::Processing,
        }
    }
}

/// Per-user edit sessions, keyed by opaque user id. Sessions are
/// created on first touch and fully independent of one another; all
/// mutation goes through the store mutex so the single-flight guard
/// holds under concurrent events for the same user.
#[derive(Default)]
pub struct SessionStore {
    inner: Mutex<HashMap<UserId, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn state(&self, user: UserId) -> SessionState {
        self.inner
            .lock()
            .await
            .get(&user)
            .map(Session::state)
            .unwrap_or(SessionState::Empty)
    }

    /// Replaces the pending image (last write wins) and moves the
    /// session to `AwaitingPrompt`. Rejects images with an unsupported
    /// ratio, and any image at all while a job is in flight; both
    /// rejections leave the session unchanged.
    pub async fn set_image(&self, user: UserId, image: PendingImage) -> Result<(), EditError> {
        if !image.aspect.supported() {
            return Err(EditError::UnsupportedAspectRatio {
                ratio: image.aspect.ratio,
            });
        }

        let mut sessions = self.inner.lock().await;
        let session = sessions.entry(user).or_default();
        if session.active_job.is_some() {
            return Err(EditError::JobAlreadyInProgress);
        }
        debug!(user_id = user.0, aspect = %image.aspect, "pending image stored");
        session.pending_image = Some(image);
        Ok(())
    }

    /// Transitions `AwaitingPrompt -> Processing` and hands the caller
    /// the image to submit. Enforces single-flight: `NoPendingImage`
    /// when there is nothing to edit, `JobAlreadyInProgress` when a job
    /// is already running.
    pub async fn begin_job(
        &self,
        user: UserId,
        prompt: &str,
        cancel: CancellationToken,
    ) -> Result<PendingImage, EditError> {
        let mut sessions = self.inner.lock().await;
        let session = sessions.entry(user).or_default();
        if session.active_job.is_some() {
            return Err(EditError::JobAlreadyInProgress);
        }
        let image = session
            .pending_image
            .clone()
            .ok_or(EditError::NoPendingImage)?;
        session.active_job = Some(ActiveJob {
            prompt: prompt.to_string(),
            started_at: Utc::now(),
            cancel,
        });
        debug!(user_id = user.0, "session entered processing");
        Ok(image)
    }

    /// Resets the session to `Empty`, cancelling any in-flight poll
    /// loop. Idempotent and never fails. Removal and cancellation
    /// happen under the store mutex, so [`SessionStore::finish_job`]
    /// always observes them together.
    pub async fn clear(&self, user: UserId) {
        let mut sessions = self.inner.lock().await;
        if let Some(session) = sessions.remove(&user) {
            if let Some(job) = session.active_job {
                debug!(
                    user_id = user.0,
                    started_at = %job.started_at,
                    "cancelling in-flight job"
                );
                job.cancel.cancel();
            }
        }
    }

    /// Terminal clear issued by a job's settlement task. A clear in the
    /// meantime cancels the job's token, so a cancelled token means the
    /// session, and anything the user rebuilt in it since, is no longer
    /// this job's to reset. Returns whether the job still owned the
    /// session.
    pub async fn finish_job(&self, user: UserId, cancel: &CancellationToken) -> bool {
        let mut sessions = self.inner.lock().await;
        if cancel.is_cancelled() {
            return false;
        }
        sessions.remove(&user);
        true
    }

    /// Prompt of the in-flight job, if any. Used for status reporting.
    pub async fn active_prompt(&self, user: UserId) -> Option<String> {
        self.inner
            .lock()
            .await
            .get(&user)
            .and_then(|s| s.active_job.as_ref())
            .map(|job| job.prompt.clone())
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
