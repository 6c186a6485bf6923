use std::sync::Arc;

use edit_service::{EditJobClient, EditJobConfig, EditService, SubmittedJob};
use shared::{aspect::AspectRatio, domain::UserId, error::EditError};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    delivery::ResultDelivery,
    media,
    store::{PendingImage, SessionStore},
    FrontEnd,
};

/// Orchestrates front-end events against the session store and the
/// edit job client.
///
/// State machine per user: `Empty -> AwaitingPrompt -> Processing ->
/// Empty`. A captioned image short-circuits straight from `Empty` to
/// job submission, so captioned and sequential input produce the same
/// job request. Every [`EditError`] is absorbed here and rendered as a
/// short user-facing message; terminal job outcomes reset the session,
/// while rejected inputs leave whatever was already pending in place.
pub struct SessionController {
    store: Arc<SessionStore>,
    jobs: EditJobClient,
    delivery: ResultDelivery,
    front_end: Arc<dyn FrontEnd>,
}

impl SessionController {
    pub fn new(
        service: Arc<dyn EditService>,
        config: EditJobConfig,
        front_end: Arc<dyn FrontEnd>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store: Arc::new(SessionStore::new()),
            jobs: EditJobClient::new(Arc::clone(&service), config),
            delivery: ResultDelivery::new(service),
            front_end,
        })
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Image received, with or without an attached caption.
    pub async fn on_image(self: &Arc<Self>, user: UserId, bytes: Vec<u8>, caption: Option<String>) {
        if let Err(err) = self.handle_image(user, bytes, caption).await {
            self.report_error(user, err).await;
        }
    }

    /// Free text received: treated as the edit instruction for the
    /// pending image.
    pub async fn on_text(self: &Arc<Self>, user: UserId, text: String) {
        if let Err(err) = self.start_job(user, text).await {
            self.report_error(user, err).await;
        }
    }

    /// Explicit clear command: cancels any in-flight job and resets.
    pub async fn on_clear(&self, user: UserId) {
        self.store.clear(user).await;
        info!(user_id = user.0, "session cleared");
        self.send_text(user, "Session cleared. Send a new image to start editing.".to_string())
            .await;
    }

    async fn handle_image(
        self: &Arc<Self>,
        user: UserId,
        bytes: Vec<u8>,
        caption: Option<String>,
    ) -> Result<(), EditError> {
        let (width, height) = media::probe_dimensions(&bytes)?;
        let aspect = AspectRatio::new(width, height)?;
        self.store
            .set_image(user, PendingImage { bytes, aspect })
            .await?;
        info!(user_id = user.0, aspect = %aspect, "image accepted");

        match caption.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(prompt) => self.start_job(user, prompt.to_string()).await,
            None => {
                self.send_text(
                    user,
                    format!(
                        "Image received, aspect ratio {}. Now send the editing instruction.",
                        aspect.closest_label()
                    ),
                )
                .await;
                Ok(())
            }
        }
    }

    async fn start_job(self: &Arc<Self>, user: UserId, prompt: String) -> Result<(), EditError> {
        let cancel = CancellationToken::new();
        let image = self.store.begin_job(user, &prompt, cancel.clone()).await?;
        let job = self.jobs.submit(&image.bytes, &prompt, &image.aspect).await?;

        self.send_text(
            user,
            format!(
                "Editing your image (prompt: \"{prompt}\", aspect ratio {}). This usually takes 10-30 seconds.",
                job.aspect_ratio
            ),
        )
        .await;

        let controller = Arc::clone(self);
        tokio::spawn(async move {
            controller.settle_job(user, job, cancel).await;
        });
        Ok(())
    }

    /// Runs in its own task per in-flight job so the poll loop never
    /// blocks another user's session.
    async fn settle_job(self: Arc<Self>, user: UserId, job: SubmittedJob, cancel: CancellationToken) {
        match self.jobs.await_completion(&job.handle, &cancel).await {
            // Session was cleared mid-flight; nothing left to report.
            Ok(None) => {
                info!(user_id = user.0, request_id = %job.handle.request_id, "job abandoned after clear");
            }
            Ok(Some(artifact)) => match self.delivery.deliver(&job.prompt, &artifact).await {
                Ok(delivered) => {
                    // The user may clear during the artifact fetch; the
                    // session is then no longer this job's to touch.
                    if !self.store.finish_job(user, &cancel).await {
                        info!(user_id = user.0, request_id = %job.handle.request_id, "result discarded after clear");
                        return;
                    }
                    if let Err(err) = self
                        .front_end
                        .send_image(user, delivered.bytes, delivered.caption)
                        .await
                    {
                        warn!(user_id = user.0, "front end rejected edited image: {err}");
                    }
                    info!(user_id = user.0, request_id = %job.handle.request_id, "edit delivered");
                }
                Err(err) => self.settle_failure(user, err, &cancel).await,
            },
            Err(err) => self.settle_failure(user, err, &cancel).await,
        }
    }

    async fn settle_failure(&self, user: UserId, err: EditError, cancel: &CancellationToken) {
        if cancel.is_cancelled() {
            info!(user_id = user.0, "job failure ignored after clear: {err}");
            return;
        }
        self.report_error(user, err).await;
    }

    async fn report_error(&self, user: UserId, err: EditError) {
        warn!(user_id = user.0, "edit failed: {err}");
        self.send_text(user, err.user_message()).await;
        if err.resets_session() {
            self.store.clear(user).await;
        }
    }

    async fn send_text(&self, user: UserId, text: String) {
        if let Err(err) = self.front_end.send_text(user, text).await {
            warn!(user_id = user.0, "front end send failed: {err}");
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
