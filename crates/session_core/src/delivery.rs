use std::sync::Arc;

use edit_service::EditService;
use shared::{error::EditError, job::ArtifactRef};
use tracing::debug;

use crate::media;

/// Finished artifact, normalized to the fixed output encoding, plus a
/// caption for the front end to attach.
#[derive(Debug, Clone)]
pub struct Delivered {
    pub bytes: Vec<u8>,
    pub caption: String,
}

/// Resolves a succeeded job's artifact reference to sendable bytes.
/// Failures here are reported to the user and not retried; a resend
/// starts a fresh job.
pub struct ResultDelivery {
    service: Arc<dyn EditService>,
}

impl ResultDelivery {
    pub fn new(service: Arc<dyn EditService>) -> Self {
        Self { service }
    }

    pub async fn deliver(
        &self,
        prompt: &str,
        artifact: &ArtifactRef,
    ) -> Result<Delivered, EditError> {
        let raw = self.service.fetch_artifact(artifact).await?;
        debug!(artifact = %artifact.0, bytes = raw.len(), "artifact fetched");
        let bytes = media::normalize_jpeg(raw)?;
        Ok(Delivered {
            bytes,
            caption: format!("Edited image (prompt: \"{prompt}\")"),
        })
    }
}
