use async_trait::async_trait;
use shared::{
    error::EditError,
    job::{ArtifactRef, JobStatus},
};

mod client;
mod http;

pub use client::{EditJobClient, EditJobConfig, SubmittedJob, MAX_IMAGE_BYTES, MAX_IMAGE_PIXELS};
pub use http::HttpEditService;

/// Opaque handle to an in-flight remote edit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub request_id: String,
    pub polling_url: String,
}

/// Fully-formed request as it goes on the wire: the image is already
/// base64-encoded and the aspect ratio reduced to a supported label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    pub image_b64: String,
    pub prompt: String,
    pub aspect_ratio: String,
}

/// The external image-editing backend. Submission yields a handle which
/// is then polled until terminal; a succeeded job's artifact reference
/// resolves to bytes through `fetch_artifact`.
#[async_trait]
pub trait EditService: Send + Sync {
    async fn submit_edit_job(&self, request: EditRequest) -> Result<JobHandle, EditError>;
    async fn poll_job_status(&self, handle: &JobHandle) -> Result<JobStatus, EditError>;
    async fn fetch_artifact(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, EditError>;
}
