use serde::{Deserialize, Serialize};

/// Opaque reference to a finished job's output artifact, resolved to
/// bytes by result delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef(pub String);

/// Remote job state as reported by the edit service. `Failed` is
/// terminal and never retried; the detail is whatever the service
/// provided, opaque to us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded { artifact: ArtifactRef },
    Failed { detail: String },
}
