use thiserror::Error;

/// Everything that can go wrong between receiving an image and handing
/// the edited result back. All variants are recovered at the session
/// controller boundary and rendered with [`EditError::user_message`];
/// none propagate to the front end as a fault.
#[derive(Debug, Error)]
pub enum EditError {
    #[error("image could not be decoded")]
    InvalidImage,
    #[error("aspect ratio {ratio:.2} is outside the supported range 3:7 to 7:3")]
    UnsupportedAspectRatio { ratio: f64 },
    #[error("image exceeds the 20 MB / 20 megapixel limit")]
    ImageTooLarge,
    #[error("no pending image for this user")]
    NoPendingImage,
    #[error("an edit job is already in progress")]
    JobAlreadyInProgress,
    #[error("job submission failed: {0}")]
    Submission(String),
    #[error("polling failed after retries: {0}")]
    Polling(String),
    #[error("edit job timed out")]
    TimedOut,
    #[error("edit service reported failure: {detail}")]
    ServiceFailed { detail: String },
    #[error("could not deliver edited image: {0}")]
    Delivery(String),
}

impl EditError {
    /// Short text suitable for sending back through the front end.
    pub fn user_message(&self) -> String {
        match self {
            EditError::InvalidImage => {
                "That does not look like an image I can read. Please send a JPEG, PNG, or WebP."
                    .to_string()
            }
            EditError::UnsupportedAspectRatio { .. } => {
                "That image is too narrow or too wide. Supported aspect ratios range from 3:7 to 7:3."
                    .to_string()
            }
            EditError::ImageTooLarge => {
                "That image is too large. The limit is 20 MB and 20 megapixels.".to_string()
            }
            EditError::NoPendingImage => {
                "Please send an image first, then the editing instruction.".to_string()
            }
            EditError::JobAlreadyInProgress => {
                "An edit is already running. Wait for it to finish, or send /clear to start over."
                    .to_string()
            }
            EditError::Submission(_) => {
                "Could not reach the editing service. Please try again later.".to_string()
            }
            EditError::Polling(_) => {
                "Lost contact with the editing service mid-edit. Please resend your image."
                    .to_string()
            }
            EditError::TimedOut => {
                "The edit took too long and was abandoned. Try again, perhaps with a simpler instruction."
                    .to_string()
            }
            EditError::ServiceFailed { detail } => format!("Editing failed: {detail}"),
            EditError::Delivery(_) => {
                "The edit finished but the result could not be fetched. Please resend your image."
                    .to_string()
            }
        }
    }

    /// Whether the owning session returns to Empty after this error.
    /// Rejected inputs leave the session exactly as it was: a refused
    /// replacement image must not discard a valid pending one, and a
    /// rejected input during an in-flight job must not touch the
    /// running edit.
    pub fn resets_session(&self) -> bool {
        !matches!(
            self,
            EditError::JobAlreadyInProgress
                | EditError::InvalidImage
                | EditError::UnsupportedAspectRatio { .. }
        )
    }
}
