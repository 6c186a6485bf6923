use async_trait::async_trait;
use shared::domain::UserId;

mod controller;
mod delivery;
mod media;
mod store;

pub use controller::SessionController;
pub use delivery::{Delivered, ResultDelivery};
pub use store::{PendingImage, SessionState, SessionStore};

/// Outbound capability of the messaging transport. The transport
/// itself (receiving events, command parsing) lives outside this
/// crate; the controller only needs a way to answer the user.
#[async_trait]
pub trait FrontEnd: Send + Sync {
    async fn send_text(&self, user: UserId, text: String) -> anyhow::Result<()>;
    async fn send_image(&self, user: UserId, bytes: Vec<u8>, caption: String)
        -> anyhow::Result<()>;
}
