use async_trait::async_trait;

use crate::{domain::ScopeId, messaging::types::MessagingCapabilities, Result};

/// Outbound half of the transport.
///
/// The bot produces one plain-text reply per handled event; adapters decide how
/// to deliver it (Telegram message, Matrix notice, ...).
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    async fn send_notice(&self, scope: &ScopeId, text: &str) -> Result<()>;
}
