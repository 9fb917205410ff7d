use crate::domain::{ScopeId, SenderId};

/// Discriminator carried by inbound events. Only plain text is processed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Other,
}

/// Cross-messenger inbound event.
///
/// Transport-specific fields stay in the adapter crate.
#[derive(Clone, Debug)]
pub struct IncomingEvent {
    pub scope: ScopeId,
    pub sender: Option<SenderId>,
    pub kind: MessageKind,
    pub body: String,
}

impl IncomingEvent {
    pub fn text(scope: ScopeId, sender: Option<SenderId>, body: impl Into<String>) -> Self {
        Self {
            scope,
            sender,
            kind: MessageKind::Text,
            body: body.into(),
        }
    }
}

/// Capabilities / limits of a messenger implementation.
///
/// Adapters split replies longer than `max_message_len` characters.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub max_message_len: usize,
}
