use std::fmt;

use serde::{Deserialize, Serialize};

/// Conversation (room/chat) a command or stored definition is bound to.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(pub String);

impl ScopeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Author of an inbound message, as reported by the transport.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SenderId(pub String);

impl SenderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// Kind of handler that owns a command name.
///
/// The set is closed: every command the bot answers belongs to one of these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HandlerKind {
    ListCommands,
    Help,
    Ping,
    EightBall,
    Roller,
    CustomCommands,
}

impl HandlerKind {
    /// Built-ins are provided by the dispatcher itself and are never unregistered.
    pub fn is_builtin(self) -> bool {
        matches!(self, Self::ListCommands | Self::Help)
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ListCommands => "listcommands",
            Self::Help => "help",
            Self::Ping => "ping",
            Self::EightBall => "8ball",
            Self::Roller => "roller",
            Self::CustomCommands => "custom commands",
        };
        f.write_str(name)
    }
}
