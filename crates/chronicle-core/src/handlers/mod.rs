//! Addon command handlers.
//!
//! Each handler owns one or more command names in the [`Registry`] and turns
//! the argument text of an invocation into reply text.

mod custom;
mod eightball;
mod ping;
mod roller;

pub use custom::{CustomCommands, MANAGEMENT_COMMANDS};
pub use eightball::EightBall;
pub use ping::Ping;
pub use roller::Roller;

use async_trait::async_trait;

use crate::{
    domain::{HandlerKind, ScopeId, SenderId},
    registry::Registry,
    security::AccessPolicy,
    Result,
};

/// Everything a handler may look at while answering one invocation.
pub struct CommandContext<'a> {
    pub scope: &'a ScopeId,
    pub sender: Option<&'a SenderId>,
    /// The invoked name, without prefix.
    pub command: &'a str,
    pub prefix: char,
    pub registry: &'a Registry,
    pub access: &'a AccessPolicy,
}

/// Capability interface shared by every addon.
///
/// Errors returned from `handle` carry user-facing text; the engine turns them
/// into the reply.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    fn kind(&self) -> HandlerKind;

    /// Names claimed when the handler is loaded.
    fn commands(&self) -> &'static [&'static str];

    /// Usage text for `help <name>`.
    fn help_text(&self, name: &str, prefix: char) -> String;

    /// Claim this handler's names. Handlers with dynamic names override this.
    async fn register(&self, registry: &Registry) -> Result<()> {
        registry.register(self.kind(), self.commands().iter()).await
    }

    async fn handle(&self, ctx: &CommandContext<'_>, args: &str) -> Result<String>;
}
