use async_trait::async_trait;

use crate::{
    domain::HandlerKind,
    handlers::{CommandContext, CommandHandler},
    Result,
};

/// `ping` -> `Pong!`. Handy to check the bot is alive.
pub struct Ping;

#[async_trait]
impl CommandHandler for Ping {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Ping
    }

    fn commands(&self) -> &'static [&'static str] {
        &["ping"]
    }

    fn help_text(&self, _name: &str, prefix: char) -> String {
        format!("Usage: {prefix}ping - check that the bot is listening.")
    }

    async fn handle(&self, _ctx: &CommandContext<'_>, _args: &str) -> Result<String> {
        Ok("Pong!".to_string())
    }
}
