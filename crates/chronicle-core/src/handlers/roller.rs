use async_trait::async_trait;

use crate::{
    dice,
    domain::HandlerKind,
    errors::Error,
    handlers::{CommandContext, CommandHandler},
    Result,
};

/// `roll DICE-SPEC`, e.g. `roll 2d6+3, 1d20`.
pub struct Roller;

#[async_trait]
impl CommandHandler for Roller {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Roller
    }

    fn commands(&self) -> &'static [&'static str] {
        &["roll"]
    }

    fn help_text(&self, _name: &str, prefix: char) -> String {
        format!(
            "Usage: {prefix}roll DICE[, DICE...] - roll dice, e.g. {prefix}roll 2d6+3, 1d20. \
             NdS rolls N dice with S sides; + - * / and parentheses are allowed."
        )
    }

    async fn handle(&self, ctx: &CommandContext<'_>, args: &str) -> Result<String> {
        match dice::roll(args) {
            Ok(outcomes) => Ok(dice::format_outcomes(&outcomes)),
            Err(Error::InvalidArgument(reason)) => Err(Error::InvalidArgument(format!(
                "Cannot roll that: {reason}. Try {}roll 2d6+3",
                ctx.prefix
            ))),
            Err(other) => Err(other),
        }
    }
}
