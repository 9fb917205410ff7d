use async_trait::async_trait;
use rand::seq::SliceRandom;

use crate::{
    domain::HandlerKind,
    errors::Error,
    handlers::{CommandContext, CommandHandler},
    Result,
};

pub const FATES: [&str; 18] = [
    "Resoundingly, yes.",
    "Chances are good.",
    "Signs point to yes.",
    "Wheel.",
    "It is worth the attempt.",
    "Uncertainty clouds my sight.",
    "Wheel and woe.",
    "Neither wheel nor woe.",
    "Concentrate, and ask again.",
    "I cannot say for sure.",
    "The fates do not know.",
    "Why are you asking me? I'm just a bot.",
    "Error: Fate API returned 404. Try again later.",
    "Woe.",
    "Chances are poor.",
    "Signs point to no.",
    "Very doubtful.",
    "Absolutely no.",
];

/// `8ball QUESTION?`: a random, vague answer.
pub struct EightBall;

impl EightBall {
    fn answer(question: &str) -> Result<&'static str> {
        if !question.trim_end().ends_with('?') {
            return Err(Error::InvalidArgument(
                "You must ask a question. Try again".to_string(),
            ));
        }
        FATES
            .choose(&mut rand::thread_rng())
            .copied()
            .ok_or_else(|| Error::External("no fates configured".to_string()))
    }
}

#[async_trait]
impl CommandHandler for EightBall {
    fn kind(&self) -> HandlerKind {
        HandlerKind::EightBall
    }

    fn commands(&self) -> &'static [&'static str] {
        &["8ball"]
    }

    fn help_text(&self, _name: &str, prefix: char) -> String {
        format!("Usage: {prefix}8ball QUESTION? - consult the fates. End your question with `?`.")
    }

    async fn handle(&self, _ctx: &CommandContext<'_>, args: &str) -> Result<String> {
        Self::answer(args).map(str::to_string)
    }
}
