//! Telegram adapter (teloxide).
//!
//! Implements the `chronicle-core` MessagingPort over the Telegram Bot API and
//! feeds inbound messages to the command engine.

use async_trait::async_trait;

use teloxide::prelude::*;

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use chronicle_core::{
    domain::ScopeId,
    errors::Error,
    messaging::{port::MessagingPort, types::MessagingCapabilities},
    Result,
};

/// Telegram rejects messages longer than this many characters.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    /// Scopes are Telegram chat ids rendered as strings.
    fn tg_chat(scope: &ScopeId) -> Result<teloxide::types::ChatId> {
        scope
            .as_str()
            .parse::<i64>()
            .map(teloxide::types::ChatId)
            .map_err(|_| Error::External(format!("not a telegram chat id: {scope}")))
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        tracing::warn!("telegram flood limit hit, retrying in {d:?}");
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            max_message_len: TELEGRAM_MESSAGE_LIMIT,
        }
    }

    /// Plain text, sent silently (Telegram's closest thing to a notice).
    async fn send_notice(&self, scope: &ScopeId, text: &str) -> Result<()> {
        let chat = Self::tg_chat(scope)?;
        let limit = self.capabilities().max_message_len;
        for chunk in split_message(text, limit) {
            self.with_retry(|| {
                self.bot
                    .send_message(chat, chunk.clone())
                    .disable_notification(true)
            })
            .await?;
        }
        Ok(())
    }
}

/// Split `text` into pieces of at most `limit` characters.
///
/// Breaks on line boundaries where possible; a single overlong line is cut
/// at the limit.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut out = Vec::new();
    let mut chunk = String::new();
    let mut chunk_len = 0usize;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        let sep = usize::from(chunk_len > 0);

        if chunk_len + sep + line_len <= limit {
            if sep == 1 {
                chunk.push('\n');
            }
            chunk.push_str(line);
            chunk_len += sep + line_len;
            continue;
        }

        if chunk_len > 0 {
            out.push(std::mem::take(&mut chunk));
            chunk_len = 0;
        }

        let mut rest: Vec<char> = line.chars().collect();
        while rest.len() > limit {
            let tail = rest.split_off(limit);
            out.push(rest.into_iter().collect());
            rest = tail;
        }
        chunk = rest.into_iter().collect();
        chunk_len = chunk.chars().count();
    }

    if chunk_len > 0 {
        out.push(chunk);
    }
    out
}
