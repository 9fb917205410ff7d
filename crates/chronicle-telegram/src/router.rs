use std::{collections::HashMap, sync::Arc};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tokio::sync::{Mutex, OwnedMutexGuard};

use chronicle_core::messaging::throttled::{ThrottleConfig, ThrottledMessenger};
use chronicle_core::{config::Config, engine::ChronicleBot, messaging::port::MessagingPort};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub engine: Arc<ChronicleBot>,
    pub messenger: Arc<dyn MessagingPort>,
    pub chat_locks: Arc<ChatLocks>,
    /// `@username` of this bot, used to strip `/cmd@bot` mentions.
    pub bot_username: Option<String>,
}

/// Serializes command handling per chat so replies keep message order.
#[derive(Default)]
pub struct ChatLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    pub async fn lock_chat(&self, chat_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

pub async fn run_polling(cfg: Arc<Config>, engine: Arc<ChronicleBot>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    let bot_username = match bot.get_me().await {
        Ok(me) => {
            tracing::info!(username = %me.username(), "chronicle started");
            Some(me.username().to_string())
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not fetch bot identity");
            None
        }
    };
    tracing::info!(
        prefix = %engine.prefix(),
        data_dir = %cfg.data_dir.display(),
        allowed_chats = cfg.allowed_chats.len(),
        "listening for commands"
    );

    skip_backlog(&bot).await?;

    // Throttle outbound sends; the adapter still retries once on RetryAfter.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let state = Arc::new(AppState {
        cfg,
        engine,
        messenger,
        chat_locks: Arc::new(ChatLocks::default()),
        bot_username,
    });

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    tracing::info!("dispatcher stopped");
    Ok(())
}

/// Drop updates Telegram queued while the bot was offline, so commands sent
/// during downtime are not replayed on startup.
pub(crate) async fn skip_backlog(bot: &Bot) -> anyhow::Result<()> {
    bot.delete_webhook()
        .drop_pending_updates(true)
        .await
        .map_err(|e| anyhow::anyhow!("failed to drop pending updates: {e}"))?;
    tracing::info!("skipped updates queued while offline");
    Ok(())
}
