//! Telegram update handlers.
//!
//! Messages are converted to engine events, handled under the per-chat lock,
//! and any reply goes back through the throttled messenger.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use crate::router::AppState;

mod text;

pub use text::{normalize_command, to_event};

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let event = to_event(&msg, state.bot_username.as_deref());

    let _guard = state.chat_locks.lock_chat(msg.chat.id.0).await;
    let Some(reply) = state.engine.handle_event(&event).await else {
        return Ok(());
    };

    if let Err(e) = state.messenger.send_notice(&event.scope, &reply).await {
        tracing::warn!(scope = %event.scope, error = %e, "failed to send reply");
    }
    Ok(())
}
