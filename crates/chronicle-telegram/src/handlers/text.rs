use teloxide::types::Message;

use chronicle_core::{
    domain::{ScopeId, SenderId},
    messaging::types::{IncomingEvent, MessageKind},
};

/// Map a Telegram message onto the transport-neutral event the engine reads.
///
/// Only plain text messages are `Text`; captions and service messages arrive
/// as `Other` so the engine ignores them.
pub fn to_event(msg: &Message, bot_username: Option<&str>) -> IncomingEvent {
    let scope = ScopeId::new(msg.chat.id.0.to_string());
    let sender = msg.from().map(|u| SenderId::new(u.id.0.to_string()));

    match msg.text() {
        Some(text) => IncomingEvent {
            scope,
            sender,
            kind: MessageKind::Text,
            body: normalize_command(text, bot_username),
        },
        None => IncomingEvent {
            scope,
            sender,
            kind: MessageKind::Other,
            body: msg.caption().unwrap_or_default().to_string(),
        },
    }
}

/// Strip a `@botname` suffix from the first token (`/roll@chronicle_bot 2d6`).
///
/// Mentions of other bots are left alone so they miss the registry.
pub fn normalize_command(text: &str, bot_username: Option<&str>) -> String {
    let Some(username) = bot_username else {
        return text.to_string();
    };
    let end = text.find(char::is_whitespace).unwrap_or(text.len());
    let (head, tail) = text.split_at(end);

    match head.split_once('@') {
        Some((cmd, mention)) if !cmd.is_empty() && mention.eq_ignore_ascii_case(username) => {
            format!("{cmd}{tail}")
        }
        _ => text.to_string(),
    }
}
