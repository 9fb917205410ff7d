//! Cross-messenger abstractions (Telegram today; Matrix/Slack later).

pub mod port;
pub mod throttled;
pub mod types;
