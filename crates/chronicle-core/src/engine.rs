//! Inbound event → reply text.
//!
//! `ChronicleBot` owns the [`Registry`] and the loaded handlers. The transport
//! hands it one event at a time and sends back whatever reply it produces.

use std::{collections::HashMap, sync::Arc};

use crate::{
    config::Config,
    domain::{HandlerKind, ScopeId},
    errors::Error,
    handlers::{CommandContext, CommandHandler, CustomCommands, EightBall, Ping, Roller},
    messaging::types::{IncomingEvent, MessageKind},
    registry::{parse_command, Invocation, Registry},
    security::AccessPolicy,
    store::CommandStore,
    utils::truncate_text,
    Result,
};

const LOG_BODY_MAX: usize = 80;

/// Dispatcher settings that do not depend on the transport.
#[derive(Clone, Debug)]
pub struct BotSettings {
    pub prefix: char,
    pub reply_unknown_commands: bool,
    pub access: AccessPolicy,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            prefix: '!',
            reply_unknown_commands: false,
            access: AccessPolicy::default(),
        }
    }
}

impl BotSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            prefix: cfg.command_prefix,
            reply_unknown_commands: cfg.reply_unknown_commands,
            access: cfg.access_policy(),
        }
    }
}

pub struct ChronicleBot {
    settings: BotSettings,
    registry: Registry,
    handlers: HashMap<HandlerKind, Arc<dyn CommandHandler>>,
    custom: Arc<CustomCommands>,
}

impl ChronicleBot {
    /// Build the bot with every addon loaded and registered.
    ///
    /// Name conflicts between addons are logged and the first registrant wins;
    /// storage failures while loading custom commands abort startup.
    pub async fn new(settings: BotSettings, store: Arc<dyn CommandStore>) -> Result<Self> {
        let custom = Arc::new(CustomCommands::new(store));
        let addons: [Arc<dyn CommandHandler>; 4] = [
            Arc::new(Ping),
            Arc::new(EightBall),
            Arc::new(Roller),
            custom.clone(),
        ];

        let registry = Registry::new();
        let mut handlers = HashMap::new();
        for handler in addons {
            match handler.register(&registry).await {
                Ok(()) => {}
                Err(Error::DuplicateName(names)) => {
                    tracing::warn!(handler = %handler.kind(), "command names already taken: {names}");
                }
                Err(e) => return Err(e),
            }
            handlers.insert(handler.kind(), handler);
        }

        tracing::info!(
            prefix = %settings.prefix,
            commands = registry.entries().await.len(),
            "command registry ready"
        );

        Ok(Self {
            settings,
            registry,
            handlers,
            custom,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn prefix(&self) -> char {
        self.settings.prefix
    }

    /// Process one inbound event. `None` means "say nothing".
    pub async fn handle_event(&self, event: &IncomingEvent) -> Option<String> {
        if event.kind != MessageKind::Text {
            return None;
        }
        if !self.settings.access.allows_scope(&event.scope) {
            tracing::debug!(scope = %event.scope, "ignoring event from scope outside allow-list");
            return None;
        }

        let prefix = self.settings.prefix;
        let Some(inv) = self.registry.dispatch(prefix, &event.body).await else {
            return self.unknown_command_reply(&event.body);
        };

        tracing::debug!(
            scope = %event.scope,
            command = %inv.name,
            args = %truncate_text(&inv.args, LOG_BODY_MAX),
            "dispatching"
        );

        let ctx = CommandContext {
            scope: &event.scope,
            sender: event.sender.as_ref(),
            command: &inv.name,
            prefix,
            registry: &self.registry,
            access: &self.settings.access,
        };

        let reply = match self.invoke(&ctx, &inv).await {
            Ok(text) => text,
            Err(e) => self.error_reply(&event.scope, &inv, e),
        };
        Some(reply)
    }

    async fn invoke(&self, ctx: &CommandContext<'_>, inv: &Invocation) -> Result<String> {
        match inv.owner {
            HandlerKind::ListCommands => self.list_commands(ctx.scope).await,
            HandlerKind::Help => Ok(self.help(&inv.args).await),
            kind => {
                let handler = self.handlers.get(&kind).ok_or_else(|| {
                    Error::External(format!("no handler loaded for {kind}"))
                })?;
                handler.handle(ctx, &inv.args).await
            }
        }
    }

    /// Built-ins, addon commands and the scope's own custom commands.
    async fn list_commands(&self, scope: &ScopeId) -> Result<String> {
        let mut names = self
            .registry
            .entries()
            .await
            .into_iter()
            .filter(|(name, kind)| {
                *kind != HandlerKind::CustomCommands
                    || self.custom.commands().contains(&name.as_str())
            })
            .map(|(name, _)| name)
            .collect::<Vec<_>>();
        names.extend(self.custom.names_in(scope).await?);
        names.sort();
        names.dedup();

        let p = self.settings.prefix;
        let listed = names
            .iter()
            .map(|n| format!("{p}{n}"))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("Available commands: {listed}"))
    }

    async fn help(&self, args: &str) -> String {
        let p = self.settings.prefix;
        let target = args.split_whitespace().next().unwrap_or("");
        let target = target.strip_prefix(p).unwrap_or(target);

        if target.is_empty() {
            return format!(
                "Usage: {p}COMMAND [ARGUMENTS]. Type {p}listcommands to see what is available, \
                 or {p}help COMMAND for details on one command."
            );
        }

        match self.registry.owner(target).await {
            None => format!(
                "Unknown command: {p}{target}. Type {p}listcommands to see what is available."
            ),
            Some(HandlerKind::ListCommands) => {
                format!("Usage: {p}listcommands - list the commands available in this room.")
            }
            Some(HandlerKind::Help) => {
                format!("Usage: {p}help [COMMAND] - show general usage, or usage for COMMAND.")
            }
            Some(kind) => match self.handlers.get(&kind) {
                Some(handler) => handler.help_text(target, p),
                None => format!("No help available for {p}{target}."),
            },
        }
    }

    fn unknown_command_reply(&self, body: &str) -> Option<String> {
        if !self.settings.reply_unknown_commands {
            return None;
        }
        let p = self.settings.prefix;
        let (name, _) = parse_command(p, body)?;
        if name.is_empty() {
            return None;
        }
        Some(format!(
            "Invalid command: {p}{name}. Type {p}listcommands to see what is available."
        ))
    }

    fn error_reply(&self, scope: &ScopeId, inv: &Invocation, e: Error) -> String {
        match e {
            Error::DuplicateName(msg)
            | Error::NotFound(msg)
            | Error::InvalidArgument(msg)
            | Error::Unauthorized(msg) => msg,
            e if e.is_persistence() => {
                tracing::error!(scope = %scope, command = %inv.name, "storage failure: {e}");
                "Sorry, I could not save or load that right now. Please try again later."
                    .to_string()
            }
            e => {
                tracing::error!(scope = %scope, command = %inv.name, "command failed: {e}");
                "Sorry, something went wrong while running that command.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::SenderId, store::JsonFileStore};

    async fn bot_with(settings: BotSettings) -> (tempfile::TempDir, ChronicleBot) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::open(dir.path()).await.unwrap());
        let bot = ChronicleBot::new(settings, store).await.unwrap();
        (dir, bot)
    }

    async fn bot() -> (tempfile::TempDir, ChronicleBot) {
        bot_with(BotSettings::default()).await
    }

    fn text(scope: &str, body: &str) -> IncomingEvent {
        IncomingEvent::text(ScopeId::new(scope), Some(SenderId::new("1")), body)
    }

    #[tokio::test]
    async fn registers_every_addon() {
        let (_dir, bot) = bot().await;
        for (name, kind) in [
            ("ping", HandlerKind::Ping),
            ("8ball", HandlerKind::EightBall),
            ("roll", HandlerKind::Roller),
            ("addcommand", HandlerKind::CustomCommands),
            ("help", HandlerKind::Help),
            ("listcommands", HandlerKind::ListCommands),
        ] {
            assert_eq!(bot.registry().owner(name).await, Some(kind), "{name}");
        }
    }

    #[tokio::test]
    async fn ping_pongs() {
        let (_dir, bot) = bot().await;
        assert_eq!(
            bot.handle_event(&text("a", "!ping")).await.as_deref(),
            Some("Pong!")
        );
    }

    #[tokio::test]
    async fn ordinary_chatter_and_unknown_commands_are_silent() {
        let (_dir, bot) = bot().await;
        assert_eq!(bot.handle_event(&text("a", "hello everyone")).await, None);
        assert_eq!(bot.handle_event(&text("a", "!nosuchthing")).await, None);
        assert_eq!(bot.handle_event(&text("a", "!")).await, None);
    }

    #[tokio::test]
    async fn unknown_commands_can_be_answered() {
        let (_dir, bot) = bot_with(BotSettings {
            reply_unknown_commands: true,
            ..BotSettings::default()
        })
        .await;

        let reply = bot.handle_event(&text("a", "!nosuch")).await.unwrap();
        assert!(reply.starts_with("Invalid command: !nosuch"));
        assert_eq!(bot.handle_event(&text("a", "plain text")).await, None);
    }

    #[tokio::test]
    async fn non_text_events_are_ignored() {
        let (_dir, bot) = bot().await;
        let mut ev = text("a", "!ping");
        ev.kind = MessageKind::Other;
        assert_eq!(bot.handle_event(&ev).await, None);
    }

    #[tokio::test]
    async fn scopes_outside_the_allow_list_are_ignored() {
        let (_dir, bot) = bot_with(BotSettings {
            access: AccessPolicy {
                allowed_scopes: vec!["ok".to_string()],
                command_editors: Vec::new(),
            },
            ..BotSettings::default()
        })
        .await;

        assert_eq!(bot.handle_event(&text("nope", "!ping")).await, None);
        assert!(bot.handle_event(&text("ok", "!ping")).await.is_some());
    }

    #[tokio::test]
    async fn roll_replies_with_one_line_per_term() {
        let (_dir, bot) = bot().await;
        let reply = bot
            .handle_event(&text("a", "!roll 1d1+1, 2d1"))
            .await
            .unwrap();
        assert_eq!(
            reply,
            "Roll: 1d1 + 1 ([1] + 1) ==> 2\nRoll: 2d1 ([1,1]) ==> 2"
        );
    }

    #[tokio::test]
    async fn handler_errors_become_replies() {
        let (_dir, bot) = bot().await;

        let reply = bot.handle_event(&text("a", "!roll 2dx")).await.unwrap();
        assert!(reply.starts_with("Cannot roll that"), "{reply}");

        let reply = bot.handle_event(&text("a", "!8ball go")).await.unwrap();
        assert_eq!(reply, "You must ask a question. Try again");

        let reply = bot.handle_event(&text("a", "!roll 1/0")).await.unwrap();
        assert!(reply.contains("division by zero"), "{reply}");
    }

    #[tokio::test]
    async fn custom_command_lifecycle_through_dispatch() {
        let (_dir, bot) = bot().await;

        assert_eq!(
            bot.handle_event(&text("a", "!addcommand hello Welcome to the room!"))
                .await
                .as_deref(),
            Some("New command saved: !hello")
        );
        assert_eq!(
            bot.handle_event(&text("a", "!hello")).await.as_deref(),
            Some("Welcome to the room!")
        );

        let other_room = bot.handle_event(&text("b", "!hello")).await.unwrap();
        assert!(other_room.starts_with("This command does not exist."));

        assert_eq!(
            bot.handle_event(&text("a", "!remcommand hello"))
                .await
                .as_deref(),
            Some("!hello removed.")
        );
        assert_eq!(bot.handle_event(&text("a", "!hello")).await, None);
    }

    #[tokio::test]
    async fn listcommands_shows_only_this_scopes_custom_names() {
        let (_dir, bot) = bot().await;
        bot.handle_event(&text("a", "!addcommand rules Be nice."))
            .await
            .unwrap();
        bot.handle_event(&text("b", "!addcommand secret shh"))
            .await
            .unwrap();

        let reply = bot.handle_event(&text("a", "!listcommands")).await.unwrap();
        assert_eq!(
            reply,
            "Available commands: !8ball, !addcommand, !help, !listcommands, !modcommand, \
             !ping, !remcommand, !roll, !rules"
        );
    }

    #[tokio::test]
    async fn help_delegates_to_the_owner() {
        let (_dir, bot) = bot().await;

        let general = bot.handle_event(&text("a", "!help")).await.unwrap();
        assert!(general.starts_with("Usage: !COMMAND"));

        let roll = bot.handle_event(&text("a", "!help roll")).await.unwrap();
        assert!(roll.starts_with("Usage: !roll"));

        let prefixed = bot.handle_event(&text("a", "!help !8ball")).await.unwrap();
        assert!(prefixed.starts_with("Usage: !8ball"));

        let unknown = bot.handle_event(&text("a", "!help nope")).await.unwrap();
        assert!(unknown.starts_with("Unknown command: !nope"));
    }

    #[tokio::test]
    async fn custom_prefix_is_honoured() {
        let (_dir, bot) = bot_with(BotSettings {
            prefix: '.',
            ..BotSettings::default()
        })
        .await;

        assert_eq!(
            bot.handle_event(&text("a", ".ping")).await.as_deref(),
            Some("Pong!")
        );
        assert_eq!(bot.handle_event(&text("a", "!ping")).await, None);
        let saved = bot
            .handle_event(&text("a", ".addcommand hi there"))
            .await
            .unwrap();
        assert_eq!(saved, "New command saved: .hi");
    }
}
