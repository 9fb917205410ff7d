use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    domain::{HandlerKind, ScopeId},
    errors::Error,
    handlers::{CommandContext, CommandHandler},
    registry::Registry,
    store::{validate_name, CommandStore},
    Result,
};

/// Names used to manage custom commands.
pub const MANAGEMENT_COMMANDS: [&str; 3] = ["addcommand", "modcommand", "remcommand"];

/// Room-defined "echo" commands: `!hello` posts whatever the room saved for it.
///
/// Custom names are registered process-wide but answered per scope. The
/// handler counts how many scopes define each name and releases the registry
/// entry when the last one removes it.
pub struct CustomCommands {
    store: Arc<dyn CommandStore>,
    scope_counts: Mutex<HashMap<String, usize>>,
}

impl CustomCommands {
    pub fn new(store: Arc<dyn CommandStore>) -> Self {
        Self {
            store,
            scope_counts: Mutex::new(HashMap::new()),
        }
    }

    /// Custom names defined in the invoking scope, sorted.
    pub async fn names_in(&self, scope: &ScopeId) -> Result<Vec<String>> {
        self.store.list(scope).await
    }

    async fn add(&self, ctx: &CommandContext<'_>, args: &str) -> Result<String> {
        let p = ctx.prefix;
        let (name, response) = split_definition(p, args).ok_or_else(|| {
            Error::InvalidArgument(format!("Usage: {p}addcommand NAME RESPONSE"))
        })?;
        validate_name(name).map_err(|e| Error::InvalidArgument(user_reason(e)))?;

        self.claim(ctx.registry, name).await?;
        match self.store.add(ctx.scope, name, response).await {
            Ok(()) => {
                tracing::info!(scope = %ctx.scope, name, "custom command added");
                Ok(format!("New command saved: {p}{name}"))
            }
            Err(e) => {
                self.release(ctx.registry, name).await;
                Err(match e {
                    Error::DuplicateName(_) => Error::DuplicateName(format!(
                        "This command already exists. You can modify it by typing `{p}modcommand {name}`"
                    )),
                    other => other,
                })
            }
        }
    }

    async fn modify(&self, ctx: &CommandContext<'_>, args: &str) -> Result<String> {
        let p = ctx.prefix;
        let (name, response) = split_definition(p, args).ok_or_else(|| {
            Error::InvalidArgument(format!("Usage: {p}modcommand NAME RESPONSE"))
        })?;

        self.store
            .modify(ctx.scope, name, response)
            .await
            .map_err(|e| match e {
                Error::NotFound(_) => not_defined(p, name),
                other => other,
            })?;

        tracing::info!(scope = %ctx.scope, name, "custom command modified");
        Ok(format!("{p}{name} modified."))
    }

    async fn remove(&self, ctx: &CommandContext<'_>, args: &str) -> Result<String> {
        let p = ctx.prefix;
        let name = args.trim();
        let name = name.strip_prefix(p).unwrap_or(name);
        if name.is_empty() {
            return Err(Error::InvalidArgument(format!("Usage: {p}remcommand NAME")));
        }

        self.store
            .remove(ctx.scope, name)
            .await
            .map_err(|e| match e {
                Error::NotFound(_) => Error::NotFound(
                    "This command does not exist. Nothing to remove.".to_string(),
                ),
                other => other,
            })?;
        self.release(ctx.registry, name).await;

        tracing::info!(scope = %ctx.scope, name, "custom command removed");
        Ok(format!("{p}{name} removed."))
    }

    async fn run(&self, ctx: &CommandContext<'_>) -> Result<String> {
        self.store
            .lookup(ctx.scope, ctx.command)
            .await?
            .ok_or_else(|| not_defined(ctx.prefix, ctx.command))
    }

    /// Register `name` for this handler and count one more scope using it.
    async fn claim(&self, registry: &Registry, name: &str) -> Result<()> {
        let mut counts = self.scope_counts.lock().await;
        if MANAGEMENT_COMMANDS.contains(&name) {
            return Err(taken(name));
        }
        registry
            .register(HandlerKind::CustomCommands, [name])
            .await
            .map_err(|_| taken(name))?;
        *counts.entry(name.to_string()).or_insert(0) += 1;
        Ok(())
    }

    /// Undo one `claim`; the last release drops the registry entry.
    async fn release(&self, registry: &Registry, name: &str) {
        let mut counts = self.scope_counts.lock().await;
        let Some(count) = counts.get_mut(name) else {
            return;
        };
        *count = count.saturating_sub(1);
        if *count == 0 {
            counts.remove(name);
            registry
                .unregister(HandlerKind::CustomCommands, [name])
                .await;
        }
    }
}

#[async_trait]
impl CommandHandler for CustomCommands {
    fn kind(&self) -> HandlerKind {
        HandlerKind::CustomCommands
    }

    fn commands(&self) -> &'static [&'static str] {
        &MANAGEMENT_COMMANDS
    }

    fn help_text(&self, name: &str, prefix: char) -> String {
        match name {
            "addcommand" => format!(
                "Usage: {prefix}addcommand NAME RESPONSE - create {prefix}NAME, which replies with RESPONSE in this room."
            ),
            "modcommand" => format!(
                "Usage: {prefix}modcommand NAME RESPONSE - change what {prefix}NAME replies in this room."
            ),
            "remcommand" => {
                format!("Usage: {prefix}remcommand NAME - delete {prefix}NAME from this room.")
            }
            other => format!("{prefix}{other} is a custom command. It takes no arguments."),
        }
    }

    /// Claim the management names plus every stored custom name.
    async fn register(&self, registry: &Registry) -> Result<()> {
        registry
            .register(HandlerKind::CustomCommands, MANAGEMENT_COMMANDS)
            .await?;

        let defs = self.store.all().await?;
        let mut counts = self.scope_counts.lock().await;
        for def in defs {
            if let Err(e) = registry
                .register(HandlerKind::CustomCommands, [def.name.as_str()])
                .await
            {
                tracing::warn!(scope = %def.scope, name = %def.name, "stored command shadowed: {e}");
                continue;
            }
            *counts.entry(def.name).or_insert(0) += 1;
        }

        tracing::info!(names = counts.len(), "loaded custom commands");
        Ok(())
    }

    async fn handle(&self, ctx: &CommandContext<'_>, args: &str) -> Result<String> {
        let managing = MANAGEMENT_COMMANDS.contains(&ctx.command);
        if managing && !ctx.access.can_edit_commands(ctx.sender) {
            return Err(Error::Unauthorized(
                "You are not allowed to edit commands here.".to_string(),
            ));
        }

        match ctx.command {
            "addcommand" => self.add(ctx, args).await,
            "modcommand" => self.modify(ctx, args).await,
            "remcommand" => self.remove(ctx, args).await,
            _ => self.run(ctx).await,
        }
    }
}

/// `NAME RESPONSE...` -> `(NAME, RESPONSE)`, tolerating a prefixed `!NAME`.
fn split_definition(prefix: char, args: &str) -> Option<(&str, &str)> {
    let args = args.trim();
    let idx = args.find(char::is_whitespace)?;
    let name = &args[..idx];
    let response = args[idx..].trim();
    let name = name.strip_prefix(prefix).unwrap_or(name);
    if name.is_empty() || response.is_empty() {
        return None;
    }
    Some((name, response))
}

fn not_defined(prefix: char, name: &str) -> Error {
    Error::NotFound(format!(
        "This command does not exist. You can add it by typing `{prefix}addcommand {name}`"
    ))
}

fn taken(name: &str) -> Error {
    Error::DuplicateName(format!(
        "`{name}` is already provided by the bot and cannot be redefined."
    ))
}

fn user_reason(e: Error) -> String {
    match e {
        Error::InvalidArgument(reason) => reason,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::SenderId,
        security::AccessPolicy,
        store::JsonFileStore,
    };

    struct Fixture {
        _dir: tempfile::TempDir,
        handler: CustomCommands,
        registry: Registry,
        access: AccessPolicy,
    }

    impl Fixture {
        async fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let store = Arc::new(JsonFileStore::open(dir.path()).await.unwrap());
            let handler = CustomCommands::new(store);
            let registry = Registry::new();
            registry
                .register(HandlerKind::Roller, ["roll"])
                .await
                .unwrap();
            handler.register(&registry).await.unwrap();
            Self {
                _dir: dir,
                handler,
                registry,
                access: AccessPolicy::default(),
            }
        }

        async fn call(&self, scope: &str, command: &str, args: &str) -> Result<String> {
            let scope = ScopeId::new(scope);
            let ctx = CommandContext {
                scope: &scope,
                sender: None,
                command,
                prefix: '!',
                registry: &self.registry,
                access: &self.access,
            };
            self.handler.handle(&ctx, args).await
        }
    }

    #[test]
    fn splits_name_and_response() {
        assert_eq!(
            split_definition('!', "hello  Welcome to the room!"),
            Some(("hello", "Welcome to the room!"))
        );
        assert_eq!(split_definition('!', "!hello hi"), Some(("hello", "hi")));
        assert_eq!(split_definition('!', "hello"), None);
        assert_eq!(split_definition('!', ""), None);
    }

    #[tokio::test]
    async fn add_registers_and_runs_in_its_scope() {
        let fx = Fixture::new().await;

        let reply = fx.call("a", "addcommand", "hello Welcome!").await.unwrap();
        assert_eq!(reply, "New command saved: !hello");
        assert_eq!(
            fx.registry.owner("hello").await,
            Some(HandlerKind::CustomCommands)
        );
        assert_eq!(fx.call("a", "hello", "").await.unwrap(), "Welcome!");
    }

    #[tokio::test]
    async fn duplicate_add_reports_and_keeps_registration() {
        let fx = Fixture::new().await;
        fx.call("a", "addcommand", "hello one").await.unwrap();

        let err = fx.call("a", "addcommand", "hello two").await.unwrap_err();
        assert!(matches!(err, Error::DuplicateName(ref m) if m.contains("!modcommand hello")));
        assert!(fx.registry.owner("hello").await.is_some());
        assert_eq!(fx.call("a", "hello", "").await.unwrap(), "one");
    }

    #[tokio::test]
    async fn cannot_shadow_other_handlers() {
        let fx = Fixture::new().await;

        for name in ["roll", "help", "addcommand"] {
            let err = fx
                .call("a", "addcommand", &format!("{name} nope"))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::DuplicateName(_)), "{name}");
        }
        assert_eq!(fx.registry.owner("roll").await, Some(HandlerKind::Roller));
    }

    #[tokio::test]
    async fn modify_and_remove_missing_commands() {
        let fx = Fixture::new().await;

        let err = fx.call("a", "modcommand", "ghost boo").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(ref m) if m.contains("!addcommand ghost")));

        let err = fx.call("a", "remcommand", "ghost").await.unwrap_err();
        assert!(
            matches!(err, Error::NotFound(ref m) if m == "This command does not exist. Nothing to remove.")
        );
    }

    #[tokio::test]
    async fn modify_changes_the_reply() {
        let fx = Fixture::new().await;
        fx.call("a", "addcommand", "rules Be nice.").await.unwrap();

        let reply = fx
            .call("a", "modcommand", "rules Be very nice.")
            .await
            .unwrap();
        assert_eq!(reply, "!rules modified.");
        assert_eq!(fx.call("a", "rules", "").await.unwrap(), "Be very nice.");
    }

    #[tokio::test]
    async fn name_stays_registered_until_last_scope_removes_it() {
        let fx = Fixture::new().await;
        fx.call("a", "addcommand", "hello from a").await.unwrap();
        fx.call("b", "addcommand", "hello from b").await.unwrap();

        assert_eq!(
            fx.call("a", "remcommand", "hello").await.unwrap(),
            "!hello removed."
        );
        assert!(fx.registry.owner("hello").await.is_some());
        assert!(matches!(
            fx.call("a", "hello", "").await.unwrap_err(),
            Error::NotFound(_)
        ));
        assert_eq!(fx.call("b", "hello", "").await.unwrap(), "from b");

        fx.call("b", "remcommand", "hello").await.unwrap();
        assert_eq!(fx.registry.owner("hello").await, None);
    }

    #[tokio::test]
    async fn stored_commands_are_registered_on_load() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonFileStore::open(dir.path()).await.unwrap();
            store
                .add(&ScopeId::new("a"), "hello", "hi")
                .await
                .unwrap();
        }

        let store = Arc::new(JsonFileStore::open(dir.path()).await.unwrap());
        let handler = CustomCommands::new(store);
        let registry = Registry::new();
        handler.register(&registry).await.unwrap();

        assert_eq!(
            registry.owner("hello").await,
            Some(HandlerKind::CustomCommands)
        );
        assert_eq!(
            registry.owner("addcommand").await,
            Some(HandlerKind::CustomCommands)
        );
    }

    #[tokio::test]
    async fn editors_allow_list_guards_management() {
        let mut fx = Fixture::new().await;
        fx.access.command_editors = vec!["7".to_string()];

        let scope = ScopeId::new("a");
        let stranger = SenderId::new("8");
        let ctx = CommandContext {
            scope: &scope,
            sender: Some(&stranger),
            command: "addcommand",
            prefix: '!',
            registry: &fx.registry,
            access: &fx.access,
        };
        let err = fx.handler.handle(&ctx, "hello hi").await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
        assert_eq!(fx.registry.owner("hello").await, None);
    }

    #[tokio::test]
    async fn usage_errors_for_incomplete_arguments() {
        let fx = Fixture::new().await;
        assert!(matches!(
            fx.call("a", "addcommand", "lonely").await.unwrap_err(),
            Error::InvalidArgument(_)
        ));
        assert!(matches!(
            fx.call("a", "addcommand", "bad-name hi").await.unwrap_err(),
            Error::InvalidArgument(_)
        ));
        assert!(matches!(
            fx.call("a", "remcommand", "").await.unwrap_err(),
            Error::InvalidArgument(_)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_adds_of_one_name_leave_a_single_claim() {
        let fx = Fixture::new().await;

        let (first, second) = tokio::join!(
            fx.call("a", "addcommand", "hello one"),
            fx.call("a", "addcommand", "hello two")
        );
        let results = [first, second];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(Error::DuplicateName(_))))
                .count(),
            1
        );
        assert_eq!(fx.handler.scope_counts.lock().await.get("hello"), Some(&1));

        fx.call("a", "remcommand", "hello").await.unwrap();
        assert_eq!(fx.registry.owner("hello").await, None);
        assert!(fx.handler.scope_counts.lock().await.get("hello").is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_adds_across_scopes_count_each_scope() {
        let fx = Fixture::new().await;

        let (a, b) = tokio::join!(
            fx.call("a", "addcommand", "hello one"),
            fx.call("b", "addcommand", "hello two")
        );
        a.unwrap();
        b.unwrap();
        assert_eq!(fx.handler.scope_counts.lock().await.get("hello"), Some(&2));

        fx.call("a", "remcommand", "hello").await.unwrap();
        assert_eq!(
            fx.registry.owner("hello").await,
            Some(HandlerKind::CustomCommands)
        );
        assert_eq!(fx.call("b", "hello", "").await.unwrap(), "two");
    }
}
