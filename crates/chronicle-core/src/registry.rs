//! Live map of command names to the handler that answers them.

use std::collections::BTreeMap;

use tokio::sync::RwLock;

use crate::{domain::HandlerKind, errors::Error, Result};

/// Names every bot answers, regardless of which addons are loaded.
pub const BUILTIN_COMMANDS: [(&str, HandlerKind); 2] = [
    ("listcommands", HandlerKind::ListCommands),
    ("help", HandlerKind::Help),
];

/// A message that resolved to a registered command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub name: String,
    pub args: String,
    pub owner: HandlerKind,
}

/// Split `text` into `(command, args)` when it starts with `prefix`.
///
/// The command is the first whitespace-delimited token without the prefix;
/// args are everything after the first run of whitespace, trimmed.
pub fn parse_command(prefix: char, text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix(prefix)?;
    let (cmd, args) = match rest.find(char::is_whitespace) {
        Some(idx) => (&rest[..idx], rest[idx..].trim()),
        None => (rest, ""),
    };
    Some((cmd, args))
}

/// Process-wide name ownership.
///
/// A name has at most one owner. Ownership changes take the write lock, so a
/// concurrent `dispatch` sees either the old or the new owner, never a partial
/// update.
pub struct Registry {
    names: RwLock<BTreeMap<String, HandlerKind>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// A registry holding only the built-in commands.
    pub fn new() -> Self {
        let names = BUILTIN_COMMANDS
            .iter()
            .map(|(name, kind)| (name.to_string(), *kind))
            .collect();
        Self {
            names: RwLock::new(names),
        }
    }

    /// Claim `names` for `owner`.
    ///
    /// Names already owned by another handler keep their first owner and are
    /// reported together as `DuplicateName`; every other name is still
    /// registered. Claiming a name `owner` already holds is a no-op.
    pub async fn register<I, S>(&self, owner: HandlerKind, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut map = self.names.write().await;
        let mut conflicts = Vec::new();

        for name in names {
            let name = name.as_ref();
            match map.get(name) {
                Some(existing) if *existing != owner => {
                    conflicts.push(format!("{name} (owned by {existing})"));
                }
                Some(_) => {}
                None => {
                    map.insert(name.to_string(), owner);
                }
            }
        }

        if conflicts.is_empty() {
            Ok(())
        } else {
            Err(Error::DuplicateName(conflicts.join(", ")))
        }
    }

    /// Release `names` held by `owner`. Returns how many were removed.
    ///
    /// Names owned by someone else, and the built-ins, are left alone.
    pub async fn unregister<I, S>(&self, owner: HandlerKind, names: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if owner.is_builtin() {
            return 0;
        }

        let mut map = self.names.write().await;
        let mut removed = 0;
        for name in names {
            let name = name.as_ref();
            if map.get(name) == Some(&owner) {
                map.remove(name);
                removed += 1;
            }
        }
        removed
    }

    pub async fn owner(&self, name: &str) -> Option<HandlerKind> {
        self.names.read().await.get(name).copied()
    }

    /// Snapshot of every registered name, sorted.
    pub async fn entries(&self) -> Vec<(String, HandlerKind)> {
        self.names
            .read()
            .await
            .iter()
            .map(|(name, kind)| (name.clone(), *kind))
            .collect()
    }

    /// Resolve the command at the start of `text`, if any.
    ///
    /// Matching is case-sensitive and anchored at the first character.
    pub async fn dispatch(&self, prefix: char, text: &str) -> Option<Invocation> {
        let (name, args) = parse_command(prefix, text)?;
        let owner = self.owner(name).await?;
        Some(Invocation {
            name: name.to_string(),
            args: args.to_string(),
            owner,
        })
    }
}
