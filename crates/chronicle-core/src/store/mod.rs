//! Per-scope custom command storage.

mod json;

pub use json::JsonFileStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{domain::ScopeId, errors::Error, Result};

/// One user-defined command, unique by `(scope, name)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDefinition {
    pub scope: ScopeId,
    pub name: String,
    pub response: String,
}

/// Durable `(scope, name) -> response` storage.
///
/// Mutations on one scope are serialized; different scopes never contend.
#[async_trait]
pub trait CommandStore: Send + Sync {
    /// Fails with `DuplicateName` when `name` already exists in `scope`.
    async fn add(&self, scope: &ScopeId, name: &str, response: &str) -> Result<()>;

    /// Fails with `NotFound` when `name` does not exist in `scope`.
    async fn modify(&self, scope: &ScopeId, name: &str, response: &str) -> Result<()>;

    /// Fails with `NotFound` when `name` does not exist in `scope`.
    async fn remove(&self, scope: &ScopeId, name: &str) -> Result<()>;

    /// `Ok(None)` for undefined names; errors only on storage failure.
    async fn lookup(&self, scope: &ScopeId, name: &str) -> Result<Option<String>>;

    /// Names defined in `scope`, sorted.
    async fn list(&self, scope: &ScopeId) -> Result<Vec<String>>;

    /// Every definition across all scopes.
    async fn all(&self) -> Result<Vec<CommandDefinition>>;
}

/// Command names are a single word: ASCII letters, digits and `_`.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidArgument("command name is empty".to_string()));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::InvalidArgument(format!(
            "`{name}` is not a valid command name (use letters, digits and _)"
        )));
    }
    Ok(())
}

pub(crate) fn validate_response(response: &str) -> Result<()> {
    if response.trim().is_empty() {
        return Err(Error::InvalidArgument(
            "command response is empty".to_string(),
        ));
    }
    Ok(())
}
