use crate::domain::{ScopeId, SenderId};

// ============== Authorization ==============

/// `true` when `id` is on `allowed`, or when `allowed` is empty (unrestricted).
pub fn is_authorized(id: Option<&str>, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    let Some(id) = id else {
        return false;
    };
    allowed.iter().any(|a| a == id)
}

/// Simple allow-lists; there is no role hierarchy.
#[derive(Clone, Debug, Default)]
pub struct AccessPolicy {
    /// Scopes the bot answers in. Empty means every scope.
    pub allowed_scopes: Vec<String>,
    /// Senders allowed to add, modify and remove custom commands. Empty means everyone.
    pub command_editors: Vec<String>,
}

impl AccessPolicy {
    pub fn allows_scope(&self, scope: &ScopeId) -> bool {
        is_authorized(Some(scope.as_str()), &self.allowed_scopes)
    }

    pub fn can_edit_commands(&self, sender: Option<&SenderId>) -> bool {
        is_authorized(sender.map(|s| s.0.as_str()), &self.command_editors)
    }
}
