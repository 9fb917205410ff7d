use std::path::PathBuf;

/// Core error type for the bot.
///
/// Handler-level variants (`DuplicateName`, `NotFound`, `InvalidArgument`) are
/// turned into user-facing replies; persistence variants are logged for the
/// operator and answered with a generic failure notice.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("duplicate command name: {0}")]
    DuplicateName(String),

    #[error("command not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("persistence failure at {path}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    pub(crate) fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Durable storage could not be read or written.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
