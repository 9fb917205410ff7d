use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

use crate::{errors::Error, logging::LogOptions, security::AccessPolicy, Result};

/// Typed configuration, read from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    // Transport
    pub telegram_bot_token: String,

    // Commands
    pub command_prefix: char,
    pub reply_unknown_commands: bool,

    // Storage
    pub data_dir: PathBuf,

    // Allow-lists
    pub allowed_chats: Vec<String>,
    pub command_editors: Vec<String>,

    // Logging
    pub log_file: Option<PathBuf>,
    pub log_verbose: bool,
}

impl Config {
    /// Load from the process environment, after an optional `.env` file.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup (tests, embedding).
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let telegram_bot_token = var("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let command_prefix = parse_prefix(var("COMMAND_PREFIX"))?;
        let reply_unknown_commands = var("REPLY_UNKNOWN_COMMANDS")
            .map(|s| parse_bool(&s))
            .unwrap_or(false);

        let data_dir = var("DATA_DIR")
            .and_then(non_empty)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));

        let allowed_chats = parse_csv(var("ALLOWED_CHATS"));
        let command_editors = parse_csv(var("COMMAND_EDITORS"));

        let log_file = var("LOG_FILE").and_then(non_empty).map(PathBuf::from);
        let log_verbose = var("LOG_VERBOSE").map(|s| parse_bool(&s)).unwrap_or(false);

        Ok(Self {
            telegram_bot_token,
            command_prefix,
            reply_unknown_commands,
            data_dir,
            allowed_chats,
            command_editors,
            log_file,
            log_verbose,
        })
    }

    /// Directory holding the custom command documents.
    pub fn commands_dir(&self) -> PathBuf {
        self.data_dir.join("custom_commands")
    }

    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            verbose: self.log_verbose,
            file: self.log_file.clone(),
        }
    }

    pub fn access_policy(&self) -> AccessPolicy {
        AccessPolicy {
            allowed_scopes: self.allowed_chats.clone(),
            command_editors: self.command_editors.clone(),
        }
    }
}

fn parse_prefix(raw: Option<String>) -> Result<char> {
    let Some(raw) = raw else {
        return Ok('!');
    };
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(Error::Config(format!(
            "COMMAND_PREFIX must be a single character, got {raw:?}"
        ))),
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.insert(key.to_string(), val);
    }
    out
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_csv(v: Option<String>) -> Vec<String> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
