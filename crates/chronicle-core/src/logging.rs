use std::{fs::OpenOptions, path::PathBuf, sync::Mutex};

use tracing_subscriber::{fmt, EnvFilter};

use crate::{errors::Error, Result};

/// Where logs go and how chatty the bot's own crates are.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// Debug level for the chronicle crates instead of info.
    pub verbose: bool,
    /// Append plain-text logs here instead of writing to stdout.
    pub file: Option<PathBuf>,
}

/// Initialize logging/tracing for the bot.
///
/// `RUST_LOG` overrides the default filter.
pub fn init(service_name: &str, opts: &LogOptions) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(service_name, opts.verbose)));

    let builder = fmt().with_env_filter(filter).with_target(false);
    let installed = match &opts.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    Error::Config(format!("cannot open log file {}: {e}", path.display()))
                })?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_ansi(true).try_init(),
    };

    installed.map_err(|e| Error::Config(format!("failed to install log subscriber: {e}")))
}

/// Our crates at info (debug when verbose), everything else at warn.
fn default_directives(service_name: &str, verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!(
        "warn,chronicle={level},chronicle_core={level},chronicle_telegram={level},{service_name}={level}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_only_our_crates() {
        assert_eq!(
            default_directives("chronicle", false),
            "warn,chronicle=info,chronicle_core=info,chronicle_telegram=info,chronicle=info"
        );
        let verbose = default_directives("chronicle", true);
        assert!(verbose.starts_with("warn,"));
        assert!(verbose.contains("chronicle_core=debug"));
    }

    #[test]
    fn unwritable_log_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let opts = LogOptions {
            verbose: false,
            file: Some(dir.path().join("missing").join("chronicle.log")),
        };
        assert!(matches!(init("chronicle", &opts), Err(Error::Config(_))));
    }
}
