use std::sync::Arc;

use chronicle_core::{
    config::Config,
    engine::{BotSettings, ChronicleBot},
    store::{CommandStore, JsonFileStore},
};

#[tokio::main]
async fn main() -> Result<(), chronicle_core::Error> {
    let cfg = Arc::new(Config::load()?);
    chronicle_core::logging::init("chronicle", &cfg.log_options())?;

    tracing::info!(dir = %cfg.commands_dir().display(), "opening command store");
    let store: Arc<dyn CommandStore> = Arc::new(JsonFileStore::open(cfg.commands_dir()).await?);
    let engine = Arc::new(ChronicleBot::new(BotSettings::from_config(&cfg), store).await?);

    chronicle_telegram::router::run_polling(cfg, engine)
        .await
        .map_err(|e| chronicle_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
