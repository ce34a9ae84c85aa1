use std::sync::Arc;

use acb_core::{config::Config, engine::PairingEngine, persist};
use acb_telegram::{Bot, TelegramMessenger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    acb_core::logging::init("acb")?;

    let cfg = Arc::new(Config::load()?);

    let bot = Bot::new(cfg.bot_token.clone());
    let messenger = Arc::new(TelegramMessenger::new(bot.clone()));
    let engine = Arc::new(PairingEngine::new(cfg.chat_log_capacity, messenger));

    // Rehydrate sessions from the last backup, if any.
    match persist::load(&cfg.backup_file) {
        Ok(Some(snapshot)) => {
            let users = engine.restore(snapshot).await;
            tracing::info!(users, "restored sessions from backup");
        }
        Ok(None) => tracing::info!("no backup file; starting fresh"),
        Err(e) => tracing::warn!(error = %e, "could not read backup; starting fresh"),
    }

    acb_telegram::router::run_polling(bot, cfg.clone(), engine.clone()).await?;

    // The dispatcher returned (shutdown signal): save a final snapshot.
    let snapshot = engine.snapshot().await;
    if let Err(e) = persist::save(&cfg.backup_file, &snapshot) {
        tracing::warn!(error = %e, "final backup failed");
    }

    Ok(())
}
