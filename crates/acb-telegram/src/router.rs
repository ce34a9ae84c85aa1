use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tracing::warn;

use acb_core::{config::Config, engine::PairingEngine, persist};

use crate::handlers;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub engine: Arc<PairingEngine>,
}

pub async fn run_polling(
    bot: Bot,
    cfg: Arc<Config>,
    engine: Arc<PairingEngine>,
) -> anyhow::Result<()> {
    if let Ok(me) = bot.get_me().await {
        println!("acb started: @{}", me.username());
    }
    println!("Admins: {}", cfg.admin_ids.len());

    let state = Arc::new(AppState { cfg, engine });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

/// Snapshot all sessions to the backup file. Best-effort: a failed backup is
/// logged, never surfaced to the user.
pub async fn backup_now(state: &AppState) {
    let snapshot = state.engine.snapshot().await;
    if let Err(e) = persist::save(&state.cfg.backup_file, &snapshot) {
        warn!(path = %state.cfg.backup_file.display(), error = %e, "backup failed");
    }
}
