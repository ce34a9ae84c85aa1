//! Telegram update handlers.
//!
//! Each handler resolves the sender's session, applies the ban gate, and
//! calls into the `acb-core` engine; all pairing state lives there.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message},
};

use acb_core::domain::UserId;

use crate::router::AppState;

mod callback;
mod commands;
mod text;
mod ui;

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    callback::handle_callback(bot, q, state).await
}

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let id = UserId(user.id.0 as i64);
    state.engine.ensure_session(id).await;

    if state.engine.is_banned(id).await && !state.cfg.is_admin(id) {
        let _ = bot.send_message(msg.chat.id, ui::BANNED).await;
        return Ok(());
    }

    if let Some(text) = msg.text() {
        if text.starts_with('/') {
            return commands::handle_command(bot, msg, state).await;
        }
        return text::handle_text(bot, msg, state).await;
    }

    // Only text is relayed between partners.
    let _ = bot
        .send_message(msg.chat.id, "⚠️ Only text messages are supported.")
        .await;
    Ok(())
}
