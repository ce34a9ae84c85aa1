use std::sync::Arc;

use teloxide::prelude::*;

use acb_core::{
    domain::{UserId, Verification},
    engine::RelayOutcome,
};

use crate::router::{backup_now, AppState};

use super::ui;

/// Plain text is either an age entry (mid-registration) or conversation
/// text relayed to the current partner.
pub async fn handle_text(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(text) = msg.text().map(|s| s.to_string()) else {
        return Ok(());
    };
    let id = UserId(user.id.0 as i64);
    let chat = msg.chat.id;

    let view = state.engine.session_view(id).await;
    match view.verification {
        Verification::PendingAge => {
            handle_age_entry(&bot, chat, id, &state, text.trim()).await;
        }
        Verification::PendingGender => {
            let _ = bot
                .send_message(chat, "🚻 Select your gender first:")
                .reply_markup(ui::gender_keyboard())
                .await;
        }
        Verification::Unverified => {
            let _ = bot
                .send_message(chat, "⚠️ Please register first — send /start.")
                .await;
        }
        Verification::Verified => {
            relay(&bot, chat, id, &state, &text).await;
        }
    }

    Ok(())
}

async fn handle_age_entry(bot: &Bot, chat: ChatId, id: UserId, state: &Arc<AppState>, raw: &str) {
    let Ok(age) = raw.parse::<u8>() else {
        let _ = bot
            .send_message(chat, "⚠️ Age must be a number. Try again:")
            .await;
        return;
    };
    if !state.cfg.age_in_range(age) {
        let _ = bot
            .send_message(
                chat,
                format!(
                    "Sorry, this bot is only for users aged {}–{} 😊",
                    state.cfg.age_min, state.cfg.age_max
                ),
            )
            .await;
        return;
    }

    state.engine.record_age(id, age).await;
    backup_now(state).await;

    let _ = bot
        .send_message(chat, "✅ You are verified! You can now look for a partner 🎭")
        .await;
    let _ = bot
        .send_message(chat, "Pick an option to get going:")
        .reply_markup(ui::main_menu_keyboard())
        .await;
}

async fn relay(bot: &Bot, chat: ChatId, id: UserId, state: &Arc<AppState>, text: &str) {
    match state.engine.relay(id, text).await {
        RelayOutcome::Delivered => {}
        RelayOutcome::NoPartner => {
            let _ = bot
                .send_message(
                    chat,
                    "⚠️ You are not in an anonymous conversation.\nSend /start to find a partner.",
                )
                .await;
        }
        RelayOutcome::DeliveryFailed => {
            let _ = bot
                .send_message(
                    chat,
                    "❌ Your partner could not be reached; the conversation has ended.",
                )
                .await;
        }
    }
}
