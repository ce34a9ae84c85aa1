use std::sync::Arc;

use teloxide::prelude::*;

use acb_core::{
    domain::{Gender, SearchMode, UserId},
    registry::UserFilter,
};

use crate::router::{backup_now, AppState};

use super::ui;

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let cb_id = q.id.clone();
    let id = UserId(q.from.id.0 as i64);
    let data = q.data.clone().unwrap_or_default();
    let Some(message) = q.message.as_ref() else {
        let _ = bot.answer_callback_query(cb_id).await;
        return Ok(());
    };
    let chat = message.chat.id;
    let msg_id = message.id;

    state.engine.ensure_session(id).await;
    if state.engine.is_banned(id).await && !state.cfg.is_admin(id) {
        let _ = bot.edit_message_text(chat, msg_id, ui::BANNED).await;
        let _ = bot.answer_callback_query(cb_id).await;
        return Ok(());
    }

    let mut parts = data.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("gender"), Some(which), None) => {
            let gender = match which {
                "male" => Gender::Male,
                "female" => Gender::Female,
                _ => {
                    let _ = bot.answer_callback_query(cb_id).await;
                    return Ok(());
                }
            };
            state.engine.record_gender(id, gender).await;
            let prompt = format!(
                "🎂 Enter your age ({}–{}):",
                state.cfg.age_min, state.cfg.age_max
            );
            let _ = bot.edit_message_text(chat, msg_id, prompt).await;
        }

        (Some("menu"), Some(action), None) => {
            menu_action(&bot, chat, msg_id, id, &state, action).await;
        }

        (Some("admin"), Some(action), Some(arg)) if state.cfg.is_admin(id) => {
            admin_action(&bot, chat, msg_id, &state, action, arg).await;
        }

        _ => {}
    }

    let _ = bot.answer_callback_query(cb_id).await;
    Ok(())
}

async fn menu_action(
    bot: &Bot,
    chat: ChatId,
    msg_id: teloxide::types::MessageId,
    id: UserId,
    state: &Arc<AppState>,
    action: &str,
) {
    match action {
        "find" | "find_opposite" => {
            let mode = if action == "find" {
                SearchMode::Any
            } else {
                SearchMode::OppositeGender
            };
            let outcome = state.engine.request_match(id, mode).await;
            let _ = bot
                .edit_message_text(chat, msg_id, ui::render_match_outcome(&outcome))
                .await;
        }
        "edit_profile" => {
            // Requires re-verification; any active conversation ends.
            state.engine.reset_profile(id).await;
            let _ = bot
                .edit_message_text(chat, msg_id, "✏️ Update your profile.\nSelect your gender:")
                .reply_markup(ui::gender_keyboard())
                .await;
        }
        "profile" => {
            let view = state.engine.session_view(id).await;
            let _ = bot.send_message(chat, ui::render_profile(&view, true)).await;
        }
        _ => {}
    }
}

async fn admin_action(
    bot: &Bot,
    chat: ChatId,
    msg_id: teloxide::types::MessageId,
    state: &Arc<AppState>,
    action: &str,
    arg: &str,
) {
    match action {
        "list" => {
            let (filter, title) = match arg {
                "all" => (UserFilter::All, "📋 All users:"),
                "verified" => (UserFilter::Verified, "✅ Verified users:"),
                "unverified" => (UserFilter::Unverified, "⏳ Unverified users:"),
                "banned" => (UserFilter::Banned, "🚫 Banned users:"),
                _ => return,
            };
            let ids = state.engine.user_ids(filter).await;
            if ids.is_empty() {
                let _ = bot.edit_message_text(chat, msg_id, "📭 No users.").await;
                return;
            }
            let _ = bot
                .edit_message_text(chat, msg_id, title)
                .reply_markup(ui::user_list_keyboard(&ids))
                .await;
        }
        "detail" => {
            let Ok(target) = arg.parse::<i64>() else {
                return;
            };
            let view = state.engine.session_view(UserId(target)).await;
            let _ = bot
                .send_message(chat, ui::render_profile(&view, false))
                .reply_markup(ui::ban_unban_keyboard(view.id))
                .await;
        }
        "ban" | "unban" => {
            let Ok(target) = arg.parse::<i64>() else {
                return;
            };
            let target = UserId(target);
            if action == "ban" {
                state.engine.ban(target).await;
                let _ = bot
                    .send_message(
                        ChatId(target.0),
                        "⚠️ You have been banned by an admin and can no longer use this bot.",
                    )
                    .await;
                let _ = bot
                    .edit_message_text(chat, msg_id, format!("🚫 User {target} banned."))
                    .await;
            } else {
                state.engine.unban(target).await;
                let _ = bot
                    .send_message(ChatId(target.0), "✅ You have been unbanned. Welcome back!")
                    .await;
                let _ = bot
                    .edit_message_text(chat, msg_id, format!("✅ User {target} unbanned."))
                    .await;
            }
            backup_now(state).await;
        }
        _ => {}
    }
}
