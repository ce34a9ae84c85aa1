use std::sync::Arc;

use teloxide::prelude::*;

use acb_core::domain::{Activity, UserId, Verification};

use crate::router::{backup_now, AppState};

use super::ui;

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

pub async fn handle_command(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let id = UserId(user.id.0 as i64);
    let chat = msg.chat.id;
    let (cmd, args) = parse_command(msg.text().unwrap_or(""));

    match cmd.as_str() {
        "start" => start(&bot, chat, id, &state).await,
        "profile" => {
            let view = state.engine.session_view(id).await;
            let _ = bot.send_message(chat, ui::render_profile(&view, true)).await;
        }
        "stop" => {
            state.engine.stop(id).await;
            let _ = bot
                .send_message(chat, "❌ You left the conversation / search.")
                .await;
        }
        "report" => report(&bot, chat, id, &state).await,
        "myid" => {
            let _ = bot.send_message(chat, format!("🆔 Your user ID: {id}")).await;
        }
        "online" => online(&bot, chat, id, &state).await,
        "ban" => moderate(&bot, chat, id, &state, &args, true).await,
        "unban" => moderate(&bot, chat, id, &state, &args, false).await,
        "broadcast" => broadcast(&bot, chat, id, &state, &args).await,
        "adminpanel" => {
            if require_admin(&bot, chat, id, &state).await {
                let _ = bot
                    .send_message(chat, "⚙️ Admin panel:")
                    .reply_markup(ui::admin_panel_keyboard())
                    .await;
            }
        }
        _ => {
            let _ = bot
                .send_message(chat, "⚠️ Unknown command. Send /start for the menu.")
                .await;
        }
    }

    Ok(())
}

async fn start(bot: &Bot, chat: ChatId, id: UserId, state: &Arc<AppState>) {
    let _ = bot.send_message(chat, ui::WELCOME).await;

    let view = state.engine.session_view(id).await;
    if view.verification == Verification::Verified {
        match view.activity {
            Activity::Searching => {
                let _ = bot
                    .send_message(chat, "⏳ You are searching for a partner.\nUse /stop to cancel.")
                    .await;
            }
            Activity::Paired => {
                let _ = bot
                    .send_message(
                        chat,
                        "💬 You are in an anonymous conversation.\nUse /stop to end it.",
                    )
                    .await;
            }
            Activity::Idle => {
                let _ = bot
                    .send_message(chat, "Pick an option to get going:")
                    .reply_markup(ui::main_menu_keyboard())
                    .await;
            }
        }
        return;
    }

    // Short verification: gender, then age.
    state.engine.begin_registration(id).await;
    let _ = bot
        .send_message(chat, "🚻 Select your gender:")
        .reply_markup(ui::gender_keyboard())
        .await;
}

async fn report(bot: &Bot, chat: ChatId, id: UserId, state: &Arc<AppState>) {
    let Some(report) = state.engine.report(id).await else {
        let _ = bot
            .send_message(chat, "⚠️ You are not in an anonymous conversation.")
            .await;
        return;
    };

    let text = ui::render_report(&report);
    for &admin in &state.cfg.admin_ids {
        let _ = bot
            .send_message(ChatId(admin), text.clone())
            .reply_markup(ui::ban_unban_keyboard(report.reported))
            .await;
    }
    let _ = bot
        .send_message(chat, "📩 Report sent to the moderators. Thank you!")
        .await;
}

async fn online(bot: &Bot, chat: ChatId, id: UserId, state: &Arc<AppState>) {
    let stats = state.engine.online_stats().await;

    if state.cfg.is_admin(id) {
        let searching = state.engine.searching_sessions().await;
        if searching.is_empty() {
            let _ = bot
                .send_message(chat, "📭 Nobody is searching right now.")
                .await;
            return;
        }
        let mut text = String::from("🟢 Users currently searching:\n\n");
        for s in &searching {
            text.push_str(&format!(
                "- {} | {} | {}\n",
                s.id,
                ui::gender_label(s.gender),
                s.age.map_or("?".to_string(), |a| a.to_string()),
            ));
        }
        text.push('\n');
        text.push_str(&ui::render_search_stats(&stats));
        let _ = bot.send_message(chat, text).await;
    } else {
        let _ = bot.send_message(chat, ui::render_search_stats(&stats)).await;
    }
}

async fn require_admin(bot: &Bot, chat: ChatId, id: UserId, state: &Arc<AppState>) -> bool {
    if state.cfg.is_admin(id) {
        return true;
    }
    let _ = bot.send_message(chat, "❌ You are not an admin.").await;
    false
}

async fn moderate(
    bot: &Bot,
    chat: ChatId,
    id: UserId,
    state: &Arc<AppState>,
    args: &str,
    ban: bool,
) {
    if !require_admin(bot, chat, id, state).await {
        return;
    }

    let cmd = if ban { "/ban" } else { "/unban" };
    let Ok(target) = args.trim().parse::<i64>() else {
        let _ = bot
            .send_message(chat, format!("⚠️ Usage: {cmd} <user_id>"))
            .await;
        return;
    };
    let target = UserId(target);

    if ban {
        state.engine.ban(target).await;
        let _ = bot
            .send_message(
                ChatId(target.0),
                "⚠️ You have been banned by an admin and can no longer use this bot.",
            )
            .await;
        let _ = bot.send_message(chat, format!("✅ User {target} banned.")).await;
    } else {
        state.engine.unban(target).await;
        let _ = bot
            .send_message(
                ChatId(target.0),
                "✅ You have been unbanned. Welcome back!",
            )
            .await;
        let _ = bot
            .send_message(chat, format!("✅ User {target} unbanned."))
            .await;
    }
    backup_now(state).await;
}

async fn broadcast(bot: &Bot, chat: ChatId, id: UserId, state: &Arc<AppState>, args: &str) {
    if !require_admin(bot, chat, id, state).await {
        return;
    }
    if args.is_empty() {
        let _ = bot
            .send_message(chat, "📝 Usage: /broadcast <message>")
            .await;
        return;
    }

    let text = format!("📢 Message from the admins:\n\n{args}");
    let mut sent = 0usize;
    let mut failed = 0usize;
    for target in state.engine.broadcast_targets().await {
        match bot.send_message(ChatId(target.0), text.clone()).await {
            Ok(_) => sent += 1,
            Err(_) => failed += 1,
        }
    }
    let _ = bot
        .send_message(chat, format!("✅ Broadcast done. Sent: {sent}. Failed: {failed}."))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_parsing_strips_bot_name_and_splits_args() {
        assert_eq!(
            parse_command("/ban@anon_bot 12345"),
            ("ban".to_string(), "12345".to_string())
        );
        assert_eq!(parse_command("/START"), ("start".to_string(), String::new()));
        assert_eq!(
            parse_command("/broadcast hello  world"),
            ("broadcast".to_string(), "hello  world".to_string())
        );
    }
}
