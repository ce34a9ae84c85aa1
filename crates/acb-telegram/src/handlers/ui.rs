//! Message copy and inline keyboards.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use acb_core::{
    domain::{Activity, ChatOrigin, Gender, UserId, Verification},
    engine::{IneligibleReason, MatchOutcome, ModReport, SearchStats},
    session::UserSession,
};

pub const WELCOME: &str = "👋 Welcome to the anonymous chat bot!\n\n\
This bot pairs you with a random verified user for a one-to-one anonymous \
conversation.\n\n\
⚠️ Please use it responsibly:\n\
• Respect the other person.\n\
• Do not share personal data with strangers.\n\
• No hateful or explicit content.\n\
Violations lead to a permanent ban.";

pub const BANNED: &str = "⚠️ You have been banned from this bot.";

pub fn main_menu_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("🔍 Find a partner", "menu:find")],
        vec![InlineKeyboardButton::callback(
            "💘 Find opposite gender",
            "menu:find_opposite",
        )],
        vec![InlineKeyboardButton::callback(
            "✏️ Edit profile",
            "menu:edit_profile",
        )],
        vec![InlineKeyboardButton::callback("👤 My profile", "menu:profile")],
    ])
}

pub fn gender_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("Male", "gender:male")],
        vec![InlineKeyboardButton::callback("Female", "gender:female")],
    ])
}

pub fn admin_panel_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("📋 All users", "admin:list:all")],
        vec![InlineKeyboardButton::callback(
            "✅ Verified",
            "admin:list:verified",
        )],
        vec![InlineKeyboardButton::callback(
            "⏳ Unverified",
            "admin:list:unverified",
        )],
        vec![InlineKeyboardButton::callback("🚫 Banned", "admin:list:banned")],
    ])
}

pub fn user_list_keyboard(ids: &[UserId]) -> InlineKeyboardMarkup {
    let rows = ids
        .iter()
        .map(|id| {
            vec![InlineKeyboardButton::callback(
                format!("User {id}"),
                format!("admin:detail:{}", id.0),
            )]
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(rows)
}

pub fn ban_unban_keyboard(id: UserId) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("🚫 Ban", format!("admin:ban:{}", id.0)),
        InlineKeyboardButton::callback("✅ Unban", format!("admin:unban:{}", id.0)),
    ]])
}

pub fn gender_label(g: Option<Gender>) -> &'static str {
    match g {
        Some(Gender::Male) => "Male",
        Some(Gender::Female) => "Female",
        None => "-",
    }
}

fn status_line(s: &UserSession) -> String {
    if s.banned {
        return "🚫 Banned".to_string();
    }
    match s.activity {
        Activity::Paired => "💬 In a conversation".to_string(),
        Activity::Searching => "🔍 Searching for a partner".to_string(),
        Activity::Idle => "⏸️ Idle".to_string(),
    }
}

pub fn render_profile(s: &UserSession, own: bool) -> String {
    let mut out = String::new();
    out.push_str(if own {
        "📝 Your profile\n"
    } else {
        "📝 User profile\n"
    });
    out.push_str(&format!("🆔 User ID: {}\n", s.id));
    out.push_str(&format!("🚻 Gender: {}\n", gender_label(s.gender)));
    out.push_str(&format!(
        "🎂 Age: {}\n",
        s.age.map_or("-".to_string(), |a| a.to_string())
    ));
    out.push_str(&format!("📌 Status: {}\n", status_line(s)));
    out.push_str(&format!(
        "✅ Verified: {}\n",
        if s.verification == Verification::Verified {
            "yes"
        } else {
            "no"
        }
    ));
    out.push_str(&format!("🚫 Banned: {}", if s.banned { "yes" } else { "no" }));
    if own {
        out.push_str("\n\n🔒 Only you can see this. You stay anonymous to your partner.");
    }
    out
}

pub fn render_search_stats(stats: &SearchStats) -> String {
    format!(
        "👥 Verified users: {}\n🟢 Currently searching: {}",
        stats.verified, stats.searching
    )
}

pub fn render_match_outcome(outcome: &MatchOutcome) -> String {
    match outcome {
        MatchOutcome::Paired(_) => {
            "💬 Partner found! You are chatting anonymously now.\nUse /stop to leave.".to_string()
        }
        MatchOutcome::Searching(stats) => format!(
            "🔍 Searching for a partner...\n\n{}\n\nUse /stop to cancel.",
            render_search_stats(stats)
        ),
        MatchOutcome::AlreadySearching(stats) => format!(
            "⏳ You are already searching.\n\n{}\n\nUse /stop to cancel.",
            render_search_stats(stats)
        ),
        MatchOutcome::AlreadyPaired => {
            "⚠️ You are already in a conversation. Use /stop to leave.".to_string()
        }
        MatchOutcome::Ineligible(IneligibleReason::Unverified) => {
            "⚠️ Please finish registration first — send /start.".to_string()
        }
        MatchOutcome::Ineligible(IneligibleReason::Banned) => BANNED.to_string(),
    }
}

fn render_log(log: &[(ChatOrigin, String)]) -> String {
    if log.is_empty() {
        return "(empty)".to_string();
    }
    log.iter()
        .map(|(origin, text)| match origin {
            ChatOrigin::Own => format!("🟢 Self: {text}"),
            ChatOrigin::Partner => format!("🔵 Partner: {text}"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_report(report: &ModReport) -> String {
    format!(
        "🚨 USER REPORT\n\nReporter: {}\nReported: {}\n\n\
📑 Reporter's recent log:\n{}\n\n📑 Reported user's recent log:\n{}",
        report.reporter,
        report.reported,
        render_log(&report.reporter_log),
        render_log(&report.reported_log),
    )
}
