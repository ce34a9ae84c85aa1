//! Telegram adapter (teloxide).
//!
//! This crate implements the `acb-core` notifier port over the Telegram Bot
//! API and hosts the update router and handlers.

use async_trait::async_trait;

use teloxide::prelude::*;

pub use teloxide::Bot;

use tokio::time::sleep;

use tracing::warn;

pub mod handlers;
pub mod router;

use acb_core::{
    domain::UserId,
    errors::Error,
    ports::{Event, Notifier},
    Result,
};

/// For a bot, the chat id of a private conversation equals the user id.
fn tg_chat(user: UserId) -> teloxide::types::ChatId {
    teloxide::types::ChatId(user.0)
}

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::Transport(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }

    async fn send_text(&self, user: UserId, text: &str) -> Result<()> {
        self.with_retry(|| self.bot.send_message(tg_chat(user), text.to_string()))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramMessenger {
    async fn notify(&self, user: UserId, event: Event) {
        let text = match event {
            Event::Matched => {
                "💬 Partner found! You are chatting anonymously now.\nUse /stop to leave."
            }
            Event::PartnerLeft => "❌ Your partner left the conversation.",
        };
        if let Err(e) = self.send_text(user, text).await {
            warn!(user = user.0, error = %e, "notification failed");
        }
    }

    async fn deliver(&self, user: UserId, text: &str) -> Result<()> {
        self.send_text(user, text).await
    }
}
