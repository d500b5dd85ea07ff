//! Telegram Bot API notifier with MarkdownV2 formatting.
//!
//! Delivers notifications via the Telegram Bot API `sendMessage` endpoint.
//! Template notifications are rendered with MarkdownV2 escaping and sent
//! with `parse_mode = MarkdownV2`. When Telegram rejects the markup
//! ("can't parse entities"), the same text is re-sent once without a
//! parse mode.

use std::sync::Arc;
use std::time::Duration;

use hookrelay_core::config::TelegramSettings;
use tokio_util::sync::CancellationToken;

use crate::templating::{TemplateFunctions, TemplateSet};
use crate::traits::{Notification, Notifier, NotifyError};

const DEFAULT_API_BASE: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MARKDOWN_V2: &str = "MarkdownV2";

/// Escapes special characters for Telegram MarkdownV2 parse mode.
///
/// Telegram requires these characters to be escaped with a preceding backslash
/// when using MarkdownV2: `\`, `_`, `*`, `[`, `]`, `(`, `)`, `~`, `` ` ``, `>`,
/// `#`, `+`, `-`, `=`, `|`, `{`, `}`, `.`, `!`
pub fn escape_markdown_v2(text: &str) -> String {
    let special = [
        '\\', '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.',
        '!',
    ];
    let mut result = String::with_capacity(text.len() * 2);
    for ch in text.chars() {
        if special.contains(&ch) {
            result.push('\\');
        }
        result.push(ch);
    }
    result
}

/// Template helpers for the Telegram destination: `esc` escapes MarkdownV2.
pub fn telegram_functions() -> TemplateFunctions {
    TemplateFunctions::new().with_filter("esc", escape_markdown_v2)
}

/// Sends notifications via the Telegram Bot API.
pub struct TelegramNotifier {
    bot_token: String,
    api_base: String,
    templates: Arc<TemplateSet>,
    client: reqwest::Client,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("bot_token", &"<redacted>")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl TelegramNotifier {
    /// Creates a new `TelegramNotifier` from decoded settings.
    ///
    /// `templates` must have been loaded with [`telegram_functions`].
    /// Returns [`NotifyError::Config`] if the token is empty.
    pub fn from_config(
        settings: TelegramSettings,
        templates: Arc<TemplateSet>,
    ) -> Result<Self, NotifyError> {
        if settings.token.is_empty() {
            return Err(NotifyError::Config(
                "Telegram bot token must not be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            bot_token: settings.token,
            api_base: settings
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            templates,
            client,
        })
    }

    async fn try_send(
        &self,
        chat_id: &str,
        text: &str,
        parse_mode: Option<&str>,
    ) -> Result<(), NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);

        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(mode) = parse_mode {
            body["parse_mode"] = serde_json::Value::String(mode.to_string());
        }

        tracing::debug!(chat_id, ?parse_mode, "Sending Telegram notification");

        // The URL embeds the bot token.
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Http(e.without_url()))?;
        let status = response.status();
        let resp_body: serde_json::Value = response
            .json()
            .await
            .unwrap_or(serde_json::Value::Null);

        if status.is_success() && resp_body.get("ok") == Some(&serde_json::Value::Bool(true)) {
            tracing::info!(chat_id, "Telegram notification sent");
            return Ok(());
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp_body
                .get("parameters")
                .and_then(|p| p.get("retry_after"))
                .and_then(|v| v.as_u64())
                .unwrap_or(30);
            return Err(NotifyError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        let description = resp_body
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown Telegram API error")
            .to_string();

        if status == reqwest::StatusCode::BAD_REQUEST && is_markup_rejection(&description) {
            return Err(NotifyError::MarkupRejected(description));
        }

        Err(NotifyError::Api {
            status: status.as_u16(),
            description,
        })
    }
}

/// Telegram reports malformed MarkdownV2 as "can't parse entities".
fn is_markup_rejection(description: &str) -> bool {
    description.contains("can't parse entities")
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(
        &self,
        cancel: &CancellationToken,
        chat_id: &str,
        notification: &Notification,
    ) -> Result<(), NotifyError> {
        let text = notification.render(&self.templates)?;
        let parse_mode = match notification {
            Notification::Template { .. } => Some(MARKDOWN_V2),
            Notification::Body(_) => None,
        };

        let first = tokio::select! {
            _ = cancel.cancelled() => return Err(NotifyError::Cancelled),
            result = self.try_send(chat_id, &text, parse_mode) => result,
        };

        match first {
            Err(NotifyError::MarkupRejected(reason)) if parse_mode.is_some() => {
                tracing::warn!(
                    chat_id,
                    template = notification.template_name().unwrap_or_default(),
                    %reason,
                    "MarkdownV2 parsing failed, falling back to plain text"
                );
                tokio::select! {
                    _ = cancel.cancelled() => Err(NotifyError::Cancelled),
                    result = self.try_send(chat_id, &text, None) => result,
                }
            }
            other => other,
        }
    }

    fn channel_name(&self) -> &str {
        "telegram"
    }
}
