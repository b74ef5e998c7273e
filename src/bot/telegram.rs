//! Telegram Bot API client: long polling and `sendMessage`.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::TelegramConfig;
use crate::db::OwnerId;
use crate::notify::{DeliveryError, Transport};

const API_BASE: &str = "https://api.telegram.org";

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Telegram API error {status}: {description}")]
    Api { status: u16, description: String },

    #[error("Telegram request failed: {0}")]
    Transport(String),

    #[error("Failed to parse Telegram response: {0}")]
    Parse(#[from] std::io::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub location: Option<SharedLocation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SharedLocation {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

/// Resolve a `${VAR}` reference against the environment.
pub fn resolve_token(
    raw: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, TelegramError> {
    let token = if raw.starts_with("${") {
        let var_name = raw
            .strip_prefix("${")
            .and_then(|s| s.strip_suffix('}'))
            .ok_or_else(|| TelegramError::Config(format!("Malformed env var reference: {raw}")))?;
        lookup(var_name).ok_or_else(|| {
            TelegramError::Config(format!("Environment variable '{var_name}' is not set"))
        })?
    } else {
        raw.to_string()
    };

    if token.trim().is_empty() {
        return Err(TelegramError::Config(
            "Telegram bot token must not be empty".to_string(),
        ));
    }
    Ok(token)
}

pub struct TelegramClient {
    agent: ureq::Agent,
    token: String,
    poll_timeout_secs: u64,
}

impl TelegramClient {
    pub fn new(token: String, poll_timeout_secs: u64) -> Self {
        // The HTTP timeout must outlast the long poll
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(poll_timeout_secs + 15))
            .build();
        Self {
            agent,
            token,
            poll_timeout_secs,
        }
    }

    pub fn from_config(config: &TelegramConfig) -> Result<Self, TelegramError> {
        let token = resolve_token(&config.bot_token, |name| std::env::var(name).ok())?;
        Ok(Self::new(token, config.poll_timeout_secs))
    }

    fn url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", API_BASE, self.token, method)
    }

    /// Long-poll for updates after `offset`. Blocks up to the poll timeout.
    pub fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TelegramError> {
        self.fetch_updates(offset, self.poll_timeout_secs)
    }

    /// Confirm every update before `offset` without waiting for new ones.
    /// Telegram only forgets a batch once a later call passes a higher offset.
    pub fn acknowledge(&self, offset: i64) -> Result<(), TelegramError> {
        self.fetch_updates(offset, 0).map(|_| ())
    }

    fn fetch_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, TelegramError> {
        let response = self
            .agent
            .get(&self.url("getUpdates"))
            .query("offset", &offset.to_string())
            .query("timeout", &timeout_secs.to_string())
            .query("allowed_updates", r#"["message"]"#)
            .call()
            .map_err(request_error)?;
        let body: ApiResponse<Vec<Update>> = response.into_json()?;
        if !body.ok {
            return Err(TelegramError::Api {
                status: 200,
                description: body.description.unwrap_or_default(),
            });
        }
        Ok(body.result.unwrap_or_default())
    }

    pub fn send_message(&self, chat_id: i64, text: &str, markdown: bool) -> Result<(), TelegramError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });
        if markdown {
            body["parse_mode"] = serde_json::Value::String("Markdown".to_string());
        }

        debug!(chat_id, markdown, "Sending Telegram message");
        let response = self
            .agent
            .post(&self.url("sendMessage"))
            .send_json(body)
            .map_err(request_error)?;
        let body: ApiResponse<serde_json::Value> = response.into_json()?;
        if !body.ok {
            return Err(TelegramError::Api {
                status: 200,
                description: body.description.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

/// Describe a failed request without the URL, which carries the token.
fn request_error(err: ureq::Error) -> TelegramError {
    match err {
        ureq::Error::Status(status, response) => {
            let description = response
                .into_json::<ApiResponse<serde_json::Value>>()
                .ok()
                .and_then(|b| b.description)
                .unwrap_or_default();
            TelegramError::Api {
                status,
                description,
            }
        }
        ureq::Error::Transport(transport) => TelegramError::Transport(format!(
            "{}: {}",
            transport.kind(),
            transport.message().unwrap_or("no detail")
        )),
    }
}

/// 403 means the user blocked the bot or left the chat.
pub fn classify_error(err: TelegramError) -> DeliveryError {
    match err {
        TelegramError::Api {
            status: 403,
            description,
        } => DeliveryError::Permanent(description),
        other => DeliveryError::Transient(other.to_string()),
    }
}

impl Transport for TelegramClient {
    fn deliver(&self, owner: OwnerId, text: &str) -> Result<(), DeliveryError> {
        self.send_message(owner, text, false).map_err(classify_error)
    }

    fn channel_name(&self) -> &str {
        "telegram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_token_literal() {
        assert_eq!(resolve_token("123:abc", |_| None).unwrap(), "123:abc");
    }

    #[test]
    fn test_resolve_token_env_reference() {
        let token = resolve_token("${BOT}", |name| {
            (name == "BOT").then(|| "456:def".to_string())
        })
        .unwrap();
        assert_eq!(token, "456:def");
    }

    #[test]
    fn test_resolve_token_errors() {
        assert!(matches!(
            resolve_token("${BOT}", |_| None),
            Err(TelegramError::Config(_))
        ));
        assert!(matches!(
            resolve_token("${BOT", |_| Some("x".into())),
            Err(TelegramError::Config(_))
        ));
        assert!(matches!(resolve_token("", |_| None), Err(TelegramError::Config(_))));
    }

    #[test]
    fn test_classify_error() {
        let blocked = TelegramError::Api {
            status: 403,
            description: "Forbidden: bot was blocked by the user".to_string(),
        };
        assert!(matches!(classify_error(blocked), DeliveryError::Permanent(_)));

        let limited = TelegramError::Api {
            status: 429,
            description: "Too Many Requests: retry after 5".to_string(),
        };
        assert!(matches!(classify_error(limited), DeliveryError::Transient(_)));
        assert!(matches!(
            classify_error(TelegramError::Transport("timed out".into())),
            DeliveryError::Transient(_)
        ));
    }

    #[test]
    fn test_parse_updates() {
        let json = r#"{"ok":true,"result":[
            {"update_id":10,"message":{"message_id":1,"chat":{"id":42,"type":"private"},"text":"/sweep 123 Main St"}},
            {"update_id":11,"message":{"message_id":2,"chat":{"id":42,"type":"private"},
                "location":{"latitude":34.05,"longitude":-118.25}}},
            {"update_id":12,"edited_message":{"message_id":1,"chat":{"id":42},"text":"x"}}
        ]}"#;
        let body: ApiResponse<Vec<Update>> = serde_json::from_str(json).unwrap();
        assert!(body.ok);
        let updates = body.result.unwrap();
        assert_eq!(updates.len(), 3);
        assert_eq!(updates[0].message.as_ref().unwrap().text.as_deref(), Some("/sweep 123 Main St"));
        let loc = updates[1].message.as_ref().unwrap().location.unwrap();
        assert_eq!(loc.latitude, 34.05);
        assert!(updates[2].message.is_none());
    }

    #[test]
    fn test_url_embeds_token() {
        let client = TelegramClient::new("123:abc".to_string(), 30);
        assert_eq!(
            client.url("getUpdates"),
            "https://api.telegram.org/bot123:abc/getUpdates"
        );
    }
}
