//! Telegram Bot API 클라이언트.
//!
//! `getUpdates` long polling과 `sendMessage`만 사용합니다.

use async_trait::async_trait;
use hydra_core::TelegramSettings;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::error::{BotError, BotResult};

/// 텔레그램 클라이언트 설정.
#[derive(Clone)]
pub struct TelegramConfig {
    /// @BotFather에서 받은 봇 토큰
    pub bot_token: String,
    /// API 기본 URL (테스트에서 교체)
    pub api_base_url: String,
    /// long polling 대기 시간 (초)
    pub poll_timeout_secs: u64,
    /// 명령을 받을 수 있는 사용자 ID
    pub allowed_users: Vec<i64>,
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"***REDACTED***")
            .field("api_base_url", &self.api_base_url)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("allowed_users", &self.allowed_users)
            .finish()
    }
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base_url: "https://api.telegram.org".to_string(),
            poll_timeout_secs: 30,
            allowed_users: Vec::new(),
        }
    }

    /// 애플리케이션 설정에서 생성합니다.
    pub fn from_settings(settings: &TelegramSettings) -> BotResult<Self> {
        if settings.bot_token.trim().is_empty() {
            return Err(BotError::InvalidConfig(
                "telegram.bot_token is not set".to_string(),
            ));
        }
        if settings.allowed_users.is_empty() {
            warn!("telegram.allowed_users is empty, every command will be ignored");
        }

        Ok(Self {
            bot_token: settings.bot_token.clone(),
            api_base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            poll_timeout_secs: settings.poll_timeout_secs,
            allowed_users: settings.allowed_users.clone(),
        })
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_allowed_users(mut self, users: Vec<i64>) -> Self {
        self.allowed_users = users;
        self
    }

    pub fn with_poll_timeout(mut self, secs: u64) -> Self {
        self.poll_timeout_secs = secs;
        self
    }
}

/// API 공통 응답.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

/// 개별 업데이트.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

/// 메시지 정보.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    pub text: Option<String>,
}

/// 사용자 정보.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub username: Option<String>,
}

/// 채팅 정보.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

/// 채팅 메시지 전송 trait.
#[async_trait]
pub trait ChatSender: Send + Sync {
    /// 채팅에 텍스트를 전송합니다.
    async fn send_text(&self, chat_id: i64, text: &str) -> BotResult<()>;
}

/// Telegram Bot API 클라이언트.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramClient {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &TelegramConfig {
        &self.config
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base_url, self.config.bot_token, method
        )
    }

    /// 응답 본문을 해석합니다.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> BotResult<Option<T>> {
        let status = response.status();
        let body = response.text().await?;

        let parsed: ApiResponse<T> = serde_json::from_str(&body).map_err(|e| {
            error!(status = %status, "Unexpected Telegram response: {}", body);
            BotError::SerializationError(e)
        })?;

        if parsed.ok {
            return Ok(parsed.result);
        }

        if status.as_u16() == 429 {
            let retry_after = parsed
                .parameters
                .and_then(|p| p.retry_after)
                .unwrap_or(60);
            warn!(retry_after, "Telegram rate limited");
            return Err(BotError::RateLimited(retry_after));
        }

        Err(BotError::Api(
            parsed
                .description
                .unwrap_or_else(|| format!("HTTP {}", status)),
        ))
    }

    /// 새 업데이트를 가져옵니다.
    pub async fn get_updates(&self, offset: i64) -> BotResult<Vec<TelegramUpdate>> {
        let params = serde_json::json!({
            "offset": offset,
            "timeout": self.config.poll_timeout_secs,
            "allowed_updates": ["message"],
        });

        let response = self
            .client
            .post(self.method_url("getUpdates"))
            .json(&params)
            .timeout(Duration::from_secs(self.config.poll_timeout_secs + 5))
            .send()
            .await?;

        Ok(Self::parse_response(response).await?.unwrap_or_default())
    }

    /// 메시지를 전송합니다.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> BotResult<()> {
        let params = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&params)
            .send()
            .await?;

        Self::parse_response::<serde_json::Value>(response)
            .await
            .map_err(|e| match e {
                BotError::Api(description) => BotError::SendFailed(description),
                other => other,
            })?;

        debug!(chat_id, "Message sent");
        Ok(())
    }
}

#[async_trait]
impl ChatSender for TelegramClient {
    async fn send_text(&self, chat_id: i64, text: &str) -> BotResult<()> {
        self.send_message(chat_id, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn client(url: &str) -> TelegramClient {
        TelegramClient::new(
            TelegramConfig::new("TOKEN")
                .with_api_base_url(url)
                .with_poll_timeout(0),
        )
    }

    #[test]
    fn test_config_from_settings() {
        let settings = TelegramSettings {
            bot_token: "123:abc".to_string(),
            allowed_users: vec![42],
            poll_timeout_secs: 10,
            api_base_url: "http://localhost:8080/".to_string(),
        };
        let config = TelegramConfig::from_settings(&settings).unwrap();
        assert_eq!(config.api_base_url, "http://localhost:8080");
        assert_eq!(config.allowed_users, vec![42]);
        assert!(!format!("{:?}", config).contains("123:abc"));

        let empty = TelegramSettings {
            bot_token: String::new(),
            ..settings
        };
        assert!(matches!(
            TelegramConfig::from_settings(&empty),
            Err(BotError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_get_updates() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/botTOKEN/getUpdates")
            .match_body(Matcher::PartialJson(serde_json::json!({"offset": 7})))
            .with_status(200)
            .with_body(
                r#"{"ok":true,"result":[{"update_id":7,"message":{"message_id":1,
                "from":{"id":42,"is_bot":false,"username":"op"},"chat":{"id":42,"type":"private"},
                "date":1700000000,"text":"/ping"}}]}"#,
            )
            .create_async()
            .await;

        let updates = client(&server.url()).get_updates(7).await.unwrap();
        mock.assert_async().await;

        assert_eq!(updates.len(), 1);
        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.from.as_ref().map(|u| u.id), Some(42));
        assert_eq!(message.text.as_deref(), Some("/ping"));
    }

    #[tokio::test]
    async fn test_send_message_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/botTOKEN/sendMessage")
            .with_status(400)
            .with_body(r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#)
            .create_async()
            .await;

        let result = client(&server.url()).send_message(1, "hi").await;
        assert!(matches!(result, Err(BotError::SendFailed(d)) if d.contains("chat not found")));
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/botTOKEN/sendMessage")
            .with_status(429)
            .with_body(r#"{"ok":false,"error_code":429,"description":"Too Many Requests","parameters":{"retry_after":5}}"#)
            .create_async()
            .await;

        let result = client(&server.url()).send_message(1, "hi").await;
        assert!(matches!(result, Err(BotError::RateLimited(5))));
    }
}
