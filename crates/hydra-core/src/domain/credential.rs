//! 거래소 자격증명 레코드.
//!
//! `exchange_configs.json`에 저장되는 형식 그대로 직렬화됩니다:
//!
//! ```json
//! {
//!   "binance_main": {
//!     "exchange": "binance",
//!     "apiKey": "...",
//!     "secret": "...",
//!     "enableRateLimit": true,
//!     "options": { "testnet": true }
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// 거래소 연결 설정 (영속화 형식).
///
/// # 보안
/// - `Debug` 구현은 `api_key`를 마스킹하고 `secret`을 숨깁니다.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeCredentialRecord {
    /// 거래소 종류 (예: "binance", "paper")
    #[serde(rename = "exchange")]
    pub kind: String,
    #[serde(rename = "apiKey")]
    pub api_key: String,
    pub secret: String,
    #[serde(rename = "enableRateLimit", default = "default_rate_limit")]
    pub enable_rate_limit: bool,
    /// 어댑터별 옵션
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
}

fn default_rate_limit() -> bool {
    true
}

impl fmt::Debug for ExchangeCredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeCredentialRecord")
            .field("kind", &self.kind)
            .field("api_key", &mask_api_key(&self.api_key))
            .field("secret", &"***REDACTED***")
            .field("enable_rate_limit", &self.enable_rate_limit)
            .field("options", &self.options)
            .finish()
    }
}

impl ExchangeCredentialRecord {
    /// 새 레코드를 생성합니다. 요청 한도 준수는 기본으로 켜집니다.
    pub fn new(kind: impl Into<String>, api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            api_key: api_key.into(),
            secret: secret.into(),
            enable_rate_limit: true,
            options: Map::new(),
        }
    }

    /// 옵션을 추가합니다.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// 요청 한도 준수 여부를 설정합니다.
    pub fn with_rate_limit(mut self, enabled: bool) -> Self {
        self.enable_rate_limit = enabled;
        self
    }

    /// 불리언 옵션 조회 (`true`/`"true"` 모두 허용).
    pub fn option_bool(&self, key: &str) -> Option<bool> {
        match self.options.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// 정수 옵션 조회.
    pub fn option_u64(&self, key: &str) -> Option<u64> {
        match self.options.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// 문자열 옵션 조회.
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }

    /// 목록 출력용 요약을 생성합니다.
    pub fn summary(&self) -> ExchangeSummary {
        ExchangeSummary {
            kind: self.kind.clone(),
            masked_api_key: mask_api_key(&self.api_key),
            rate_limited: self.enable_rate_limit,
        }
    }
}

/// 라이브 연결 요약 (시크릿 미포함).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExchangeSummary {
    pub kind: String,
    pub masked_api_key: String,
    pub rate_limited: bool,
}

impl fmt::Display for ExchangeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.masked_api_key)
    }
}

/// API 키를 마스킹합니다.
///
/// 8자 이하면 전체를 `*`로, 그보다 길면 앞뒤 4자만 남깁니다.
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_file_format() {
        let json = r#"{
            "exchange": "binance",
            "apiKey": "abcd1234efgh5678",
            "secret": "topsecret"
        }"#;
        let record: ExchangeCredentialRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.kind, "binance");
        assert!(record.enable_rate_limit);
        assert!(record.options.is_empty());

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["apiKey"], "abcd1234efgh5678");
        assert_eq!(value["enableRateLimit"], true);
        assert!(value.get("options").is_none());
    }

    #[test]
    fn test_debug_masks_secrets() {
        let record = ExchangeCredentialRecord::new("binance", "abcd1234efgh5678", "topsecret");
        let debug = format!("{:?}", record);
        assert!(debug.contains("abcd...5678"));
        assert!(!debug.contains("topsecret"));
    }

    #[test]
    fn test_options() {
        let record = ExchangeCredentialRecord::new("binance", "k", "s")
            .with_option("testnet", true)
            .with_option("recv_window", 10000)
            .with_option("base_url", "http://localhost");
        assert_eq!(record.option_bool("testnet"), Some(true));
        assert_eq!(record.option_u64("recv_window"), Some(10000));
        assert_eq!(record.option_str("base_url"), Some("http://localhost"));
        assert_eq!(record.option_bool("missing"), None);
    }

    #[test]
    fn test_mask_api_key() {
        assert_eq!(mask_api_key("abcd1234efgh5678"), "abcd...5678");
        assert_eq!(mask_api_key("short"), "*****");
        assert_eq!(mask_api_key(""), "");
    }
}
