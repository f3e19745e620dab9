//! 사용자 메시지 카탈로그.
//!
//! `messages.json` 형식:
//!
//! ```json
//! { "en": { "welcome": "Welcome!", "exchange_added": "Exchange {name} added" } }
//! ```
//!
//! - 없는 키는 키 자체를 반환합니다.
//! - 템플릿의 `{param}`에 값이 없으면 `[missing: param]`을 붙입니다.
//! - 요청한 언어가 없으면 `en`을 사용합니다.

use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{error, info, warn};

use crate::error::{BotError, BotResult};

/// 기본(대체) 언어.
pub const FALLBACK_LANGUAGE: &str = "en";

/// 시작 시 반드시 있어야 하는 키.
pub const REQUIRED_KEYS: [&str; 3] = ["startup_notification", "heartbeat", "welcome"];

/// 언어별 메시지 템플릿.
#[derive(Debug, Clone, Default)]
pub struct MessageCatalog {
    language: String,
    messages: HashMap<String, String>,
}

impl MessageCatalog {
    /// JSON 문자열에서 카탈로그를 생성합니다.
    pub fn from_json_str(json: &str, language: &str) -> BotResult<Self> {
        let root: Value = serde_json::from_str(json)?;
        let languages = root.as_object().ok_or_else(|| {
            BotError::InvalidConfig("messages file must be an object of languages".to_string())
        })?;

        let (language, table) = match languages.get(language) {
            Some(table) => (language.to_string(), table),
            None => {
                warn!(
                    language = %language,
                    fallback = FALLBACK_LANGUAGE,
                    "Language not found in messages, using fallback"
                );
                let table = languages.get(FALLBACK_LANGUAGE).ok_or_else(|| {
                    BotError::InvalidConfig(format!(
                        "neither '{}' nor '{}' messages are defined",
                        language, FALLBACK_LANGUAGE
                    ))
                })?;
                (FALLBACK_LANGUAGE.to_string(), table)
            }
        };

        let messages = table
            .as_object()
            .ok_or_else(|| {
                BotError::InvalidConfig(format!("messages for '{}' must be an object", language))
            })?
            .iter()
            .filter_map(|(key, value)| value.as_str().map(|s| (key.clone(), s.to_string())))
            .collect();

        let catalog = Self { language, messages };
        catalog.check_required();
        Ok(catalog)
    }

    /// 파일에서 카탈로그를 읽습니다.
    ///
    /// 파일이 없거나 형식이 잘못되면 에러를 기록하고 빈 카탈로그를 반환합니다.
    /// 빈 카탈로그는 모든 요청에 키를 그대로 반환합니다.
    pub fn load(path: impl AsRef<Path>, language: &str) -> Self {
        let path = path.as_ref();
        let result = std::fs::read_to_string(path)
            .map_err(BotError::from)
            .and_then(|json| Self::from_json_str(&json, language));

        match result {
            Ok(catalog) => {
                info!(
                    path = %path.display(),
                    language = %catalog.language,
                    count = catalog.messages.len(),
                    "Messages loaded"
                );
                catalog
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to load messages");
                Self {
                    language: language.to_string(),
                    messages: HashMap::new(),
                }
            }
        }
    }

    fn check_required(&self) {
        for key in REQUIRED_KEYS {
            if !self.messages.contains_key(key) {
                error!(key, language = %self.language, "Required message is missing");
            }
        }
    }

    /// 선택된 언어.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// 메시지 수.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// 키 존재 여부.
    pub fn contains(&self, key: &str) -> bool {
        self.messages.contains_key(key)
    }

    /// 파라미터 없이 메시지를 가져옵니다.
    pub fn text(&self, key: &str) -> String {
        self.render(key, &[])
    }

    /// 템플릿에 파라미터를 채워 메시지를 만듭니다.
    pub fn render(&self, key: &str, params: &[(&str, String)]) -> String {
        let Some(template) = self.messages.get(key) else {
            return key.to_string();
        };

        let mut output = String::with_capacity(template.len());
        let mut missing = Vec::new();
        let mut rest = template.as_str();

        while let Some(start) = rest.find('{') {
            output.push_str(&rest[..start]);
            let after = &rest[start + 1..];

            match after.find('}') {
                Some(end) if is_placeholder(&after[..end]) => {
                    let name = &after[..end];
                    match params.iter().find(|(k, _)| *k == name) {
                        Some((_, value)) => output.push_str(value),
                        None => {
                            output.push_str(&rest[start..start + end + 2]);
                            missing.push(name.to_string());
                        }
                    }
                    rest = &after[end + 1..];
                }
                _ => {
                    output.push('{');
                    rest = after;
                }
            }
        }
        output.push_str(rest);

        if !missing.is_empty() {
            error!(key, missing = ?missing, "Message parameter missing");
            output.push_str(&format!(" [missing: {}]", missing.join(", ")));
        }
        output
    }
}

fn is_placeholder(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MESSAGES: &str = r#"{
        "en": {
            "welcome": "Welcome!",
            "heartbeat": "Still alive, last activity {last_activity}",
            "startup_notification": "Started at {start_time} (v{version})",
            "exchange_added": "Exchange {name} added",
            "json_example": "Use {\"a\": 1} or { name }"
        },
        "hu": {
            "welcome": "Üdvözöllek!",
            "heartbeat": "Életjel {last_activity}",
            "startup_notification": "Elindult {start_time}"
        }
    }"#;

    #[test]
    fn test_render_params() {
        let catalog = MessageCatalog::from_json_str(MESSAGES, "en").unwrap();
        assert_eq!(
            catalog.render("exchange_added", &[("name", "binance_main".to_string())]),
            "Exchange binance_main added"
        );
        assert_eq!(catalog.text("welcome"), "Welcome!");
    }

    #[test]
    fn test_unknown_key_returns_key() {
        let catalog = MessageCatalog::from_json_str(MESSAGES, "en").unwrap();
        assert_eq!(catalog.text("no_such_key"), "no_such_key");
    }

    #[test]
    fn test_missing_param_marker() {
        let catalog = MessageCatalog::from_json_str(MESSAGES, "en").unwrap();
        let text = catalog.render("startup_notification", &[("start_time", "now".to_string())]);
        assert_eq!(text, "Started at now (v{version}) [missing: version]");
    }

    #[test]
    fn test_non_placeholder_braces_kept() {
        let catalog = MessageCatalog::from_json_str(MESSAGES, "en").unwrap();
        assert_eq!(catalog.text("json_example"), "Use {\"a\": 1} or { name }");
    }

    #[test]
    fn test_language_fallback() {
        let catalog = MessageCatalog::from_json_str(MESSAGES, "hu").unwrap();
        assert_eq!(catalog.language(), "hu");
        assert_eq!(catalog.text("welcome"), "Üdvözöllek!");

        let catalog = MessageCatalog::from_json_str(MESSAGES, "de").unwrap();
        assert_eq!(catalog.language(), "en");
        assert_eq!(catalog.text("welcome"), "Welcome!");
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = MessageCatalog::load(dir.path().join("messages.json"), "en");
        assert!(catalog.is_empty());
        assert_eq!(catalog.text("welcome"), "welcome");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MESSAGES.as_bytes()).unwrap();

        let catalog = MessageCatalog::load(file.path(), "en");
        assert!(catalog.contains("heartbeat"));
        assert_eq!(catalog.len(), 5);
    }
}
