//! 설정 관리.
//!
//! 기본값 → 설정 파일 → `HYDRA__` 접두사 환경 변수 순서로 병합합니다.
//! 예: `HYDRA__TELEGRAM__BOT_TOKEN`, `HYDRA__SETTINGS__DEFAULT_LANGUAGE`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::CoreResult;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// 텔레그램 설정
    #[serde(default)]
    pub telegram: TelegramSettings,
    /// 일반 설정
    #[serde(default)]
    pub settings: GeneralSettings,
    /// 거래소 호출 설정
    #[serde(default)]
    pub exchange: ExchangeSettings,
    /// 하트비트 설정
    #[serde(default)]
    pub heartbeat: HeartbeatSettings,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 텔레그램 설정.
#[derive(Clone, Deserialize, Serialize)]
pub struct TelegramSettings {
    /// @BotFather에서 받은 봇 토큰
    #[serde(default)]
    pub bot_token: String,
    /// 명령을 허용할 사용자 ID
    #[serde(default)]
    pub allowed_users: Vec<i64>,
    /// long polling 타임아웃 (초)
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    /// Bot API 기본 URL
    #[serde(default = "default_api_base")]
    pub api_base_url: String,
}

impl std::fmt::Debug for TelegramSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSettings")
            .field("bot_token", &"***REDACTED***")
            .field("allowed_users", &self.allowed_users)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

fn default_poll_timeout() -> u64 {
    30
}
fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            allowed_users: Vec::new(),
            poll_timeout_secs: default_poll_timeout(),
            api_base_url: default_api_base(),
        }
    }
}

/// 일반 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralSettings {
    /// 기본 메시지 언어
    #[serde(default = "default_language")]
    pub default_language: String,
    /// 설정 디렉터리
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,
    /// 거래소 자격증명 파일 이름
    #[serde(default = "default_exchange_file")]
    pub exchange_configs_file: String,
    /// 메시지 카탈로그 파일 이름
    #[serde(default = "default_messages_file")]
    pub messages_file: String,
}

fn default_language() -> String {
    "en".to_string()
}
fn default_config_dir() -> PathBuf {
    PathBuf::from("config")
}
fn default_exchange_file() -> String {
    "exchange_configs.json".to_string()
}
fn default_messages_file() -> String {
    "messages.json".to_string()
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            default_language: default_language(),
            config_dir: default_config_dir(),
            exchange_configs_file: default_exchange_file(),
            messages_file: default_messages_file(),
        }
    }
}

impl GeneralSettings {
    /// 거래소 자격증명 파일 경로.
    pub fn exchange_configs_path(&self) -> PathBuf {
        self.config_dir.join(&self.exchange_configs_file)
    }

    /// 메시지 카탈로그 파일 경로.
    pub fn messages_path(&self) -> PathBuf {
        self.config_dir.join(&self.messages_file)
    }
}

/// 거래소 호출 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExchangeSettings {
    /// 거래소 호출 타임아웃 (초)
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
    /// `testnet` 옵션이 없는 레코드에 적용할 기본값
    #[serde(default)]
    pub default_testnet: bool,
}

fn default_call_timeout() -> u64 {
    30
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_call_timeout(),
            default_testnet: false,
        }
    }
}

impl ExchangeSettings {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

/// 하트비트 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HeartbeatSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 마지막 활동 이후 하트비트를 보낼 간격 (초)
    #[serde(default = "default_heartbeat_interval")]
    pub interval_secs: u64,
    /// 경과 시간 확인 주기 (초)
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_heartbeat_interval() -> u64 {
    4 * 3600
}
fn default_check_interval() -> u64 {
    60
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_heartbeat_interval(),
            check_interval_secs: default_check_interval(),
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// 로그 파일 경로 (없으면 콘솔만)
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file_path: None,
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let builder = config::Config::builder()
            // 파일에서 로드
            .add_source(config::File::from(path.as_ref()).required(false))
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("HYDRA")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("telegram.allowed_users")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> CoreResult<Self> {
        Self::load("config/default.toml")
    }
}
