//! 실행 계층 에러 타입.
//!
//! 모든 에러는 사용자 메시지로 변환할 수 있도록 메시지 키와 파라미터를 제공합니다.
//! 문장 자체는 호출자(메시지 카탈로그)가 만듭니다.

use hydra_exchange::ExchangeError;
use thiserror::Error;

use crate::store::StoreError;

/// 레지스트리/원장/코디네이터 에러.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// 같은 이름의 거래소가 이미 등록됨
    #[error("Exchange already exists: {name}")]
    AlreadyExists { name: String },

    /// 같은 이름에 대한 등록/제거가 진행 중
    #[error("Exchange {name} is busy with another change")]
    Busy { name: String },

    /// 레지스트리에 없는 거래소
    #[error("Exchange not found: {name}")]
    NotFound { name: String },

    /// 자격증명 검증 실패 (인증 거부, 네트워크, 지원하지 않는 종류, 타임아웃)
    #[error("Credential validation failed for {kind}: {reason}")]
    ValidationFailed { kind: String, reason: String },

    /// 검증 후 영구 연결 생성 실패 (레코드는 저장된 상태로 남음)
    #[error("Exchange {name} initialization failed: {reason}")]
    InitializationFailed { name: String, reason: String },

    /// 잘못된 인자
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// 주문 대상 거래소가 설정되지 않음
    #[error("Exchange not configured: {name}")]
    ExchangeNotFound { name: String },

    /// 원장에 없는 포지션
    #[error("Position {position_id} not found on {exchange}")]
    PositionNotFound { exchange: String, position_id: String },

    /// 거래소 호출 실패
    #[error("Exchange {exchange} call failed: {source}")]
    UpstreamFailure {
        exchange: String,
        #[source]
        source: ExchangeError,
    },

    /// 자격증명 저장소 에러
    #[error("Credential store error: {0}")]
    Persistence(#[from] StoreError),
}

/// 실행 작업을 위한 Result 타입.
pub type ExecutionResult<T> = Result<T, ExecutionError>;

impl ExecutionError {
    /// 메시지 카탈로그 키.
    pub fn message_key(&self) -> &'static str {
        match self {
            ExecutionError::AlreadyExists { .. } => "exchange_exists",
            ExecutionError::Busy { .. } => "exchange_busy",
            ExecutionError::NotFound { .. } => "exchange_not_found",
            ExecutionError::ValidationFailed { .. } => "exchange_connection_failed",
            ExecutionError::InitializationFailed { .. } => "exchange_init_failed",
            ExecutionError::InvalidArgument(_) => "invalid_argument",
            ExecutionError::ExchangeNotFound { .. } => "exchange_not_found",
            ExecutionError::PositionNotFound { .. } => "position_not_found",
            ExecutionError::UpstreamFailure { .. } => "exchange_error",
            ExecutionError::Persistence(_) => "storage_error",
        }
    }

    /// 메시지 템플릿 파라미터.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            ExecutionError::AlreadyExists { name }
            | ExecutionError::Busy { name }
            | ExecutionError::NotFound { name }
            | ExecutionError::ExchangeNotFound { name } => vec![("name", name.clone())],
            ExecutionError::ValidationFailed { kind, reason } => {
                vec![("kind", kind.clone()), ("error", reason.clone())]
            }
            ExecutionError::InitializationFailed { name, reason } => {
                vec![("name", name.clone()), ("error", reason.clone())]
            }
            ExecutionError::InvalidArgument(reason) => vec![("error", reason.clone())],
            ExecutionError::PositionNotFound {
                exchange,
                position_id,
            } => vec![
                ("exchange", exchange.clone()),
                ("position_id", position_id.clone()),
            ],
            ExecutionError::UpstreamFailure { exchange, source } => {
                vec![("exchange", exchange.clone()), ("error", source.to_string())]
            }
            ExecutionError::Persistence(err) => vec![("error", err.to_string())],
        }
    }

    /// 거래소 호출 실패를 감쌉니다.
    pub(crate) fn upstream(exchange: &str, source: ExchangeError) -> Self {
        ExecutionError::UpstreamFailure {
            exchange: exchange.to_string(),
            source,
        }
    }
}
