//! 봇 전송 계층 에러.

use thiserror::Error;

/// 봇 작업용 Result 타입.
pub type BotResult<T> = Result<T, BotError>;

/// 텔레그램 전송/메시지 카탈로그 에러.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("메시지 전송 실패: {0}")]
    SendFailed(String),

    #[error("잘못된 설정: {0}")]
    InvalidConfig(String),

    #[error("요청 한도 초과: {0}초 후 재시도")]
    RateLimited(u64),

    #[error("텔레그램 API 에러: {0}")]
    Api(String),

    #[error("네트워크 에러: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("직렬화 에러: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),
}
