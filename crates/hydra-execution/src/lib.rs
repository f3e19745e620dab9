//! 거래소 연결 관리와 주문 실행.
//!
//! 이 crate는 다음을 제공합니다:
//! - 거래소 연결 레지스트리 (등록 전 자격증명 검증, 레코드 영속화)
//! - 거래소별 오픈 포지션 및 트레일링 스탑 원장
//! - 주문 제출과 원장 갱신을 묶는 거래 코디네이터
//! - 자격증명 저장소 (JSON 파일, 메모리)
//!
//! # 예제
//!
//! ```rust,ignore
//! use hydra_execution::{ExchangeRegistry, JsonFileStore, PositionLedger, TradeCoordinator};
//!
//! let store = Arc::new(JsonFileStore::new("config/exchange_configs.json"));
//! let registry = Arc::new(ExchangeRegistry::new(AdapterFactory::with_defaults(false), store));
//! registry.load().await?;
//!
//! let coordinator = TradeCoordinator::new(registry, Arc::new(PositionLedger::new()));
//! coordinator.open_position("binance_main", "BTC/USDT", Side::Buy, dec!(0.01), None).await?;
//! ```

pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod registry;
pub mod store;

// 주요 타입 재내보내기
pub use coordinator::{ClosedPosition, TradeCoordinator};
pub use error::{ExecutionError, ExecutionResult};
pub use ledger::PositionLedger;
pub use registry::{ExchangeRegistry, LoadReport, DEFAULT_CALL_TIMEOUT};
pub use store::{
    CredentialMap, CredentialStore, JsonFileStore, MemoryCredentialStore, StoreError, StoreResult,
};
