//! 모의투자(paper) 거래소.
//!
//! 네트워크 없이 프로세스 내부에서 주문을 체결합니다:
//! - 자격증명은 비어 있지만 않으면 모두 허용
//! - 시장가 주문은 설정된 가격이 있으면 즉시 체결, 없으면 미체결로 접수
//! - 지정가 주문은 지정가로 대기 상태 접수
//!
//! # 예제
//!
//! ```ignore
//! let record = ExchangeCredentialRecord::new("paper", "any", "any")
//!     .with_option("balances", serde_json::json!({"USDT": 10000}))
//!     .with_option("prices", serde_json::json!({"BTC/USDT": 50000}));
//! let exchange = PaperExchange::from_record(&record)?;
//! ```

mod exchange;

pub use exchange::{PaperConfig, PaperExchange};
