//! # Hydra Exchange
//!
//! 거래소 어댑터 모음.
//!
//! - `ExchangeAdapter` - 잔고 조회, 주문 제출, 리소스 해제
//! - `BinanceClient` - Binance Spot REST
//! - `PaperExchange` - 프로세스 내부 모의투자
//! - `AdapterFactory` - 거래소 종류 문자열로 어댑터 생성

pub mod connector;
pub mod error;
pub mod factory;
pub mod simulated;
pub mod traits;

pub use connector::{BinanceClient, BinanceConfig};
pub use error::ExchangeError;
pub use factory::{AdapterConstructor, AdapterFactory};
pub use simulated::{PaperConfig, PaperExchange};
pub use traits::*;
