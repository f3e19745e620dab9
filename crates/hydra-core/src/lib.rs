//! # Hydra Core
//!
//! 채팅 기반 멀티 거래소 트레이딩 봇의 핵심 타입을 제공합니다.
//!
//! - 주문 요청/결과 타입
//! - 포지션 및 트레일링 스탑
//! - 거래소 자격증명 레코드
//! - 설정 관리
//! - 로깅 인프라
//! - 자격증명 암호화

pub mod config;
pub mod crypto;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::*;
pub use crypto::{generate_master_key, CredentialEncryptor, CryptoError};
pub use domain::*;
pub use error::*;
pub use logging::*;
