//! 도메인 모델.

pub mod credential;
pub mod order;
pub mod position;

pub use credential::*;
pub use order::*;
pub use position::*;
