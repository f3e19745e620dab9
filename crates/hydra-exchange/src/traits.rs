//! 거래소 어댑터 trait 정의.

use async_trait::async_trait;
use hydra_core::{OrderRequest, PlacedOrder};
use rust_decimal::Decimal;
use std::fmt;

use crate::ExchangeError;

/// 거래소 작업을 위한 Result 타입.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// 자산의 잔고 정보.
#[derive(Debug, Clone, PartialEq)]
pub struct Balance {
    /// 자산 이름 (예: "BTC", "USDT")
    pub asset: String,
    /// 사용 가능한 잔고
    pub free: Decimal,
    /// 주문에 묶인 잔고
    pub locked: Decimal,
}

impl Balance {
    pub fn new(asset: impl Into<String>, free: Decimal, locked: Decimal) -> Self {
        Self {
            asset: asset.into(),
            free,
            locked,
        }
    }

    /// 총 잔고 반환 (사용 가능 + 묶인 잔고).
    pub fn total(&self) -> Decimal {
        self.free + self.locked
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} (locked {})", self.asset, self.free, self.locked)
    }
}

/// 계좌 잔고 목록 (0이 아닌 자산만).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountBalance {
    pub balances: Vec<Balance>,
}

impl AccountBalance {
    pub fn new(balances: Vec<Balance>) -> Self {
        Self { balances }
    }

    /// 특정 자산의 잔고 조회.
    pub fn get(&self, asset: &str) -> Option<&Balance> {
        self.balances
            .iter()
            .find(|b| b.asset.eq_ignore_ascii_case(asset))
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}

/// 거래소 어댑터.
///
/// 거래소 종류마다 하나씩 구현하며, 레지스트리는 이 인터페이스만 사용합니다.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// 거래소 종류 (예: "binance").
    fn kind(&self) -> &str;

    /// 계좌 잔고 조회. 자격증명 검증에도 사용됩니다.
    async fn fetch_balance(&self) -> ExchangeResult<AccountBalance>;

    /// 주문 제출.
    async fn create_order(&self, request: &OrderRequest) -> ExchangeResult<PlacedOrder>;

    /// 보유 리소스 해제. 이후 호출은 `ExchangeError::Closed`로 실패할 수 있습니다.
    async fn close(&self) -> ExchangeResult<()>;
}
