//! 주문 관련 타입.
//!
//! - `Side` - 매수/매도 방향
//! - `OrderKind` - 시장가/지정가
//! - `OrderRequest` - 거래소에 제출할 주문
//! - `PlacedOrder` - 거래소가 접수한 주문

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// 주문 방향 (매수 또는 매도).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// 매수
    Buy,
    /// 매도
    Sell,
}

impl Side {
    /// 반대 방향을 반환합니다.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// 소문자 표기 (`buy` / `sell`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            other => Err(CoreError::InvalidInput(format!("unknown side: {}", other))),
        }
    }
}

/// 주문 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    /// 시장가 주문
    Market,
    /// 지정가 주문
    Limit,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::Market => write!(f, "market"),
            OrderKind::Limit => write!(f, "limit"),
        }
    }
}

/// 거래소에 제출할 주문 요청.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// 심볼 (예: "BTC/USDT")
    pub symbol: String,
    /// 방향
    pub side: Side,
    /// 주문 유형
    pub kind: OrderKind,
    /// 수량
    pub amount: Decimal,
    /// 지정가 (시장가면 None)
    pub price: Option<Decimal>,
    /// 클라이언트 주문 ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
    /// 어댑터별 추가 파라미터
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl OrderRequest {
    /// 새 주문 요청을 생성합니다.
    ///
    /// 가격이 주어지면 지정가, 없으면 시장가 주문이 됩니다.
    pub fn new(symbol: impl Into<String>, side: Side, amount: Decimal, price: Option<Decimal>) -> Self {
        let kind = if price.is_some() {
            OrderKind::Limit
        } else {
            OrderKind::Market
        };

        Self {
            symbol: symbol.into(),
            side,
            kind,
            amount,
            price,
            client_order_id: None,
            params: BTreeMap::new(),
        }
    }

    /// 클라이언트 주문 ID를 설정합니다.
    pub fn with_client_order_id(mut self, id: impl Into<String>) -> Self {
        self.client_order_id = Some(id.into());
        self
    }

    /// 추가 파라미터를 설정합니다.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// 주문 요청을 검증합니다.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.symbol.trim().is_empty() {
            return Err(CoreError::InvalidInput("symbol must not be empty".to_string()));
        }
        if self.amount <= Decimal::ZERO {
            return Err(CoreError::InvalidInput(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }
        if let Some(price) = self.price {
            if price <= Decimal::ZERO {
                return Err(CoreError::InvalidInput(format!(
                    "price must be positive, got {}",
                    price
                )));
            }
        }
        Ok(())
    }
}

/// 접수된 주문의 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    Expired,
}

impl OrderState {
    /// 체결이 (일부라도) 이루어졌는지 확인합니다.
    pub fn has_fill(&self) -> bool {
        matches!(self, OrderState::PartiallyFilled | OrderState::Filled)
    }
}

/// 거래소가 접수한 주문.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedOrder {
    /// 거래소가 부여한 주문 ID
    pub id: String,
    /// 클라이언트 주문 ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
    pub symbol: String,
    pub side: Side,
    pub kind: OrderKind,
    /// 주문 수량
    pub amount: Decimal,
    /// 지정가
    pub price: Option<Decimal>,
    /// 평균 체결가 (미체결이면 None)
    pub average_price: Option<Decimal>,
    /// 체결 수량
    pub filled: Decimal,
    pub status: OrderState,
    pub timestamp: DateTime<Utc>,
}

impl PlacedOrder {
    /// 진입가를 반환합니다.
    ///
    /// 평균 체결가가 있으면 그것을, 없으면 지정가를 사용합니다.
    /// 체결되지 않은 시장가 주문은 None입니다.
    pub fn entry_price(&self) -> Option<Decimal> {
        self.average_price.or(self.price)
    }
}
