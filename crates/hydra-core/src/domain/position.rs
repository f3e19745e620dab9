//! 포지션 및 트레일링 스탑.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{PlacedOrder, Side};

/// 거래소에서 체결된 주문으로 열린 포지션.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// 거래소가 부여한 주문 ID (거래소 내에서 유일)
    pub id: String,
    /// 거래소 이름 (레지스트리 키)
    pub exchange: String,
    pub symbol: String,
    /// 포지션 방향 (롱 = Buy, 숏 = Sell)
    pub side: Side,
    pub amount: Decimal,
    /// 진입가 (미체결 시장가 주문이면 None)
    pub entry_price: Option<Decimal>,
    /// 현재가 (외부에서 갱신)
    pub current_price: Option<Decimal>,
    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// 접수된 주문에서 포지션을 생성합니다.
    pub fn from_order(exchange: impl Into<String>, order: &PlacedOrder) -> Self {
        let entry_price = order.entry_price();
        Self {
            id: order.id.clone(),
            exchange: exchange.into(),
            symbol: order.symbol.clone(),
            side: order.side,
            amount: order.amount,
            entry_price,
            current_price: entry_price,
            opened_at: order.timestamp,
            updated_at: order.timestamp,
        }
    }

    /// 현재가를 갱신합니다.
    pub fn update_price(&mut self, price: Decimal) {
        self.current_price = Some(price);
        self.updated_at = Utc::now();
    }

    /// 미실현 손익. 진입가 또는 현재가가 없으면 None.
    pub fn unrealized_pnl(&self) -> Option<Decimal> {
        let entry = self.entry_price?;
        let current = self.current_price?;
        let diff = match self.side {
            Side::Buy => current - entry,
            Side::Sell => entry - current,
        };
        Some(diff * self.amount)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} {} {}",
            self.id, self.exchange, self.side, self.amount, self.symbol
        )?;
        match self.entry_price {
            Some(price) => write!(f, " @ {}", price),
            None => write!(f, " @ market"),
        }
    }
}

/// 트레일링 스탑 설정.
///
/// 현재가와 발동가 사이를 `percent` 만큼 유지합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailingStop {
    pub exchange: String,
    pub position_id: String,
    /// 트레일링 비율 (%, 0보다 커야 함)
    pub percent: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl TrailingStop {
    pub fn new(exchange: impl Into<String>, position_id: impl Into<String>, percent: Decimal) -> Self {
        Self {
            exchange: exchange.into(),
            position_id: position_id.into(),
            percent,
            updated_at: Utc::now(),
        }
    }

    /// 기준가에서 발동가를 계산합니다.
    ///
    /// - 롱: 기준가 × (1 - p/100)
    /// - 숏: 기준가 × (1 + p/100)
    pub fn trigger_price(&self, reference: Decimal, side: Side) -> Decimal {
        let ratio = self.percent / Decimal::ONE_HUNDRED;
        match side {
            Side::Buy => reference * (Decimal::ONE - ratio),
            Side::Sell => reference * (Decimal::ONE + ratio),
        }
    }

    /// 현재가 기준으로 스탑이 발동되었는지 확인합니다.
    pub fn is_triggered(&self, reference: Decimal, current: Decimal, side: Side) -> bool {
        let trigger = self.trigger_price(reference, side);
        match side {
            Side::Buy => current <= trigger,
            Side::Sell => current >= trigger,
        }
    }
}
