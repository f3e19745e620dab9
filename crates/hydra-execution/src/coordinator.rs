//! 거래 코디네이터.
//!
//! 레지스트리에서 연결을 찾아 주문을 제출하고 결과에 맞게 원장을 갱신합니다.
//! 거래소 호출이 실패하거나 취소되면 원장은 변경되지 않습니다.

use hydra_core::{OrderRequest, PlacedOrder, Position, Side, TrailingStop};
use hydra_exchange::{AccountBalance, ExchangeAdapter};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ExecutionError, ExecutionResult};
use crate::ledger::PositionLedger;
use crate::registry::{bounded, ExchangeRegistry};

/// 청산 결과.
#[derive(Debug, Clone)]
pub struct ClosedPosition {
    /// 거래소가 반환한 청산 주문
    pub order: PlacedOrder,
    /// 원장에서 삭제된 포지션 (일치하는 ID가 없으면 `None`)
    pub removed: Option<Position>,
}

/// 거래 코디네이터.
#[derive(Debug, Clone)]
pub struct TradeCoordinator {
    registry: Arc<ExchangeRegistry>,
    ledger: Arc<PositionLedger>,
}

impl TradeCoordinator {
    pub fn new(registry: Arc<ExchangeRegistry>, ledger: Arc<PositionLedger>) -> Self {
        Self { registry, ledger }
    }

    pub fn registry(&self) -> &Arc<ExchangeRegistry> {
        &self.registry
    }

    pub fn ledger(&self) -> &Arc<PositionLedger> {
        &self.ledger
    }

    async fn connection(&self, exchange: &str) -> ExecutionResult<Arc<dyn ExchangeAdapter>> {
        self.registry.get_connection(exchange).await.map_err(|e| match e {
            ExecutionError::NotFound { name } => ExecutionError::ExchangeNotFound { name },
            other => other,
        })
    }

    /// 주문 요청을 만들고 거래소에 제출합니다.
    ///
    /// `price`가 있으면 지정가, 없으면 시장가 주문입니다.
    async fn submit(
        &self,
        exchange: &str,
        symbol: &str,
        side: Side,
        amount: Decimal,
        price: Option<Decimal>,
    ) -> ExecutionResult<PlacedOrder> {
        let adapter = self.connection(exchange).await?;

        let request = OrderRequest::new(symbol, side, amount, price)
            .with_client_order_id(Uuid::new_v4().simple().to_string());
        request
            .validate()
            .map_err(|e| ExecutionError::InvalidArgument(e.to_string()))?;

        info!(
            exchange = %exchange,
            symbol = %request.symbol,
            side = %request.side,
            amount = %request.amount,
            price = ?request.price,
            "Submitting order"
        );

        let order = bounded(
            self.registry.call_timeout(),
            "create_order",
            adapter.create_order(&request),
        )
        .await
        .map_err(|e| {
            warn!(exchange = %exchange, symbol = %symbol, error = %e, "Order failed");
            ExecutionError::upstream(exchange, e)
        })?;

        info!(
            exchange = %exchange,
            order_id = %order.id,
            status = ?order.status,
            "Order accepted"
        );
        Ok(order)
    }

    /// 포지션을 엽니다. 성공하면 거래소가 부여한 ID로 원장에 기록합니다.
    pub async fn open_position(
        &self,
        exchange: &str,
        symbol: &str,
        side: Side,
        amount: Decimal,
        price: Option<Decimal>,
    ) -> ExecutionResult<PlacedOrder> {
        let order = self.submit(exchange, symbol, side, amount, price).await?;
        self.ledger
            .add_position(exchange, Position::from_order(exchange, &order))
            .await;
        Ok(order)
    }

    /// 청산 주문을 제출하고 반환된 주문 ID의 포지션을 원장에서 삭제합니다.
    ///
    /// 청산 주문 ID가 원래 포지션 ID와 같다고 가정합니다. 거래소에 따라 다를 수
    /// 있으므로 정확한 청산이 필요하면 `close_position_by_id`를 사용하세요.
    pub async fn close_position(
        &self,
        exchange: &str,
        symbol: &str,
        side: Side,
        amount: Decimal,
        price: Option<Decimal>,
    ) -> ExecutionResult<ClosedPosition> {
        let order = self.submit(exchange, symbol, side, amount, price).await?;
        let removed = self.ledger.remove_position(exchange, &order.id).await;
        if removed.is_none() {
            warn!(
                exchange = %exchange,
                order_id = %order.id,
                "Closing order id does not match any open position"
            );
        }
        Ok(ClosedPosition { order, removed })
    }

    /// 원장의 포지션을 반대 방향 주문으로 청산합니다.
    pub async fn close_position_by_id(
        &self,
        exchange: &str,
        position_id: &str,
        price: Option<Decimal>,
    ) -> ExecutionResult<ClosedPosition> {
        let position = self
            .ledger
            .get_position(exchange, position_id)
            .await
            .ok_or_else(|| ExecutionError::PositionNotFound {
                exchange: exchange.to_string(),
                position_id: position_id.to_string(),
            })?;

        let order = self
            .submit(
                exchange,
                &position.symbol,
                position.side.opposite(),
                position.amount,
                price,
            )
            .await?;
        let removed = self.ledger.remove_position(exchange, position_id).await;

        Ok(ClosedPosition { order, removed })
    }

    /// 오픈 포지션 목록.
    pub async fn get_open_positions(&self, exchange: Option<&str>) -> Vec<Position> {
        self.ledger.get_positions(exchange).await
    }

    /// 트레일링 스탑 설정.
    pub async fn set_trailing_stop(
        &self,
        exchange: &str,
        position_id: &str,
        percent: Decimal,
    ) -> ExecutionResult<TrailingStop> {
        self.ledger.set_trailing_stop(exchange, position_id, percent).await
    }

    /// 거래소 잔고 조회.
    pub async fn fetch_balance(&self, exchange: &str) -> ExecutionResult<AccountBalance> {
        self.registry.fetch_balance(exchange).await
    }
}
