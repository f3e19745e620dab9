//! 포지션 원장.
//!
//! 거래소 이름별 파티션에 오픈 포지션과 트레일링 스탑을 보관합니다.
//! 파티션마다 별도의 락을 가지므로 서로 다른 거래소의 갱신은 서로를 막지 않습니다.
//! I/O는 없습니다.
//!
//! 락 순서는 항상 인덱스 → 파티션입니다. 쓰기 작업은 인덱스 읽기 락을 쥔 채로
//! 파티션을 수정하므로, 인덱스 쓰기 락을 잡은 정리 작업과 겹치지 않습니다.
//! 포지션과 트레일링 스탑이 모두 사라진 파티션은 `remove_position`에서 정리됩니다.
//! 열리지 않은 포지션에 설정된 트레일링 스탑은 같은 ID로 `remove_position`을
//! 호출할 때까지 남습니다.

use hydra_core::{Position, TrailingStop};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{ExecutionError, ExecutionResult};

/// 거래소 하나의 포지션 집합.
#[derive(Debug, Default)]
struct Partition {
    /// 포지션 ID → 포지션
    positions: HashMap<String, Position>,
    /// 포지션 ID → 트레일링 스탑
    trailing_stops: HashMap<String, TrailingStop>,
}

impl Partition {
    fn is_empty(&self) -> bool {
        self.positions.is_empty() && self.trailing_stops.is_empty()
    }
}

/// 거래소별 오픈 포지션 원장.
#[derive(Debug, Default)]
pub struct PositionLedger {
    partitions: RwLock<HashMap<String, Arc<RwLock<Partition>>>>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 파티션을 조회하거나 생성해 수정합니다.
    ///
    /// 수정이 끝날 때까지 인덱스 락을 유지합니다.
    async fn with_partition_mut<R>(&self, exchange: &str, f: impl FnOnce(&mut Partition) -> R) -> R {
        {
            let index = self.partitions.read().await;
            if let Some(partition) = index.get(exchange) {
                let mut partition = partition.write().await;
                return f(&mut partition);
            }
        }

        let mut index = self.partitions.write().await;
        let partition = index.entry(exchange.to_string()).or_default().clone();
        let mut partition = partition.write().await;
        f(&mut partition)
    }

    /// 비어 있는 파티션을 인덱스에서 제거합니다.
    async fn prune(&self, exchange: &str) {
        let mut index = self.partitions.write().await;
        let Some(partition) = index.get(exchange).cloned() else {
            return;
        };
        if partition.read().await.is_empty() {
            index.remove(exchange);
            debug!(exchange = %exchange, "Empty partition pruned");
        }
    }

    /// 기존 파티션만 조회합니다.
    async fn existing_partition(&self, exchange: &str) -> Option<Arc<RwLock<Partition>>> {
        self.partitions.read().await.get(exchange).cloned()
    }

    async fn all_partitions(&self) -> Vec<Arc<RwLock<Partition>>> {
        self.partitions.read().await.values().cloned().collect()
    }

    /// 포지션을 추가합니다. 같은 ID가 있으면 덮어쓰고 이전 값을 반환합니다.
    pub async fn add_position(&self, exchange: &str, position: Position) -> Option<Position> {
        debug!(exchange = %exchange, position_id = %position.id, "Position recorded");
        self.with_partition_mut(exchange, |partition| {
            partition.positions.insert(position.id.clone(), position)
        })
        .await
    }

    /// 포지션과 그 트레일링 스탑을 삭제합니다. 없으면 아무것도 하지 않습니다.
    pub async fn remove_position(&self, exchange: &str, position_id: &str) -> Option<Position> {
        let (removed, now_empty) = {
            let index = self.partitions.read().await;
            let mut partition = index.get(exchange)?.write().await;

            partition.trailing_stops.remove(position_id);
            let removed = partition.positions.remove(position_id);
            (removed, partition.is_empty())
        };

        if removed.is_some() {
            debug!(exchange = %exchange, position_id = %position_id, "Position removed");
        }
        if now_empty {
            self.prune(exchange).await;
        }
        removed
    }

    /// 포지션 하나를 조회합니다.
    pub async fn get_position(&self, exchange: &str, position_id: &str) -> Option<Position> {
        let partition = self.existing_partition(exchange).await?;
        let partition = partition.read().await;
        partition.positions.get(position_id).cloned()
    }

    /// 거래소의 포지션 목록. 이름이 없으면 모든 거래소의 포지션.
    ///
    /// 진입 시각 순으로 정렬됩니다.
    pub async fn get_positions(&self, exchange: Option<&str>) -> Vec<Position> {
        let partitions = match exchange {
            Some(name) => self.existing_partition(name).await.into_iter().collect(),
            None => self.all_partitions().await,
        };

        let mut positions = Vec::new();
        for partition in partitions {
            positions.extend(partition.read().await.positions.values().cloned());
        }
        positions.sort_by(|a, b| {
            a.opened_at
                .cmp(&b.opened_at)
                .then_with(|| a.exchange.cmp(&b.exchange))
                .then_with(|| a.id.cmp(&b.id))
        });
        positions
    }

    /// 오픈 포지션 수.
    pub async fn position_count(&self, exchange: Option<&str>) -> usize {
        let partitions = match exchange {
            Some(name) => self.existing_partition(name).await.into_iter().collect(),
            None => self.all_partitions().await,
        };

        let mut count = 0;
        for partition in partitions {
            count += partition.read().await.positions.len();
        }
        count
    }

    /// 트레일링 스탑을 설정합니다.
    ///
    /// 포지션 존재 여부는 확인하지 않습니다. `percent <= 0`이면 실패합니다.
    pub async fn set_trailing_stop(
        &self,
        exchange: &str,
        position_id: &str,
        percent: Decimal,
    ) -> ExecutionResult<TrailingStop> {
        if percent <= Decimal::ZERO {
            return Err(ExecutionError::InvalidArgument(format!(
                "trailing percent must be positive, got {}",
                percent
            )));
        }

        let stop = TrailingStop::new(exchange, position_id, percent);
        self.with_partition_mut(exchange, |partition| {
            partition
                .trailing_stops
                .insert(position_id.to_string(), stop.clone())
        })
        .await;

        debug!(exchange = %exchange, position_id = %position_id, percent = %percent, "Trailing stop set");
        Ok(stop)
    }

    /// 트레일링 스탑 조회.
    pub async fn get_trailing_stop(&self, exchange: &str, position_id: &str) -> Option<TrailingStop> {
        let partition = self.existing_partition(exchange).await?;
        let partition = partition.read().await;
        partition.trailing_stops.get(position_id).cloned()
    }

    /// 트레일링 스탑 목록. 이름이 없으면 모든 거래소.
    pub async fn trailing_stops(&self, exchange: Option<&str>) -> Vec<TrailingStop> {
        let partitions = match exchange {
            Some(name) => self.existing_partition(name).await.into_iter().collect(),
            None => self.all_partitions().await,
        };

        let mut stops = Vec::new();
        for partition in partitions {
            stops.extend(partition.read().await.trailing_stops.values().cloned());
        }
        stops.sort_by(|a, b| (&a.exchange, &a.position_id).cmp(&(&b.exchange, &b.position_id)));
        stops
    }

    #[cfg(test)]
    async fn partition_count(&self) -> usize {
        self.partitions.read().await.len()
    }

    /// 심볼이 같은 포지션의 현재가를 갱신하고 갱신된 수를 반환합니다.
    pub async fn update_price(&self, exchange: &str, symbol: &str, price: Decimal) -> usize {
        let index = self.partitions.read().await;
        let Some(partition) = index.get(exchange) else {
            return 0;
        };
        let mut partition = partition.write().await;

        let mut updated = 0;
        for position in partition
            .positions
            .values_mut()
            .filter(|p| p.symbol.eq_ignore_ascii_case(symbol))
        {
            position.update_price(price);
            updated += 1;
        }
        updated
    }
}
