//! 모의투자 거래소 구현.

use async_trait::async_trait;
use chrono::Utc;
use hydra_core::{ExchangeCredentialRecord, OrderKind, OrderRequest, OrderState, PlacedOrder, Side};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::traits::{AccountBalance, Balance, ExchangeAdapter, ExchangeResult};
use crate::ExchangeError;

/// 모의투자 거래소 설정.
#[derive(Debug, Clone)]
pub struct PaperConfig {
    /// 자산별 초기 잔고
    pub initial_balances: HashMap<String, Decimal>,
    /// 심볼별 체결 가격
    pub prices: HashMap<String, Decimal>,
    /// 거래 수수료율 (예: 0.1%의 경우 0.001)
    pub fee_rate: Decimal,
}

impl Default for PaperConfig {
    fn default() -> Self {
        let mut initial_balances = HashMap::new();
        initial_balances.insert("USDT".to_string(), Decimal::from(10_000));

        Self {
            initial_balances,
            prices: HashMap::new(),
            fee_rate: Decimal::ZERO,
        }
    }
}

impl PaperConfig {
    /// 자산의 초기 잔고를 설정합니다.
    pub fn with_initial_balance(mut self, asset: &str, amount: Decimal) -> Self {
        self.initial_balances.insert(asset.to_uppercase(), amount);
        self
    }

    /// 심볼의 체결 가격을 설정합니다.
    pub fn with_price(mut self, symbol: &str, price: Decimal) -> Self {
        self.prices.insert(symbol.to_uppercase(), price);
        self
    }

    /// 수수료율을 설정합니다.
    pub fn with_fee_rate(mut self, rate: Decimal) -> Self {
        self.fee_rate = rate;
        self
    }

    /// 레코드 옵션(`balances`, `prices`, `fee_rate`)에서 생성합니다.
    pub fn from_record(record: &ExchangeCredentialRecord) -> ExchangeResult<Self> {
        let mut config = Self::default();

        if let Some(balances) = record.options.get("balances") {
            config.initial_balances = parse_decimal_map(balances, "balances")?
                .into_iter()
                .map(|(k, v)| (k.to_uppercase(), v))
                .collect();
        }
        if let Some(prices) = record.options.get("prices") {
            config.prices = parse_decimal_map(prices, "prices")?
                .into_iter()
                .map(|(k, v)| (k.to_uppercase(), v))
                .collect();
        }
        if let Some(fee) = record.options.get("fee_rate") {
            config.fee_rate = parse_decimal(fee).ok_or_else(|| {
                ExchangeError::InvalidCredentials(format!("invalid fee_rate: {}", fee))
            })?;
        }

        Ok(config)
    }
}

fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn parse_decimal_map(value: &Value, field: &str) -> ExchangeResult<HashMap<String, Decimal>> {
    let object = value
        .as_object()
        .ok_or_else(|| ExchangeError::InvalidCredentials(format!("{} must be an object", field)))?;

    object
        .iter()
        .map(|(key, v)| {
            parse_decimal(v)
                .map(|d| (key.clone(), d))
                .ok_or_else(|| {
                    ExchangeError::InvalidCredentials(format!("invalid {} entry: {}", field, key))
                })
        })
        .collect()
}

/// "BTC/USDT" → ("BTC", "USDT")
fn split_symbol(symbol: &str) -> Option<(String, String)> {
    let (base, quote) = symbol.split_once('/')?;
    Some((base.to_uppercase(), quote.to_uppercase()))
}

/// 모의투자 거래소.
#[derive(Debug)]
pub struct PaperExchange {
    config: PaperConfig,
    balances: RwLock<HashMap<String, Decimal>>,
    next_order_id: AtomicU64,
    closed: AtomicBool,
}

impl PaperExchange {
    pub fn new(config: PaperConfig) -> Self {
        let balances = config.initial_balances.clone();
        Self {
            config,
            balances: RwLock::new(balances),
            next_order_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    /// 자격증명 레코드에서 생성합니다.
    pub fn from_record(record: &ExchangeCredentialRecord) -> ExchangeResult<Self> {
        if record.api_key.trim().is_empty() || record.secret.trim().is_empty() {
            return Err(ExchangeError::InvalidCredentials(
                "apiKey and secret are required".to_string(),
            ));
        }
        Ok(Self::new(PaperConfig::from_record(record)?))
    }

    fn ensure_open(&self) -> ExchangeResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(ExchangeError::Closed)
        } else {
            Ok(())
        }
    }

    fn next_id(&self) -> String {
        format!("paper-{}", self.next_order_id.fetch_add(1, Ordering::SeqCst))
    }

    /// 시장가 체결에 따라 잔고를 갱신합니다.
    async fn settle(&self, request: &OrderRequest, price: Decimal) -> ExchangeResult<()> {
        let Some((base, quote)) = split_symbol(&request.symbol) else {
            return Ok(());
        };

        let notional = request.amount * price;
        let fee = notional * self.config.fee_rate;
        let mut balances = self.balances.write().await;

        match request.side {
            Side::Buy => {
                let cost = notional + fee;
                let available = balances.get(&quote).copied().unwrap_or(Decimal::ZERO);
                if available < cost {
                    return Err(ExchangeError::InsufficientBalance(format!(
                        "{} {} required, {} available",
                        cost, quote, available
                    )));
                }
                *balances.entry(quote).or_insert(Decimal::ZERO) -= cost;
                *balances.entry(base).or_insert(Decimal::ZERO) += request.amount;
            }
            Side::Sell => {
                let available = balances.get(&base).copied().unwrap_or(Decimal::ZERO);
                if available < request.amount {
                    return Err(ExchangeError::InsufficientBalance(format!(
                        "{} {} required, {} available",
                        request.amount, base, available
                    )));
                }
                *balances.entry(base).or_insert(Decimal::ZERO) -= request.amount;
                *balances.entry(quote).or_insert(Decimal::ZERO) += notional - fee;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ExchangeAdapter for PaperExchange {
    fn kind(&self) -> &str {
        "paper"
    }

    async fn fetch_balance(&self) -> ExchangeResult<AccountBalance> {
        self.ensure_open()?;

        let balances = self.balances.read().await;
        let mut list: Vec<Balance> = balances
            .iter()
            .filter(|(_, amount)| **amount > Decimal::ZERO)
            .map(|(asset, amount)| Balance::new(asset.clone(), *amount, Decimal::ZERO))
            .collect();
        list.sort_by(|a, b| a.asset.cmp(&b.asset));

        Ok(AccountBalance::new(list))
    }

    async fn create_order(&self, request: &OrderRequest) -> ExchangeResult<PlacedOrder> {
        self.ensure_open()?;
        request
            .validate()
            .map_err(|e| ExchangeError::OrderRejected(e.to_string()))?;

        let (status, average_price, filled) = match request.kind {
            OrderKind::Limit => (OrderState::Open, None, Decimal::ZERO),
            OrderKind::Market => {
                match self.config.prices.get(&request.symbol.to_uppercase()).copied() {
                    Some(price) => {
                        self.settle(request, price).await?;
                        (OrderState::Filled, Some(price), request.amount)
                    }
                    None => (OrderState::Open, None, Decimal::ZERO),
                }
            }
        };

        let order = PlacedOrder {
            id: self.next_id(),
            client_order_id: request.client_order_id.clone(),
            symbol: request.symbol.clone(),
            side: request.side,
            kind: request.kind,
            amount: request.amount,
            price: request.price,
            average_price,
            filled,
            status,
            timestamp: Utc::now(),
        };

        info!(
            order_id = %order.id,
            symbol = %order.symbol,
            side = %order.side,
            status = ?order.status,
            "Paper order accepted"
        );

        Ok(order)
    }

    async fn close(&self) -> ExchangeResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("Paper exchange closed");
        }
        Ok(())
    }
}
