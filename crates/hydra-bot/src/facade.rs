//! 명령어 → 코디네이터/레지스트리 호출.
//!
//! 인자 파싱과 사용자 인증은 호출 전에 끝나 있습니다. 이 모듈은 실행 결과와
//! 에러를 메시지 카탈로그로 사용자 문장으로 바꿉니다.

use async_trait::async_trait;
use hydra_core::{ExchangeCredentialRecord, PlacedOrder, Side};
use hydra_execution::{ExecutionError, TradeCoordinator};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

use crate::bot_handler::{BotCommand, BotCommandHandler, CommandResponse};
use crate::error::BotResult;
use crate::messages::MessageCatalog;

/// 명령어 파사드.
pub struct CommandFacade {
    coordinator: Arc<TradeCoordinator>,
    catalog: Arc<MessageCatalog>,
}

impl CommandFacade {
    pub fn new(coordinator: Arc<TradeCoordinator>, catalog: Arc<MessageCatalog>) -> Self {
        Self {
            coordinator,
            catalog,
        }
    }

    fn reply(&self, key: &str, params: &[(&str, String)]) -> CommandResponse {
        CommandResponse::text(self.catalog.render(key, params))
    }

    /// 실행 에러를 메시지 키와 파라미터로 렌더링합니다.
    fn error_reply(&self, command: &str, err: &ExecutionError) -> CommandResponse {
        warn!(command, error = %err, "Command failed");
        self.reply(err.message_key(), &err.params())
    }

    fn price_text(&self, price: Option<Decimal>) -> String {
        price
            .map(|p| p.normalize().to_string())
            .unwrap_or_else(|| self.catalog.text("market_price"))
    }

    fn order_params(
        &self,
        exchange: &str,
        order: &PlacedOrder,
        price: Option<Decimal>,
    ) -> Vec<(&'static str, String)> {
        vec![
            ("exchange", exchange.to_string()),
            ("symbol", order.symbol.clone()),
            ("side", order.side.to_string()),
            ("amount", order.amount.normalize().to_string()),
            ("price", self.price_text(price.or(order.entry_price()))),
            ("order_id", order.id.clone()),
        ]
    }

    async fn order(
        &self,
        side: Side,
        exchange: &str,
        symbol: &str,
        amount: Decimal,
        price: Option<Decimal>,
    ) -> CommandResponse {
        match side {
            Side::Buy => match self
                .coordinator
                .open_position(exchange, symbol, side, amount, price)
                .await
            {
                Ok(order) => self.reply("position_opened", &self.order_params(exchange, &order, price)),
                Err(e) => self.error_reply("buy", &e),
            },
            Side::Sell => match self
                .coordinator
                .close_position(exchange, symbol, side, amount, price)
                .await
            {
                Ok(closed) => {
                    self.reply("position_closed", &self.order_params(exchange, &closed.order, price))
                }
                Err(e) => self.error_reply("sell", &e),
            },
        }
    }

    async fn close(&self, exchange: &str, position_id: &str, price: Option<Decimal>) -> CommandResponse {
        match self
            .coordinator
            .close_position_by_id(exchange, position_id, price)
            .await
        {
            Ok(closed) => self.reply("position_closed", &self.order_params(exchange, &closed.order, price)),
            Err(e) => self.error_reply("close", &e),
        }
    }

    async fn positions(&self, exchange: Option<&str>) -> CommandResponse {
        let positions = self.coordinator.get_open_positions(exchange).await;
        let scope = exchange
            .map(str::to_string)
            .unwrap_or_else(|| self.catalog.text("all_exchanges"));

        if positions.is_empty() {
            return self.reply("no_positions", &[("exchange", scope)]);
        }

        let lines: Vec<String> = positions.iter().map(|p| p.to_string()).collect();
        self.reply(
            "positions",
            &[("exchange", scope), ("positions", lines.join("\n"))],
        )
    }

    async fn balance(&self, exchange: &str) -> CommandResponse {
        match self.coordinator.fetch_balance(exchange).await {
            Ok(balance) if balance.is_empty() => {
                self.reply("balance_empty", &[("exchange", exchange.to_string())])
            }
            Ok(balance) => {
                let lines: Vec<String> = balance.balances.iter().map(|b| b.to_string()).collect();
                self.reply(
                    "balance",
                    &[
                        ("exchange", exchange.to_string()),
                        ("balances", lines.join("\n")),
                    ],
                )
            }
            Err(e) => self.error_reply("balance", &e),
        }
    }

    async fn trailing(&self, exchange: &str, position_id: &str, percent: Decimal) -> CommandResponse {
        match self
            .coordinator
            .set_trailing_stop(exchange, position_id, percent)
            .await
        {
            Ok(stop) => self.reply(
                "trailing_set",
                &[
                    ("exchange", stop.exchange),
                    ("position_id", stop.position_id),
                    ("percent", stop.percent.normalize().to_string()),
                ],
            ),
            Err(e) => self.error_reply("trailing", &e),
        }
    }

    async fn add_exchange(&self, name: &str, kind: &str, api_key: &str, secret: &str) -> CommandResponse {
        let record = ExchangeCredentialRecord::new(kind, api_key, secret);
        match self.coordinator.registry().add_exchange(name, record).await {
            Ok(summary) => {
                info!(exchange = %name, kind = %summary.kind, "Exchange added via chat");
                self.reply(
                    "exchange_added",
                    &[("name", name.to_string()), ("kind", summary.kind)],
                )
            }
            Err(e) => self.error_reply("add_exchange", &e),
        }
    }

    async fn remove_exchange(&self, name: &str) -> CommandResponse {
        match self.coordinator.registry().remove_exchange(name).await {
            Ok(()) => self.reply("exchange_removed", &[("name", name.to_string())]),
            Err(e) => self.error_reply("remove_exchange", &e),
        }
    }

    async fn list_exchanges(&self) -> CommandResponse {
        let exchanges = self.coordinator.registry().list_exchanges().await;
        if exchanges.is_empty() {
            return self.reply("no_exchanges", &[]);
        }

        let mut text = self.catalog.text("available_exchanges");
        for (name, summary) in &exchanges {
            text.push_str(&format!("\n- {}: {}", name, summary));
        }
        CommandResponse::text(text)
    }
}

#[async_trait]
impl BotCommandHandler for CommandFacade {
    async fn handle(&self, command: BotCommand) -> BotResult<CommandResponse> {
        let response = match command {
            BotCommand::Start => self.reply("welcome", &[]),
            BotCommand::Help => self.reply("help_text", &[]),
            BotCommand::Order {
                side,
                exchange,
                symbol,
                amount,
                price,
            } => self.order(side, &exchange, &symbol, amount, price).await,
            BotCommand::Close {
                exchange,
                position_id,
                price,
            } => self.close(&exchange, &position_id, price).await,
            BotCommand::Positions { exchange } => self.positions(exchange.as_deref()).await,
            BotCommand::Balance { exchange } => self.balance(&exchange).await,
            BotCommand::Trailing {
                exchange,
                position_id,
                percent,
            } => self.trailing(&exchange, &position_id, percent).await,
            BotCommand::AddExchange {
                name,
                kind,
                api_key,
                secret,
            } => self.add_exchange(&name, &kind, &api_key, &secret).await,
            BotCommand::RemoveExchange { name } => self.remove_exchange(&name).await,
            BotCommand::ListExchanges => self.list_exchanges().await,
            BotCommand::Ping => self.reply("ping_response", &[]),
            BotCommand::Usage(key) => self.reply(key, &[]),
            BotCommand::Unknown(_) => self.reply("invalid_command", &[]),
        };
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydra_exchange::{AdapterFactory, ExchangeAdapter, PaperConfig, PaperExchange};
    use hydra_execution::{ExchangeRegistry, MemoryCredentialStore, PositionLedger};
    use rust_decimal_macros::dec;

    const MESSAGES: &str = r#"{"en": {
        "welcome": "welcome",
        "startup_notification": "up",
        "heartbeat": "alive",
        "market_price": "market",
        "all_exchanges": "all",
        "position_opened": "opened {side} {amount} {symbol} on {exchange} @ {price} id={order_id}",
        "position_closed": "closed {side} {amount} {symbol} on {exchange} id={order_id}",
        "positions": "{exchange}:\n{positions}",
        "no_positions": "no positions on {exchange}",
        "exchange_added": "added {name} ({kind})",
        "exchange_removed": "removed {name}",
        "exchange_exists": "exists {name}",
        "exchange_not_found": "not found {name}",
        "exchange_connection_failed": "connection failed: {error}",
        "invalid_argument": "invalid: {error}",
        "position_not_found": "no position {position_id} on {exchange}",
        "no_exchanges": "none",
        "available_exchanges": "exchanges:",
        "trailing_set": "trailing {percent}% on {position_id}",
        "buy_usage": "usage: /buy"
    }}"#;

    async fn facade() -> CommandFacade {
        let factory = AdapterFactory::new().with_adapter("paper", |_| {
            Ok(Arc::new(PaperExchange::new(
                PaperConfig::default().with_price("BTC/USDT", dec!(100)),
            )) as Arc<dyn ExchangeAdapter>)
        });
        let registry = Arc::new(ExchangeRegistry::new(
            factory,
            Arc::new(MemoryCredentialStore::new()),
        ));
        let coordinator = Arc::new(TradeCoordinator::new(registry, Arc::new(PositionLedger::new())));
        let catalog = Arc::new(MessageCatalog::from_json_str(MESSAGES, "en").unwrap());
        CommandFacade::new(coordinator, catalog)
    }

    async fn run(facade: &CommandFacade, text: &str) -> String {
        facade.handle(BotCommand::parse(text)).await.unwrap().text
    }

    #[tokio::test]
    async fn test_exchange_lifecycle() {
        let facade = facade().await;

        assert_eq!(run(&facade, "/list_exchanges").await, "none");
        assert_eq!(
            run(&facade, "/add_exchange sim paper key1234567890 secret").await,
            "added sim (paper)"
        );
        assert_eq!(
            run(&facade, "/add_exchange sim paper key secret").await,
            "exists sim"
        );
        assert_eq!(
            run(&facade, "/add_exchange bad kraken key secret").await,
            "connection failed: Unsupported exchange kind: kraken"
        );
        assert_eq!(
            run(&facade, "/list_exchanges").await,
            "exchanges:\n- sim: paper (key1...7890)"
        );
        assert_eq!(run(&facade, "/remove_exchange sim").await, "removed sim");
        assert_eq!(run(&facade, "/remove_exchange sim").await, "not found sim");
    }

    #[tokio::test]
    async fn test_trading_commands() {
        let facade = facade().await;
        run(&facade, "/add_exchange sim paper key secret").await;

        assert_eq!(
            run(&facade, "/buy sim BTC/USDT 2").await,
            "opened buy 2 BTC/USDT on sim @ 100 id=paper-1"
        );
        let positions = run(&facade, "/positions sim").await;
        assert!(positions.starts_with("sim:\n[paper-1]"));

        assert_eq!(
            run(&facade, "/trailing sim paper-1 1.50").await,
            "trailing 1.5% on paper-1"
        );
        assert!(run(&facade, "/trailing sim paper-1 0").await.starts_with("invalid: "));

        assert_eq!(
            run(&facade, "/close sim paper-1").await,
            "closed sell 2 BTC/USDT on sim id=paper-2"
        );
        assert_eq!(run(&facade, "/positions").await, "no positions on all");
        assert_eq!(
            run(&facade, "/close sim paper-1").await,
            "no position paper-1 on sim"
        );
    }

    #[tokio::test]
    async fn test_errors_and_usage() {
        let facade = facade().await;
        assert_eq!(run(&facade, "/buy nowhere BTC/USDT 1").await, "not found nowhere");
        assert_eq!(run(&facade, "/buy nowhere").await, "usage: /buy");
        assert_eq!(run(&facade, "hello").await, "invalid_command");
        assert_eq!(run(&facade, "/start").await, "welcome");
    }
}
