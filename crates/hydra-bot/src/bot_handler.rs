//! 텔레그램 봇 명령어 처리.
//!
//! 허용된 사용자로부터 명령어를 수신해 파싱하고 핸들러에 전달합니다.
//! - `/buy`, `/sell`, `/close` - 주문
//! - `/positions`, `/balance`, `/trailing` - 조회 및 트레일링 스탑
//! - `/add_exchange`, `/remove_exchange`, `/list_exchanges` - 거래소 관리
//! - `/start`, `/help`, `/ping`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hydra_core::Side;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{BotError, BotResult};
use crate::heartbeat::ActivityClock;
use crate::telegram::{TelegramClient, TelegramUpdate};

/// 봇 명령어 타입.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    /// 환영 메시지
    Start,
    /// 도움말
    Help,
    /// 포지션 진입 (`/buy`) 또는 청산 주문 (`/sell`)
    Order {
        side: Side,
        exchange: String,
        symbol: String,
        amount: Decimal,
        price: Option<Decimal>,
    },
    /// ID로 포지션 청산
    Close {
        exchange: String,
        position_id: String,
        price: Option<Decimal>,
    },
    /// 오픈 포지션 조회
    Positions { exchange: Option<String> },
    /// 잔고 조회
    Balance { exchange: String },
    /// 트레일링 스탑 설정
    Trailing {
        exchange: String,
        position_id: String,
        percent: Decimal,
    },
    /// 거래소 등록
    AddExchange {
        name: String,
        kind: String,
        api_key: String,
        secret: String,
    },
    /// 거래소 제거
    RemoveExchange { name: String },
    /// 거래소 목록
    ListExchanges,
    /// 생존 확인
    Ping,
    /// 인자가 잘못된 명령어 (사용법 메시지 키)
    Usage(&'static str),
    /// 알 수 없는 명령어 또는 일반 텍스트
    Unknown(String),
}

fn parse_decimal(value: &str) -> Option<Decimal> {
    value.parse::<Decimal>().ok()
}

impl BotCommand {
    /// 텍스트에서 명령어 파싱.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();

        let Some(body) = text.strip_prefix('/') else {
            return BotCommand::Unknown(text.to_string());
        };

        let parts: Vec<&str> = body.split_whitespace().collect();
        // 그룹 채팅의 "/buy@my_bot" 형식
        let command = parts
            .first()
            .map(|s| s.split('@').next().unwrap_or(s).to_lowercase());
        let args = parts.get(1..).unwrap_or(&[]);

        match command.as_deref() {
            Some("start") => BotCommand::Start,
            Some("help") => BotCommand::Help,
            Some("buy") => Self::parse_order(Side::Buy, args, "buy_usage"),
            Some("sell") => Self::parse_order(Side::Sell, args, "sell_usage"),
            Some("close") => match args {
                [exchange, position_id] => BotCommand::Close {
                    exchange: exchange.to_string(),
                    position_id: position_id.to_string(),
                    price: None,
                },
                [exchange, position_id, price] => match parse_decimal(price) {
                    Some(price) => BotCommand::Close {
                        exchange: exchange.to_string(),
                        position_id: position_id.to_string(),
                        price: Some(price),
                    },
                    None => BotCommand::Usage("close_usage"),
                },
                _ => BotCommand::Usage("close_usage"),
            },
            Some("positions") => BotCommand::Positions {
                exchange: args.first().map(|s| s.to_string()),
            },
            Some("balance") => match args {
                [exchange, ..] => BotCommand::Balance {
                    exchange: exchange.to_string(),
                },
                [] => BotCommand::Usage("specify_exchange"),
            },
            Some("trailing") => match args {
                [exchange, position_id, percent] => match parse_decimal(percent) {
                    Some(percent) => BotCommand::Trailing {
                        exchange: exchange.to_string(),
                        position_id: position_id.to_string(),
                        percent,
                    },
                    None => BotCommand::Usage("trailing_usage"),
                },
                _ => BotCommand::Usage("trailing_usage"),
            },
            Some("add_exchange") => match args {
                [name, kind, api_key, secret] => BotCommand::AddExchange {
                    name: name.to_string(),
                    kind: kind.to_lowercase(),
                    api_key: api_key.to_string(),
                    secret: secret.to_string(),
                },
                _ => BotCommand::Usage("add_exchange_usage"),
            },
            Some("remove_exchange") => match args {
                [name] => BotCommand::RemoveExchange {
                    name: name.to_string(),
                },
                _ => BotCommand::Usage("remove_exchange_usage"),
            },
            Some("list_exchanges") => BotCommand::ListExchanges,
            Some("ping") => BotCommand::Ping,
            _ => BotCommand::Unknown(text.to_string()),
        }
    }

    /// `<exchange> <symbol> <amount> [price]`
    fn parse_order(side: Side, args: &[&str], usage: &'static str) -> Self {
        let (exchange, symbol, amount, price) = match args {
            [exchange, symbol, amount] => (exchange, symbol, amount, None),
            [exchange, symbol, amount, price] => (exchange, symbol, amount, Some(price)),
            _ => return BotCommand::Usage(usage),
        };

        let Some(amount) = parse_decimal(amount) else {
            return BotCommand::Usage(usage);
        };
        let price = match price.map(|p| parse_decimal(p)) {
            Some(None) => return BotCommand::Usage(usage),
            Some(parsed) => parsed,
            None => None,
        };

        BotCommand::Order {
            side,
            exchange: exchange.to_string(),
            symbol: symbol.to_uppercase(),
            amount,
            price,
        }
    }

    /// 로그용 명령어 이름.
    pub fn name(&self) -> &'static str {
        match self {
            BotCommand::Start => "start",
            BotCommand::Help => "help",
            BotCommand::Order { side: Side::Buy, .. } => "buy",
            BotCommand::Order { side: Side::Sell, .. } => "sell",
            BotCommand::Close { .. } => "close",
            BotCommand::Positions { .. } => "positions",
            BotCommand::Balance { .. } => "balance",
            BotCommand::Trailing { .. } => "trailing",
            BotCommand::AddExchange { .. } => "add_exchange",
            BotCommand::RemoveExchange { .. } => "remove_exchange",
            BotCommand::ListExchanges => "list_exchanges",
            BotCommand::Ping => "ping",
            BotCommand::Usage(_) => "usage",
            BotCommand::Unknown(_) => "unknown",
        }
    }
}

/// 명령어 응답 데이터.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    /// 응답 텍스트
    pub text: String,
}

impl CommandResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// 봇 명령어 핸들러 trait.
///
/// 파싱된 명령어를 실행하고 사용자에게 보낼 응답을 만듭니다.
#[async_trait]
pub trait BotCommandHandler: Send + Sync {
    /// 명령어를 처리합니다.
    async fn handle(&self, command: BotCommand) -> BotResult<CommandResponse>;
}

/// 텔레그램 봇 핸들러.
///
/// Long polling으로 업데이트를 수신하고 명령어를 처리합니다.
pub struct TelegramBotHandler<H: BotCommandHandler> {
    client: TelegramClient,
    handler: Arc<H>,
    last_update_id: RwLock<i64>,
    allowed_users: Vec<i64>,
    activity: ActivityClock,
    retry_delay: Duration,
}

impl<H: BotCommandHandler> TelegramBotHandler<H> {
    /// 새 봇 핸들러 생성.
    pub fn new(client: TelegramClient, handler: Arc<H>) -> Self {
        let allowed_users = client.config().allowed_users.clone();
        Self {
            client,
            handler,
            last_update_id: RwLock::new(0),
            allowed_users,
            activity: ActivityClock::new(),
            retry_delay: Duration::from_secs(5),
        }
    }

    /// 활동 시계를 공유합니다 (heartbeat 타이머 초기화용).
    pub fn with_activity_clock(mut self, activity: ActivityClock) -> Self {
        self.activity = activity;
        self
    }

    /// 폴링 실패 후 대기 시간.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// 취소될 때까지 업데이트를 수신합니다.
    pub async fn start_polling(&self, shutdown: CancellationToken) {
        info!(allowed_users = self.allowed_users.len(), "Telegram polling started");

        loop {
            let result = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.poll_once() => result,
            };

            if let Err(e) = result {
                let delay = match e {
                    BotError::RateLimited(secs) => Duration::from_secs(secs),
                    _ => self.retry_delay,
                };
                error!(error = %e, retry_in = ?delay, "Telegram polling failed");

                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        info!("Telegram polling stopped");
    }

    /// 업데이트를 한 번 가져와 처리하고 처리한 업데이트 수를 반환합니다.
    pub async fn poll_once(&self) -> BotResult<usize> {
        let offset = *self.last_update_id.read().await + 1;
        let updates = self.client.get_updates(offset).await?;

        if let Some(last) = updates.last() {
            *self.last_update_id.write().await = last.update_id;
        }

        let count = updates.len();
        for update in updates {
            if let Err(e) = self.process_update(update).await {
                error!(error = %e, "Failed to process update");
            }
        }
        Ok(count)
    }

    /// 개별 업데이트 처리.
    async fn process_update(&self, update: TelegramUpdate) -> BotResult<()> {
        let Some(message) = update.message else {
            return Ok(());
        };
        let chat_id = message.chat.id;

        let Some(user_id) = message.from.as_ref().map(|u| u.id) else {
            return Ok(());
        };
        if !self.allowed_users.contains(&user_id) {
            warn!(user_id, chat_id, "Unauthorized access attempt");
            return Ok(());
        }

        let Some(text) = message.text else {
            return Ok(());
        };

        self.activity.touch();

        let command = BotCommand::parse(&text);
        debug!(user_id, command = command.name(), "Command received");

        let response = self.handler.handle(command).await?;
        self.client.send_message(chat_id, &response.text).await
    }
}
