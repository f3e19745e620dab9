//! 텔레그램 명령어 인터페이스.
//!
//! 이 crate는 다음을 제공합니다:
//! - Telegram Bot API long polling 클라이언트
//! - 명령어 파싱과 실행 ([`CommandFacade`])
//! - 언어별 메시지 카탈로그
//! - 시작/종료 알림과 주기적 생존 신호

pub mod bot_handler;
pub mod error;
pub mod facade;
pub mod heartbeat;
pub mod messages;
pub mod telegram;

// 주요 타입 재내보내기
pub use bot_handler::{BotCommand, BotCommandHandler, CommandResponse, TelegramBotHandler};
pub use error::{BotError, BotResult};
pub use facade::CommandFacade;
pub use heartbeat::{ActivityClock, Heartbeat};
pub use messages::MessageCatalog;
pub use telegram::{ChatSender, TelegramClient, TelegramConfig};
