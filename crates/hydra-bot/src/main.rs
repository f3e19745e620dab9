//! Hydra 트레이딩 봇.
//!
//! # 사용 예시
//!
//! ```bash
//! # 봇 실행
//! hydra run --config config/default.toml
//!
//! # 자격증명 암호화 키 생성
//! hydra gen-key
//!
//! # 거래소 자격증명 확인 (등록하지 않음)
//! hydra check binance <API_KEY> <SECRET> --testnet
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use hydra_bot::{
    ActivityClock, CommandFacade, Heartbeat, MessageCatalog, TelegramBotHandler, TelegramClient,
    TelegramConfig,
};
use hydra_core::{
    generate_master_key, init_logging, AppConfig, CredentialEncryptor, ExchangeCredentialRecord,
    LogConfig,
};
use hydra_exchange::AdapterFactory;
use hydra_execution::{
    ExchangeRegistry, JsonFileStore, MemoryCredentialStore, PositionLedger, TradeCoordinator,
};

#[derive(Parser)]
#[command(name = "hydra")]
#[command(about = "Chat-driven multi-exchange trading bot", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 텔레그램 봇 실행
    Run {
        /// 설정 파일
        #[arg(short, long, default_value = "config/default.toml")]
        config: String,
    },

    /// 새 자격증명 암호화 키 출력 (HYDRA_MASTER_KEY)
    GenKey,

    /// 거래소 자격증명을 잔고 조회로 확인
    Check {
        /// 거래소 종류 (binance, paper)
        kind: String,

        /// API 키
        api_key: String,

        /// API 시크릿
        secret: String,

        /// 테스트넷 사용
        #[arg(long, default_value = "false")]
        testnet: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => run(&config).await,
        Commands::GenKey => {
            println!("{}", generate_master_key());
            Ok(())
        }
        Commands::Check {
            kind,
            api_key,
            secret,
            testnet,
        } => check(kind, api_key, secret, testnet).await,
    }
}

async fn run(config_path: &str) -> anyhow::Result<()> {
    let config = AppConfig::load(config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path))?;

    let _log_guard = init_logging(LogConfig::from_settings(&config.logging))
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Hydra");

    // 자격증명 저장소
    let mut store = JsonFileStore::new(config.settings.exchange_configs_path());
    match CredentialEncryptor::from_env()? {
        Some(encryptor) => {
            info!("Credential encryption enabled");
            store = store.with_encryptor(encryptor);
        }
        None => warn!("HYDRA_MASTER_KEY not set, exchange secrets are stored in plain text"),
    }

    // 레지스트리/원장/코디네이터
    let registry = Arc::new(
        ExchangeRegistry::new(
            AdapterFactory::with_defaults(config.exchange.default_testnet),
            Arc::new(store),
        )
        .with_call_timeout(config.exchange.call_timeout()),
    );
    match registry.load().await {
        Ok(report) => {
            for (name, reason) in &report.skipped {
                warn!(exchange = %name, reason = %reason, "Exchange not loaded");
            }
        }
        Err(e) => error!(error = %e, "Failed to read exchange configurations, starting with none"),
    }
    let coordinator = Arc::new(TradeCoordinator::new(
        registry.clone(),
        Arc::new(PositionLedger::new()),
    ));

    // 텔레그램
    let catalog = Arc::new(MessageCatalog::load(
        config.settings.messages_path(),
        &config.settings.default_language,
    ));
    let client = TelegramClient::new(TelegramConfig::from_settings(&config.telegram)?);
    let activity = ActivityClock::new();

    let heartbeat = Arc::new(
        Heartbeat::new(
            Arc::new(client.clone()),
            catalog.clone(),
            config.telegram.allowed_users.clone(),
        )
        .with_settings(&config.heartbeat)
        .with_activity_clock(activity.clone()),
    );
    let bot = TelegramBotHandler::new(
        client,
        Arc::new(CommandFacade::new(coordinator, catalog)),
    )
    .with_activity_clock(activity);

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Shutdown signal received");
                    shutdown.cancel();
                }
                Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
            }
        }
    });

    let heartbeat_task = if config.heartbeat.enabled {
        heartbeat.send_startup().await;
        let heartbeat = heartbeat.clone();
        let token = shutdown.child_token();
        Some(tokio::spawn(async move { heartbeat.run(token).await }))
    } else {
        None
    };

    bot.start_polling(shutdown.clone()).await;

    // 종료 처리
    if let Some(task) = heartbeat_task {
        if let Err(e) = task.await {
            error!(error = %e, "Heartbeat task failed");
        }
        heartbeat.send_shutdown().await;
    }
    registry.shutdown().await;

    info!("Hydra stopped");
    Ok(())
}

async fn check(kind: String, api_key: String, secret: String, testnet: bool) -> anyhow::Result<()> {
    let _log_guard = init_logging(LogConfig::new("warn"))
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    let registry = ExchangeRegistry::new(
        AdapterFactory::with_defaults(testnet),
        Arc::new(MemoryCredentialStore::new()),
    );
    let record = ExchangeCredentialRecord::new(kind, api_key, secret);

    match registry.test_connection(&record).await {
        Ok(balance) => {
            println!("✅ {} credentials are valid", record.summary());
            for asset in &balance.balances {
                println!("  {}", asset);
            }
            Ok(())
        }
        Err(e) => {
            println!("❌ {}", e);
            Err(e.into())
        }
    }
}
