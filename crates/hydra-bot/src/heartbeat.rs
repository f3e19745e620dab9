//! 시작/종료 알림과 주기적 생존 신호.
//!
//! 마지막 운영자 활동 이후 `interval`이 지나면 허용된 모든 사용자에게
//! `heartbeat` 메시지를 보냅니다. 활동이 있으면 타이머가 초기화됩니다.

use chrono::{DateTime, Local, Utc};
use hydra_core::HeartbeatSettings;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::messages::MessageCatalog;
use crate::telegram::ChatSender;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 마지막 활동 시각.
#[derive(Debug, Clone)]
pub struct ActivityClock {
    inner: Arc<Mutex<(Instant, DateTime<Utc>)>>,
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new((Instant::now(), Utc::now()))),
        }
    }
}

impl ActivityClock {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, (Instant, DateTime<Utc>)> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 활동을 기록합니다.
    pub fn touch(&self) {
        *self.lock() = (Instant::now(), Utc::now());
    }

    /// 마지막 활동 이후 경과 시간.
    pub fn elapsed(&self) -> Duration {
        self.lock().0.elapsed()
    }

    /// 마지막 활동 시각 (UTC).
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.lock().1
    }
}

/// 생존 신호 서비스.
pub struct Heartbeat<S: ChatSender> {
    sender: Arc<S>,
    catalog: Arc<MessageCatalog>,
    recipients: Vec<i64>,
    interval: Duration,
    check_interval: Duration,
    activity: ActivityClock,
    version: String,
}

impl<S: ChatSender> Heartbeat<S> {
    pub fn new(sender: Arc<S>, catalog: Arc<MessageCatalog>, recipients: Vec<i64>) -> Self {
        let settings = HeartbeatSettings::default();
        Self {
            sender,
            catalog,
            recipients,
            interval: Duration::from_secs(settings.interval_secs),
            check_interval: Duration::from_secs(settings.check_interval_secs),
            activity: ActivityClock::new(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 설정의 주기를 적용합니다.
    pub fn with_settings(mut self, settings: &HeartbeatSettings) -> Self {
        self.interval = Duration::from_secs(settings.interval_secs);
        self.check_interval = Duration::from_secs(settings.check_interval_secs.max(1));
        self
    }

    pub fn with_intervals(mut self, interval: Duration, check_interval: Duration) -> Self {
        self.interval = interval;
        self.check_interval = check_interval;
        self
    }

    pub fn with_activity_clock(mut self, activity: ActivityClock) -> Self {
        self.activity = activity;
        self
    }

    /// 공유 활동 시계.
    pub fn activity(&self) -> ActivityClock {
        self.activity.clone()
    }

    /// 모든 수신자에게 전송합니다. 실패는 기록만 하고 성공 수를 반환합니다.
    async fn broadcast(&self, text: &str) -> usize {
        let mut delivered = 0;
        for &user_id in &self.recipients {
            match self.sender.send_text(user_id, text).await {
                Ok(()) => {
                    debug!(user_id, "Notification delivered");
                    delivered += 1;
                }
                Err(e) => warn!(user_id, error = %e, "Failed to deliver notification"),
            }
        }
        delivered
    }

    /// 시작 알림.
    pub async fn send_startup(&self) -> usize {
        let start_time = Local::now().format(TIME_FORMAT).to_string();
        let text = self.catalog.render(
            "startup_notification",
            &[("start_time", start_time), ("version", self.version.clone())],
        );
        let delivered = self.broadcast(&text).await;
        info!(delivered, "Startup notification sent");
        delivered
    }

    /// 종료 알림.
    pub async fn send_shutdown(&self) -> usize {
        let text = self.catalog.text("shutdown_notification");
        let delivered = self.broadcast(&text).await;
        info!(delivered, "Shutdown notification sent");
        delivered
    }

    /// 생존 신호를 보냅니다.
    async fn send_heartbeat(&self) {
        let last_activity = self
            .activity
            .last_activity()
            .with_timezone(&Local)
            .format(TIME_FORMAT)
            .to_string();
        let text = self
            .catalog
            .render("heartbeat", &[("last_activity", last_activity)]);

        let delivered = self.broadcast(&text).await;
        info!(delivered, "Heartbeat sent");
    }

    /// 취소될 때까지 주기적으로 활동 시간을 확인합니다.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            check_interval_secs = self.check_interval.as_secs(),
            "Heartbeat started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.check_interval) => {
                    if self.activity.elapsed() >= self.interval {
                        self.send_heartbeat().await;
                        self.activity.touch();
                    }
                }
            }
        }

        info!("Heartbeat stopped");
    }
}
