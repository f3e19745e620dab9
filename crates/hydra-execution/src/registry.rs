//! 거래소 연결 레지스트리.
//!
//! 운영자가 정한 이름으로 라이브 거래소 연결을 관리하고 자격증명 레코드를
//! 저장소에 영속화합니다.
//!
//! # 등록 절차
//!
//! 1. 이름 예약 (동시 등록 직렬화)
//! 2. 임시 어댑터로 잔고 조회 (자격증명 검증, 락 없이 수행)
//! 3. 레코드 저장 (기존 레코드와 병합)
//! 4. 영구 어댑터 생성 후 라이브 맵에 삽입
//!
//! 3단계와 4단계는 원자적이지 않습니다. 4단계가 실패하면 레코드는 남아 있고
//! `InitializationFailed`가 반환됩니다. `remove_exchange`로 레코드를 정리할 수 있습니다.
//!
//! 등록, 제거, 로드는 모두 같은 이름 예약을 잡습니다. 등록이 진행 중인 이름을
//! 제거하면 `Busy`, 로드는 해당 이름을 건너뜁니다.

use futures::future::join_all;
use hydra_core::{ExchangeCredentialRecord, ExchangeSummary};
use hydra_exchange::{AccountBalance, AdapterFactory, ExchangeAdapter, ExchangeError, ExchangeResult};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{ExecutionError, ExecutionResult};
use crate::store::CredentialStore;

/// 기본 거래소 호출 타임아웃.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// 거래소 호출에 타임아웃을 적용합니다.
pub(crate) async fn bounded<T, F>(timeout: Duration, operation: &str, future: F) -> ExchangeResult<T>
where
    F: Future<Output = ExchangeResult<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(ExchangeError::Timeout(format!(
            "{} did not complete within {:?}",
            operation, timeout
        ))),
    }
}

/// 라이브 연결.
struct LiveConnection {
    adapter: Arc<dyn ExchangeAdapter>,
    summary: ExchangeSummary,
}

/// 시작 시 레코드 로드 결과.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// 연결된 거래소 이름
    pub loaded: Vec<String>,
    /// 건너뛴 거래소 이름과 사유
    pub skipped: Vec<(String, String)>,
}

/// 검증용 임시 어댑터.
///
/// `release`를 거치지 않고 drop되면 (호출 future가 취소된 경우) 백그라운드에서 닫습니다.
struct ThrowawayAdapter {
    adapter: Option<Arc<dyn ExchangeAdapter>>,
}

impl ThrowawayAdapter {
    fn new(adapter: Arc<dyn ExchangeAdapter>) -> Self {
        Self {
            adapter: Some(adapter),
        }
    }

    async fn check(&self, timeout: Duration) -> ExchangeResult<AccountBalance> {
        match &self.adapter {
            Some(adapter) => bounded(timeout, "balance check", adapter.fetch_balance()).await,
            None => Err(ExchangeError::Closed),
        }
    }

    async fn release(mut self, timeout: Duration) {
        if let Some(adapter) = self.adapter.take() {
            if let Err(e) = bounded(timeout, "close", adapter.close()).await {
                warn!(kind = %adapter.kind(), error = %e, "Failed to release validation adapter");
            }
        }
    }
}

impl Drop for ThrowawayAdapter {
    fn drop(&mut self) {
        if let Some(adapter) = self.adapter.take() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(e) = adapter.close().await {
                        warn!(kind = %adapter.kind(), error = %e, "Failed to release validation adapter");
                    }
                });
            }
        }
    }
}

/// 등록 중인 이름 예약. drop 시 해제됩니다.
struct PendingName<'a> {
    pending: &'a Mutex<HashSet<String>>,
    name: String,
}

impl Drop for PendingName<'_> {
    fn drop(&mut self) {
        lock_pending(self.pending).remove(&self.name);
    }
}

fn lock_pending(pending: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 거래소 연결 레지스트리.
pub struct ExchangeRegistry {
    factory: AdapterFactory,
    store: Arc<dyn CredentialStore>,
    connections: RwLock<HashMap<String, LiveConnection>>,
    pending: Mutex<HashSet<String>>,
    call_timeout: Duration,
}

impl ExchangeRegistry {
    /// 새 레지스트리를 생성합니다. 라이브 연결은 `load()` 전까지 비어 있습니다.
    pub fn new(factory: AdapterFactory, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            factory,
            store,
            connections: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashSet::new()),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// 거래소 호출 타임아웃을 설정합니다.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// 거래소 호출 타임아웃.
    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// 저장된 레코드로 라이브 연결을 구성합니다.
    ///
    /// 생성에 실패한 레코드는 로그를 남기고 건너뜁니다. 저장소 파일이 없으면
    /// 빈 결과를 반환합니다. 저장소 자체를 읽지 못하면 `Persistence` 에러입니다.
    pub async fn load(&self) -> ExecutionResult<LoadReport> {
        let records = self.store.load_all().await?;
        let mut report = LoadReport::default();

        for (name, record) in records {
            let Some(_reservation) = self.reserve(&name) else {
                debug!(exchange = %name, "Skipping exchange record with pending change");
                report
                    .skipped
                    .push((name, "registration in progress".to_string()));
                continue;
            };
            if self.connections.read().await.contains_key(&name) {
                report
                    .skipped
                    .push((name, "already connected".to_string()));
                continue;
            }

            let adapter = match self.factory.create(&record) {
                Ok(adapter) => adapter,
                Err(e) => {
                    warn!(exchange = %name, kind = %record.kind, error = %e, "Skipping exchange record");
                    report.skipped.push((name, e.to_string()));
                    continue;
                }
            };

            let duplicate = match self.connections.write().await.entry(name.clone()) {
                Entry::Occupied(_) => Some(adapter),
                Entry::Vacant(slot) => {
                    slot.insert(LiveConnection {
                        adapter,
                        summary: record.summary(),
                    });
                    None
                }
            };

            match duplicate {
                Some(adapter) => {
                    if let Err(e) = bounded(self.call_timeout, "close", adapter.close()).await {
                        warn!(exchange = %name, error = %e, "Failed to close duplicate connection");
                    }
                    report
                        .skipped
                        .push((name, "already connected".to_string()));
                }
                None => {
                    info!(exchange = %name, kind = %record.kind, "Exchange loaded");
                    report.loaded.push(name);
                }
            }
        }

        info!(
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            "Exchange records loaded"
        );
        Ok(report)
    }

    /// 자격증명을 실시간 잔고 조회로 검증합니다.
    ///
    /// 임시 어댑터는 성공/실패와 관계없이 닫힙니다.
    pub async fn test_connection(&self, record: &ExchangeCredentialRecord) -> ExecutionResult<AccountBalance> {
        let validation_failed = |e: ExchangeError| ExecutionError::ValidationFailed {
            kind: record.kind.clone(),
            reason: e.to_string(),
        };

        let adapter = self.factory.create(record).map_err(validation_failed)?;
        let throwaway = ThrowawayAdapter::new(adapter);

        let result = throwaway.check(self.call_timeout).await;
        throwaway.release(self.call_timeout).await;

        match result {
            Ok(balance) => {
                debug!(kind = %record.kind, assets = balance.balances.len(), "Credential check passed");
                Ok(balance)
            }
            Err(e) => {
                warn!(kind = %record.kind, error = %e, "Credential check failed");
                Err(validation_failed(e))
            }
        }
    }

    /// 거래소를 등록합니다.
    pub async fn add_exchange(
        &self,
        name: &str,
        record: ExchangeCredentialRecord,
    ) -> ExecutionResult<ExchangeSummary> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ExecutionError::InvalidArgument(
                "exchange name must not be empty".to_string(),
            ));
        }

        let _reservation = self.reserve(name).ok_or_else(|| ExecutionError::AlreadyExists {
            name: name.to_string(),
        })?;
        if self.connections.read().await.contains_key(name) {
            return Err(ExecutionError::AlreadyExists {
                name: name.to_string(),
            });
        }

        info!(exchange = %name, kind = %record.kind, "Validating exchange credentials");
        self.test_connection(&record).await?;

        self.store.upsert(name, &record).await?;

        let adapter = self.factory.create(&record).map_err(|e| {
            warn!(exchange = %name, error = %e, "Exchange record saved but connection could not be created");
            ExecutionError::InitializationFailed {
                name: name.to_string(),
                reason: e.to_string(),
            }
        })?;

        let summary = record.summary();
        self.connections.write().await.insert(
            name.to_string(),
            LiveConnection {
                adapter,
                summary: summary.clone(),
            },
        );

        info!(exchange = %name, kind = %summary.kind, "Exchange added");
        Ok(summary)
    }

    /// 거래소를 제거합니다.
    ///
    /// 라이브 연결을 닫은 뒤 저장된 레코드를 삭제합니다. 라이브 연결 없이 레코드만
    /// 남아 있는 경우(초기화 실패)에도 레코드를 삭제하고 성공합니다.
    /// 같은 이름의 등록이 진행 중이면 `Busy`입니다.
    pub async fn remove_exchange(&self, name: &str) -> ExecutionResult<()> {
        let _reservation = self.reserve(name).ok_or_else(|| {
            warn!(exchange = %name, "Remove rejected while a registration is in progress");
            ExecutionError::Busy {
                name: name.to_string(),
            }
        })?;

        let removed = self.connections.write().await.remove(name);

        if let Some(connection) = &removed {
            if let Err(e) = bounded(self.call_timeout, "close", connection.adapter.close()).await {
                warn!(exchange = %name, error = %e, "Error while closing exchange connection");
            }
        }

        let had_record = self.store.remove(name).await?;
        if removed.is_none() && !had_record {
            return Err(ExecutionError::NotFound {
                name: name.to_string(),
            });
        }

        info!(exchange = %name, live = removed.is_some(), "Exchange removed");
        Ok(())
    }

    /// 라이브 연결을 조회합니다.
    pub async fn get_connection(&self, name: &str) -> ExecutionResult<Arc<dyn ExchangeAdapter>> {
        self.connections
            .read()
            .await
            .get(name)
            .map(|c| c.adapter.clone())
            .ok_or_else(|| ExecutionError::NotFound {
                name: name.to_string(),
            })
    }

    /// 라이브 연결 목록 (이름 → 요약) 스냅샷.
    pub async fn list_exchanges(&self) -> BTreeMap<String, ExchangeSummary> {
        self.connections
            .read()
            .await
            .iter()
            .map(|(name, c)| (name.clone(), c.summary.clone()))
            .collect()
    }

    /// 등록된 거래소 수.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// 등록된 거래소가 없는지 확인.
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// 거래소 잔고를 조회합니다.
    pub async fn fetch_balance(&self, name: &str) -> ExecutionResult<AccountBalance> {
        let adapter = self.get_connection(name).await?;
        bounded(self.call_timeout, "fetch_balance", adapter.fetch_balance())
            .await
            .map_err(|e| ExecutionError::upstream(name, e))
    }

    /// 모든 라이브 연결을 닫습니다. 저장된 레코드는 유지됩니다.
    pub async fn shutdown(&self) {
        let drained: Vec<(String, LiveConnection)> =
            self.connections.write().await.drain().collect();
        if drained.is_empty() {
            return;
        }

        let timeout = self.call_timeout;
        let closes = drained.iter().map(|(name, connection)| async move {
            if let Err(e) = bounded(timeout, "close", connection.adapter.close()).await {
                warn!(exchange = %name, error = %e, "Error while closing exchange connection");
            }
        });
        join_all(closes).await;

        info!(closed = drained.len(), "Exchange registry shut down");
    }

    /// 이름을 예약합니다. 이미 예약된 이름이면 `None`.
    fn reserve(&self, name: &str) -> Option<PendingName<'_>> {
        if !lock_pending(&self.pending).insert(name.to_string()) {
            return None;
        }
        Some(PendingName {
            pending: &self.pending,
            name: name.to_string(),
        })
    }
}

impl std::fmt::Debug for ExchangeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeRegistry")
            .field("factory", &self.factory)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CredentialMap, MemoryCredentialStore, StoreResult};
    use async_trait::async_trait;
    use hydra_core::{OrderRequest, PlacedOrder};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 잔고 조회 결과를 고정한 어댑터.
    struct StubAdapter {
        healthy: bool,
        delay: Duration,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ExchangeAdapter for StubAdapter {
        fn kind(&self) -> &str {
            "stub"
        }

        async fn fetch_balance(&self) -> ExchangeResult<AccountBalance> {
            tokio::time::sleep(self.delay).await;
            if self.healthy {
                Ok(AccountBalance::default())
            } else {
                Err(ExchangeError::Unauthorized("bad key".to_string()))
            }
        }

        async fn create_order(&self, _request: &OrderRequest) -> ExchangeResult<PlacedOrder> {
            Err(ExchangeError::OrderRejected("stub".to_string()))
        }

        async fn close(&self) -> ExchangeResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// 저장 직후 지연되는 저장소.
    struct SlowUpsertStore {
        inner: MemoryCredentialStore,
        delay: Duration,
    }

    #[async_trait]
    impl CredentialStore for SlowUpsertStore {
        async fn load_all(&self) -> StoreResult<CredentialMap> {
            self.inner.load_all().await
        }

        async fn save_all(&self, records: &CredentialMap) -> StoreResult<()> {
            self.inner.save_all(records).await
        }

        async fn upsert(&self, name: &str, record: &ExchangeCredentialRecord) -> StoreResult<()> {
            self.inner.upsert(name, record).await?;
            tokio::time::sleep(self.delay).await;
            Ok(())
        }
    }

    fn stub_factory(healthy: bool, delay: Duration, closes: Arc<AtomicUsize>) -> AdapterFactory {
        AdapterFactory::new().with_adapter("stub", move |_| {
            Ok(Arc::new(StubAdapter {
                healthy,
                delay,
                closes: closes.clone(),
            }) as Arc<dyn ExchangeAdapter>)
        })
    }

    fn registry(healthy: bool, delay: Duration) -> (ExchangeRegistry, Arc<MemoryCredentialStore>, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let factory = stub_factory(healthy, delay, closes.clone());
        let store = Arc::new(MemoryCredentialStore::new());
        let registry = ExchangeRegistry::new(factory, store.clone())
            .with_call_timeout(Duration::from_millis(200));
        (registry, store, closes)
    }

    fn record() -> ExchangeCredentialRecord {
        ExchangeCredentialRecord::new("stub", "abcd1234efgh5678", "s")
    }

    #[tokio::test]
    async fn test_add_and_list() {
        let (registry, store, closes) = registry(true, Duration::ZERO);

        let summary = registry.add_exchange("main", record()).await.unwrap();
        assert_eq!(summary.masked_api_key, "abcd...5678");
        assert!(registry.list_exchanges().await.contains_key("main"));
        assert!(store.load_all().await.unwrap().contains_key("main"));
        // 검증용 임시 어댑터만 닫힘
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let (registry, _store, _) = registry(true, Duration::ZERO);
        registry.add_exchange("main", record()).await.unwrap();

        let other = ExchangeCredentialRecord::new("stub", "other-key-0000", "s2");
        let result = registry.add_exchange("main", other).await;
        assert!(matches!(result, Err(ExecutionError::AlreadyExists { .. })));
        assert_eq!(registry.list_exchanges().await["main"].masked_api_key, "abcd...5678");
    }

    #[tokio::test]
    async fn test_failed_validation_leaves_no_state() {
        let (registry, store, closes) = registry(false, Duration::ZERO);

        let result = registry.add_exchange("main", record()).await;
        assert!(matches!(result, Err(ExecutionError::ValidationFailed { .. })));
        assert!(registry.is_empty().await);
        assert!(store.load_all().await.unwrap().is_empty());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_validation_timeout() {
        let (registry, _store, closes) = registry(true, Duration::from_secs(5));

        let result = registry.test_connection(&record()).await;
        assert!(matches!(result, Err(ExecutionError::ValidationFailed { .. })));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_kind_fails_validation() {
        let (registry, _store, _) = registry(true, Duration::ZERO);
        let result = registry
            .add_exchange("main", ExchangeCredentialRecord::new("kraken", "k", "s"))
            .await;
        assert!(matches!(
            result,
            Err(ExecutionError::ValidationFailed { kind, .. }) if kind == "kraken"
        ));
    }

    #[tokio::test]
    async fn test_remove_twice() {
        let (registry, store, closes) = registry(true, Duration::ZERO);
        registry.add_exchange("main", record()).await.unwrap();

        registry.remove_exchange("main").await.unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 2);
        assert!(store.load_all().await.unwrap().is_empty());

        let result = registry.remove_exchange("main").await;
        assert!(matches!(result, Err(ExecutionError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_remove_stored_only_record() {
        let (registry, store, _) = registry(true, Duration::ZERO);
        store.upsert("orphan", &record()).await.unwrap();

        registry.remove_exchange("orphan").await.unwrap();
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_add_same_name() {
        let (registry, _store, _) = registry(true, Duration::from_millis(50));
        let registry = Arc::new(registry);

        let a = tokio::spawn({
            let registry = registry.clone();
            async move { registry.add_exchange("main", record()).await }
        });
        let b = tokio::spawn({
            let registry = registry.clone();
            async move { registry.add_exchange("main", record()).await }
        });

        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(ExecutionError::AlreadyExists { .. }))));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_load_and_shutdown() {
        let (registry, store, closes) = registry(true, Duration::ZERO);
        store.upsert("a", &record()).await.unwrap();
        store.upsert("b", &record()).await.unwrap();
        store
            .upsert("c", &ExchangeCredentialRecord::new("kraken", "k", "s"))
            .await
            .unwrap();

        let report = registry.load().await.unwrap();
        assert_eq!(report.loaded, vec!["a", "b"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].0, "c");

        registry.shutdown().await;
        assert!(registry.is_empty().await);
        assert_eq!(closes.load(Ordering::SeqCst), 2);
        assert_eq!(store.load_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_initialization_failure_keeps_record() {
        let closes = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let factory = AdapterFactory::new().with_adapter("stub", {
            let closes = closes.clone();
            move |_| {
                // 검증용 생성만 성공
                if calls.fetch_add(1, Ordering::SeqCst) > 0 {
                    return Err(ExchangeError::InvalidCredentials("key revoked".to_string()));
                }
                Ok(Arc::new(StubAdapter {
                    healthy: true,
                    delay: Duration::ZERO,
                    closes: closes.clone(),
                }) as Arc<dyn ExchangeAdapter>)
            }
        });
        let store = Arc::new(MemoryCredentialStore::new());
        let registry = ExchangeRegistry::new(factory, store.clone());

        let result = registry.add_exchange("main", record()).await;
        assert!(matches!(
            result,
            Err(ExecutionError::InitializationFailed { name, .. }) if name == "main"
        ));
        assert!(store.load_all().await.unwrap().contains_key("main"));
        assert!(registry.is_empty().await);
        assert_eq!(closes.load(Ordering::SeqCst), 1);

        registry.remove_exchange("main").await.unwrap();
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_during_add_is_busy() {
        let closes = Arc::new(AtomicUsize::new(0));
        let store = Arc::new(SlowUpsertStore {
            inner: MemoryCredentialStore::new(),
            delay: Duration::from_millis(100),
        });
        let registry = Arc::new(ExchangeRegistry::new(
            stub_factory(true, Duration::ZERO, closes),
            store.clone(),
        ));

        let add = tokio::spawn({
            let registry = registry.clone();
            async move { registry.add_exchange("main", record()).await }
        });
        tokio::time::sleep(Duration::from_millis(30)).await;

        let result = registry.remove_exchange("main").await;
        assert!(matches!(result, Err(ExecutionError::Busy { name }) if name == "main"));

        add.await.unwrap().unwrap();
        assert!(registry.get_connection("main").await.is_ok());
        assert!(store.load_all().await.unwrap().contains_key("main"));

        registry.remove_exchange("main").await.unwrap();
        assert!(registry.is_empty().await);
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_keeps_existing_connection() {
        let (registry, store, closes) = registry(true, Duration::ZERO);
        registry.add_exchange("a", record()).await.unwrap();
        store.upsert("b", &record()).await.unwrap();
        let before = registry.get_connection("a").await.unwrap();

        let report = registry.load().await.unwrap();
        assert_eq!(report.loaded, vec!["b"]);
        assert_eq!(report.skipped, vec![("a".to_string(), "already connected".to_string())]);
        assert!(Arc::ptr_eq(&before, &registry.get_connection("a").await.unwrap()));
        // 검증용 어댑터 한 번만 닫힘
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_skips_pending_name() {
        let (registry, store, _) = registry(true, Duration::ZERO);
        store.upsert("a", &record()).await.unwrap();
        store.upsert("b", &record()).await.unwrap();

        let held = registry.reserve("b").unwrap();
        let report = registry.load().await.unwrap();
        drop(held);

        assert_eq!(report.loaded, vec!["a"]);
        assert_eq!(
            report.skipped,
            vec![("b".to_string(), "registration in progress".to_string())]
        );
        assert!(registry.get_connection("b").await.is_err());
    }

    #[tokio::test]
    async fn test_get_connection_not_found() {
        let (registry, _store, _) = registry(true, Duration::ZERO);
        assert!(matches!(
            registry.get_connection("missing").await,
            Err(ExecutionError::NotFound { .. })
        ));
        assert!(matches!(
            registry.fetch_balance("missing").await,
            Err(ExecutionError::NotFound { .. })
        ));
    }
}
