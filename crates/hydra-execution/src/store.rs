//! 거래소 자격증명 저장소.
//!
//! - `CredentialStore` - 이름 → 레코드 매핑 로드/저장
//! - `JsonFileStore` - `exchange_configs.json` 파일 저장소
//! - `MemoryCredentialStore` - 메모리 저장소
//!
//! 파일 저장소는 읽을 수 없는 항목을 건너뛰되, 다시 저장할 때 그대로 보존합니다.

use async_trait::async_trait;
use hydra_core::crypto::is_encrypted;
use hydra_core::{CredentialEncryptor, CryptoError, ExchangeCredentialRecord};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// 이름 → 레코드 매핑.
pub type CredentialMap = BTreeMap<String, ExchangeCredentialRecord>;

/// 저장소 에러.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt credential file {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Encryption error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// 자격증명 저장소.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// 저장된 모든 레코드를 로드합니다. 저장소가 없으면 빈 매핑.
    async fn load_all(&self) -> StoreResult<CredentialMap>;

    /// 매핑 전체를 저장합니다.
    async fn save_all(&self, records: &CredentialMap) -> StoreResult<()>;

    /// 레코드 하나를 병합 저장합니다.
    async fn upsert(&self, name: &str, record: &ExchangeCredentialRecord) -> StoreResult<()> {
        let mut records = self.load_all().await?;
        records.insert(name.to_string(), record.clone());
        self.save_all(&records).await
    }

    /// 레코드 하나를 삭제합니다. 존재했으면 true.
    async fn remove(&self, name: &str) -> StoreResult<bool> {
        let mut records = self.load_all().await?;
        let existed = records.remove(name).is_some();
        if existed {
            self.save_all(&records).await?;
        }
        Ok(existed)
    }
}

// ============================================================================
// JSON 파일 저장소
// ============================================================================

/// `exchange_configs.json` 파일 저장소.
///
/// 암호화기가 설정되면 `secret` 값을 암호화해 저장하고 로드 시 복호화합니다.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    encryptor: Option<CredentialEncryptor>,
    /// 읽기-수정-쓰기 직렬화
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            encryptor: None,
            write_lock: Mutex::new(()),
        }
    }

    /// 시크릿 암호화를 활성화합니다.
    pub fn with_encryptor(mut self, encryptor: CredentialEncryptor) -> Self {
        self.encryptor = Some(encryptor);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 파일을 원시 JSON 객체로 읽습니다. 파일이 없으면 빈 객체.
    async fn read_raw(&self) -> StoreResult<Map<String, Value>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Credential file not found, starting empty");
                return Ok(Map::new());
            }
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(StoreError::Corrupt {
                path: self.path.display().to_string(),
                reason: "top-level value is not an object".to_string(),
            }),
            Err(e) => Err(StoreError::Corrupt {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// 임시 파일에 쓴 뒤 교체합니다.
    async fn write_raw(&self, map: &Map<String, Value>) -> StoreResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(map)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), entries = map.len(), "Credential file written");
        Ok(())
    }

    /// 레코드를 저장 형식(JSON)으로 변환합니다.
    fn encode(&self, record: &ExchangeCredentialRecord) -> StoreResult<Value> {
        let mut record = record.clone();
        if let Some(encryptor) = &self.encryptor {
            if !is_encrypted(&record.secret) {
                record.secret = encryptor.encrypt(&record.secret)?;
            }
        }
        Ok(serde_json::to_value(record)?)
    }

    /// 저장 형식에서 레코드를 복원합니다.
    fn decode(&self, value: &Value) -> Result<ExchangeCredentialRecord, String> {
        let mut record: ExchangeCredentialRecord =
            serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;

        if is_encrypted(&record.secret) {
            let encryptor = self
                .encryptor
                .as_ref()
                .ok_or_else(|| "secret is encrypted but no master key is configured".to_string())?;
            record.secret = encryptor.decrypt(&record.secret).map_err(|e| e.to_string())?;
        }

        Ok(record)
    }
}

#[async_trait]
impl CredentialStore for JsonFileStore {
    async fn load_all(&self) -> StoreResult<CredentialMap> {
        let raw = self.read_raw().await?;
        let mut records = CredentialMap::new();

        for (name, value) in &raw {
            match self.decode(value) {
                Ok(record) => {
                    records.insert(name.clone(), record);
                }
                Err(reason) => {
                    warn!(exchange = %name, reason = %reason, "Skipping unreadable credential entry");
                }
            }
        }

        info!(
            path = %self.path.display(),
            loaded = records.len(),
            total = raw.len(),
            "Credential records loaded"
        );
        Ok(records)
    }

    async fn save_all(&self, records: &CredentialMap) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut map = Map::new();
        for (name, record) in records {
            map.insert(name.clone(), self.encode(record)?);
        }
        self.write_raw(&map).await
    }

    async fn upsert(&self, name: &str, record: &ExchangeCredentialRecord) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut map = self.read_raw().await?;
        map.insert(name.to_string(), self.encode(record)?);
        self.write_raw(&map).await
    }

    async fn remove(&self, name: &str) -> StoreResult<bool> {
        let _guard = self.write_lock.lock().await;

        let mut map = self.read_raw().await?;
        if map.remove(name).is_none() {
            return Ok(false);
        }
        self.write_raw(&map).await?;
        Ok(true)
    }
}

// ============================================================================
// 메모리 저장소
// ============================================================================

/// 메모리 저장소 (테스트, 영속화가 필요 없는 실행용).
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    records: RwLock<CredentialMap>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 초기 레코드로 생성합니다.
    pub fn with_records(records: CredentialMap) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load_all(&self) -> StoreResult<CredentialMap> {
        Ok(self.records.read().await.clone())
    }

    async fn save_all(&self, records: &CredentialMap) -> StoreResult<()> {
        *self.records.write().await = records.clone();
        Ok(())
    }

    async fn upsert(&self, name: &str, record: &ExchangeCredentialRecord) -> StoreResult<()> {
        self.records
            .write()
            .await
            .insert(name.to_string(), record.clone());
        Ok(())
    }

    async fn remove(&self, name: &str) -> StoreResult<bool> {
        Ok(self.records.write().await.remove(name).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydra_core::generate_master_key;

    fn record(kind: &str) -> ExchangeCredentialRecord {
        ExchangeCredentialRecord::new(kind, "abcd1234efgh5678", "plain-secret")
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("exchange_configs.json"));
        assert!(store.load_all().await.unwrap().is_empty());
        assert!(!store.remove("nothing").await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_merges() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested/exchange_configs.json"));

        store.upsert("a", &record("binance")).await.unwrap();
        store.upsert("b", &record("paper")).await.unwrap();

        let records = store.load_all().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records["a"].kind, "binance");
        assert_eq!(records["b"].kind, "paper");

        assert!(store.remove("a").await.unwrap());
        let records = store.load_all().await.unwrap();
        assert_eq!(records.keys().collect::<Vec<_>>(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_file_format_matches_legacy_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exchange_configs.json");
        let store = JsonFileStore::new(&path);
        store.upsert("binance_main", &record("binance")).await.unwrap();

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["binance_main"]["exchange"], "binance");
        assert_eq!(raw["binance_main"]["apiKey"], "abcd1234efgh5678");
        assert_eq!(raw["binance_main"]["secret"], "plain-secret");
        assert_eq!(raw["binance_main"]["enableRateLimit"], true);
    }

    #[tokio::test]
    async fn test_unreadable_entries_skipped_and_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exchange_configs.json");
        std::fs::write(
            &path,
            r#"{
                "good": {"exchange": "paper", "apiKey": "k", "secret": "s"},
                "broken": {"exchange": 42}
            }"#,
        )
        .unwrap();

        let store = JsonFileStore::new(&path);
        let records = store.load_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records.contains_key("good"));

        store.upsert("new", &record("paper")).await.unwrap();
        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["broken"]["exchange"], 42);
        assert_eq!(raw["new"]["exchange"], "paper");
    }

    #[tokio::test]
    async fn test_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exchange_configs.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(
            store.load_all().await,
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_encrypted_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exchange_configs.json");
        let key = generate_master_key();

        let store = JsonFileStore::new(&path).with_encryptor(CredentialEncryptor::new(&key).unwrap());
        store.upsert("main", &record("binance")).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("plain-secret"));
        assert!(content.contains("enc:"));

        let records = store.load_all().await.unwrap();
        assert_eq!(records["main"].secret, "plain-secret");

        // 키 없이 읽으면 해당 항목은 건너뜀
        let keyless = JsonFileStore::new(&path);
        assert!(keyless.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryCredentialStore::new();
        store.upsert("a", &record("paper")).await.unwrap();
        assert_eq!(store.load_all().await.unwrap().len(), 1);
        assert!(store.remove("a").await.unwrap());
        assert!(!store.remove("a").await.unwrap());
    }
}
