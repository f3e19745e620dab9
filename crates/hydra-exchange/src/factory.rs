//! 거래소 종류 → 어댑터 생성자 매핑.
//!
//! 자격증명 레코드의 `exchange` 값으로 어댑터를 선택합니다.
//! 등록되지 않은 종류는 `ExchangeError::UnsupportedKind`로 즉시 실패합니다.

use hydra_core::ExchangeCredentialRecord;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::connector::BinanceClient;
use crate::simulated::PaperExchange;
use crate::traits::{ExchangeAdapter, ExchangeResult};
use crate::ExchangeError;

/// 레코드에서 어댑터를 생성하는 함수.
pub type AdapterConstructor = Arc<
    dyn Fn(&ExchangeCredentialRecord) -> ExchangeResult<Arc<dyn ExchangeAdapter>> + Send + Sync,
>;

/// 어댑터 팩토리.
#[derive(Clone, Default)]
pub struct AdapterFactory {
    constructors: HashMap<String, AdapterConstructor>,
}

impl fmt::Debug for AdapterFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterFactory")
            .field("kinds", &self.supported_kinds())
            .finish()
    }
}

impl AdapterFactory {
    /// 빈 팩토리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 기본 어댑터(`binance`, `paper`)가 등록된 팩토리를 생성합니다.
    ///
    /// `default_testnet`은 `testnet` 옵션이 없는 Binance 레코드에 적용됩니다.
    pub fn with_defaults(default_testnet: bool) -> Self {
        Self::new()
            .with_adapter("binance", move |record| {
                Ok(Arc::new(BinanceClient::from_record(record, default_testnet)?)
                    as Arc<dyn ExchangeAdapter>)
            })
            .with_adapter("paper", |record| {
                Ok(Arc::new(PaperExchange::from_record(record)?) as Arc<dyn ExchangeAdapter>)
            })
    }

    /// 생성자를 등록합니다. 같은 종류가 있으면 교체합니다.
    pub fn register<F>(&mut self, kind: impl Into<String>, constructor: F)
    where
        F: Fn(&ExchangeCredentialRecord) -> ExchangeResult<Arc<dyn ExchangeAdapter>>
            + Send
            + Sync
            + 'static,
    {
        self.constructors
            .insert(kind.into().to_lowercase(), Arc::new(constructor));
    }

    /// 생성자를 등록한 팩토리를 반환합니다.
    pub fn with_adapter<F>(mut self, kind: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&ExchangeCredentialRecord) -> ExchangeResult<Arc<dyn ExchangeAdapter>>
            + Send
            + Sync
            + 'static,
    {
        self.register(kind, constructor);
        self
    }

    /// 지원 여부를 확인합니다.
    pub fn supports(&self, kind: &str) -> bool {
        self.constructors.contains_key(&kind.to_lowercase())
    }

    /// 등록된 종류 목록 (정렬됨).
    pub fn supported_kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.constructors.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// 레코드에서 어댑터를 생성합니다.
    pub fn create(&self, record: &ExchangeCredentialRecord) -> ExchangeResult<Arc<dyn ExchangeAdapter>> {
        let constructor = self
            .constructors
            .get(&record.kind.to_lowercase())
            .ok_or_else(|| ExchangeError::UnsupportedKind(record.kind.clone()))?;
        constructor(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let factory = AdapterFactory::with_defaults(false);
        assert_eq!(factory.supported_kinds(), vec!["binance", "paper"]);
        assert!(factory.supports("Binance"));

        let adapter = factory
            .create(&ExchangeCredentialRecord::new("PAPER", "k", "s"))
            .unwrap();
        assert_eq!(adapter.kind(), "paper");
    }

    #[test]
    fn test_unknown_kind() {
        let factory = AdapterFactory::with_defaults(false);
        let result = factory.create(&ExchangeCredentialRecord::new("kraken", "k", "s"));
        assert!(matches!(result, Err(ExchangeError::UnsupportedKind(kind)) if kind == "kraken"));
    }

    #[test]
    fn test_constructor_error_propagates() {
        let factory = AdapterFactory::with_defaults(false);
        let result = factory.create(&ExchangeCredentialRecord::new("binance", "", ""));
        assert!(matches!(result, Err(ExchangeError::InvalidCredentials(_))));
    }
}
