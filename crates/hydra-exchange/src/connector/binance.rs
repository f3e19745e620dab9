//! Binance 거래소 커넥터.
//!
//! Binance Spot REST API 구현 (잔고 조회, 주문 제출).
//! 메인넷과 테스트넷 모두 지원.
//!
//! 레코드 옵션:
//! - `testnet` - 테스트넷 사용 (bool)
//! - `base_url` - REST 기본 URL 직접 지정
//! - `recv_window` - 수신 윈도우 (밀리초)
//! - `timeout_secs` - HTTP 요청 타임아웃 (초)
//! - `min_request_interval_ms` - `enableRateLimit` 시 요청 간 최소 간격

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use hydra_core::{
    ExchangeCredentialRecord, OrderKind, OrderRequest, OrderState, PlacedOrder, Side,
};
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::traits::{AccountBalance, Balance, ExchangeAdapter, ExchangeResult};
use crate::ExchangeError;

type HmacSha256 = Hmac<Sha256>;

const MAINNET_URL: &str = "https://api.binance.com";
const TESTNET_URL: &str = "https://testnet.binance.vision";

// ============================================================================
// 설정
// ============================================================================

/// Binance 클라이언트 설정.
///
/// # 보안
/// - `Debug` 구현은 민감 정보(`api_key`, `api_secret`)를 마스킹합니다.
pub struct BinanceConfig {
    /// API 키
    pub api_key: String,
    /// API 시크릿
    pub api_secret: SecretString,
    /// 테스트넷 사용
    pub testnet: bool,
    /// REST 기본 URL 직접 지정
    pub base_url: Option<String>,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 수신 윈도우 (밀리초)
    pub recv_window: u64,
    /// 요청 간 최소 간격 (None이면 제한 없음)
    pub min_request_interval: Option<Duration>,
}

impl fmt::Debug for BinanceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinanceConfig")
            .field("api_key", &hydra_core::mask_api_key(&self.api_key))
            .field("api_secret", &"***REDACTED***")
            .field("testnet", &self.testnet)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("recv_window", &self.recv_window)
            .field("min_request_interval", &self.min_request_interval)
            .finish()
    }
}

impl BinanceConfig {
    /// 새 설정 생성.
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        let secret: String = api_secret.into();
        Self {
            api_key: api_key.into(),
            api_secret: SecretString::new(secret.into()),
            testnet: false,
            base_url: None,
            timeout_secs: 30,
            recv_window: 5000,
            min_request_interval: Some(Duration::from_millis(50)),
        }
    }

    /// 테스트넷 사용.
    pub fn with_testnet(mut self, testnet: bool) -> Self {
        self.testnet = testnet;
        self
    }

    /// REST 기본 URL 지정.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// 자격증명 레코드에서 생성.
    ///
    /// 레코드에 `testnet` 옵션이 없으면 `default_testnet`을 사용합니다.
    pub fn from_record(
        record: &ExchangeCredentialRecord,
        default_testnet: bool,
    ) -> ExchangeResult<Self> {
        if record.api_key.trim().is_empty() || record.secret.trim().is_empty() {
            return Err(ExchangeError::InvalidCredentials(
                "apiKey and secret are required".to_string(),
            ));
        }

        let mut config = Self::new(record.api_key.clone(), record.secret.clone())
            .with_testnet(record.option_bool("testnet").unwrap_or(default_testnet));

        if let Some(url) = record.option_str("base_url") {
            config.base_url = Some(url.trim_end_matches('/').to_string());
        }
        if let Some(recv_window) = record.option_u64("recv_window") {
            config.recv_window = recv_window;
        }
        if let Some(timeout) = record.option_u64("timeout_secs") {
            config.timeout_secs = timeout;
        }

        config.min_request_interval = if record.enable_rate_limit {
            let ms = record.option_u64("min_request_interval_ms").unwrap_or(50);
            Some(Duration::from_millis(ms))
        } else {
            None
        };

        Ok(config)
    }

    /// REST API 기본 URL 반환.
    pub fn rest_base_url(&self) -> &str {
        if let Some(url) = &self.base_url {
            url
        } else if self.testnet {
            TESTNET_URL
        } else {
            MAINNET_URL
        }
    }
}

// ============================================================================
// API 응답 타입
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceAccountBalance {
    asset: String,
    free: String,
    locked: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceAccountInfo {
    balances: Vec<BinanceAccountBalance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceOrderResponse {
    symbol: String,
    order_id: i64,
    #[serde(default)]
    client_order_id: Option<String>,
    #[serde(default)]
    transact_time: Option<i64>,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    orig_qty: Option<String>,
    #[serde(default)]
    executed_qty: Option<String>,
    #[serde(default)]
    cummulative_quote_qty: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BinanceError {
    code: i32,
    msg: String,
}

// ============================================================================
// 요청 간격 제어
// ============================================================================

/// 요청 사이의 최소 간격을 보장합니다.
struct RequestPacer {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RequestPacer {
    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

// ============================================================================
// Binance 클라이언트
// ============================================================================

/// Binance 거래소 클라이언트.
pub struct BinanceClient {
    config: BinanceConfig,
    client: Client,
    pacer: Option<RequestPacer>,
    closed: AtomicBool,
}

impl BinanceClient {
    /// 새 Binance 클라이언트 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `ExchangeError::NetworkError`를 반환합니다.
    pub fn new(config: BinanceConfig) -> ExchangeResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExchangeError::NetworkError(format!("HTTP client build failed: {}", e)))?;

        let pacer = config.min_request_interval.map(RequestPacer::new);

        Ok(Self {
            config,
            client,
            pacer,
            closed: AtomicBool::new(false),
        })
    }

    /// 자격증명 레코드에서 생성.
    pub fn from_record(
        record: &ExchangeCredentialRecord,
        default_testnet: bool,
    ) -> ExchangeResult<Self> {
        Self::new(BinanceConfig::from_record(record, default_testnet)?)
    }

    fn ensure_open(&self) -> ExchangeResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(ExchangeError::Closed)
        } else {
            Ok(())
        }
    }

    /// HMAC-SHA256으로 쿼리 문자열 서명.
    fn sign(&self, query: &str) -> ExchangeResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.config.api_secret.expose_secret().as_bytes())
            .map_err(|e| ExchangeError::InvalidCredentials(e.to_string()))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// 파라미터에서 쿼리 문자열 생성.
    fn build_query(params: &[(String, String)]) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// 타임스탬프와 서명을 붙인 쿼리 문자열 생성.
    fn signed_query(&self, params: &[(String, String)]) -> ExchangeResult<String> {
        let mut all_params = params.to_vec();
        all_params.push((
            "timestamp".to_string(),
            Utc::now().timestamp_millis().to_string(),
        ));
        all_params.push(("recvWindow".to_string(), self.config.recv_window.to_string()));

        let query = Self::build_query(&all_params);
        let signature = self.sign(&query)?;
        Ok(format!("{}&signature={}", query, signature))
    }

    async fn pace(&self) {
        if let Some(pacer) = &self.pacer {
            pacer.wait().await;
        }
    }

    /// 서명된 GET 요청.
    async fn signed_get<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> ExchangeResult<T> {
        self.ensure_open()?;
        self.pace().await;

        let url = format!(
            "{}{}?{}",
            self.config.rest_base_url(),
            endpoint,
            self.signed_query(params)?
        );

        debug!("GET (signed) {}", endpoint);

        let response = self
            .client
            .get(&url)
            .header("X-MBX-APIKEY", &self.config.api_key)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// 서명된 POST 요청.
    async fn signed_post<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> ExchangeResult<T> {
        self.ensure_open()?;
        self.pace().await;

        let url = format!("{}{}", self.config.rest_base_url(), endpoint);
        let body = self.signed_query(params)?;

        debug!("POST (signed) {}", endpoint);

        let response = self
            .client
            .post(&url)
            .header("X-MBX-APIKEY", &self.config.api_key)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// API 응답 처리.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> ExchangeResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExchangeError::NetworkError(e.to_string()))?;

        if status.is_success() {
            serde_json::from_str(&body).map_err(|e| {
                error!("Failed to parse response: {} - Body: {}", e, body);
                ExchangeError::ParseError(e.to_string())
            })
        } else if let Ok(error) = serde_json::from_str::<BinanceError>(&body) {
            Err(Self::map_error_code(error.code, &error.msg))
        } else if status.as_u16() == 429 || status.as_u16() == 418 {
            Err(ExchangeError::RateLimited)
        } else {
            Err(ExchangeError::ApiError {
                code: status.as_u16() as i32,
                message: body,
            })
        }
    }

    /// Binance 에러 코드를 ExchangeError로 매핑.
    fn map_error_code(code: i32, msg: &str) -> ExchangeError {
        match code {
            -1001 => ExchangeError::NetworkError(msg.to_string()),
            -1002 | -2014 | -2015 => ExchangeError::Unauthorized(msg.to_string()),
            -1003 => ExchangeError::RateLimited,
            -1013 => ExchangeError::InvalidQuantity(msg.to_string()),
            -1021 => ExchangeError::TimestampError(msg.to_string()),
            -2010 => ExchangeError::InsufficientBalance(msg.to_string()),
            -1102..=-1100 | -1111 | -1116 | -1117 => ExchangeError::OrderRejected(msg.to_string()),
            _ => ExchangeError::ApiError {
                code,
                message: msg.to_string(),
            },
        }
    }

    /// 심볼을 Binance 형식으로 변환 ("BTC/USDT" -> "BTCUSDT").
    fn from_symbol(symbol: &str) -> String {
        symbol.replace(['/', '-', '_'], "").to_uppercase()
    }

    /// 문자열에서 Decimal 파싱.
    fn parse_decimal(s: &str) -> Decimal {
        s.parse().unwrap_or(Decimal::ZERO)
    }

    fn parse_state(status: Option<&str>) -> OrderState {
        match status {
            Some("PARTIALLY_FILLED") => OrderState::PartiallyFilled,
            Some("FILLED") => OrderState::Filled,
            Some("CANCELED") | Some("PENDING_CANCEL") => OrderState::Cancelled,
            Some("REJECTED") => OrderState::Rejected,
            Some("EXPIRED") | Some("EXPIRED_IN_MATCH") => OrderState::Expired,
            _ => OrderState::Open,
        }
    }

    /// 주문 응답을 PlacedOrder로 변환.
    fn to_placed_order(request: &OrderRequest, resp: BinanceOrderResponse) -> PlacedOrder {
        let filled = resp
            .executed_qty
            .as_deref()
            .map(Self::parse_decimal)
            .unwrap_or(Decimal::ZERO);
        let quote = resp
            .cummulative_quote_qty
            .as_deref()
            .map(Self::parse_decimal)
            .unwrap_or(Decimal::ZERO);

        let average_price = if filled > Decimal::ZERO && quote > Decimal::ZERO {
            Some(quote / filled)
        } else {
            None
        };

        let amount = resp
            .orig_qty
            .as_deref()
            .map(Self::parse_decimal)
            .filter(|q| *q > Decimal::ZERO)
            .unwrap_or(request.amount);

        let price = match request.kind {
            OrderKind::Limit => resp
                .price
                .as_deref()
                .map(Self::parse_decimal)
                .filter(|p| *p > Decimal::ZERO)
                .or(request.price),
            OrderKind::Market => None,
        };

        let timestamp = resp
            .transact_time
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(Utc::now);

        debug!(symbol = %resp.symbol, order_id = resp.order_id, "Order response parsed");

        PlacedOrder {
            id: resp.order_id.to_string(),
            client_order_id: resp.client_order_id,
            symbol: request.symbol.clone(),
            side: request.side,
            kind: request.kind,
            amount,
            price,
            average_price,
            filled,
            status: Self::parse_state(resp.status.as_deref()),
            timestamp,
        }
    }
}

#[async_trait]
impl ExchangeAdapter for BinanceClient {
    fn kind(&self) -> &str {
        "binance"
    }

    async fn fetch_balance(&self) -> ExchangeResult<AccountBalance> {
        let resp: BinanceAccountInfo = self.signed_get("/api/v3/account", &[]).await?;

        let balances = resp
            .balances
            .into_iter()
            .map(|b| {
                Balance::new(
                    b.asset,
                    Self::parse_decimal(&b.free),
                    Self::parse_decimal(&b.locked),
                )
            })
            .filter(|b| b.total() > Decimal::ZERO)
            .collect();

        Ok(AccountBalance::new(balances))
    }

    async fn create_order(&self, request: &OrderRequest) -> ExchangeResult<PlacedOrder> {
        let side = match request.side {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        };

        let mut params = vec![
            ("symbol".to_string(), Self::from_symbol(&request.symbol)),
            ("side".to_string(), side.to_string()),
        ];

        match (request.kind, request.price) {
            (OrderKind::Limit, Some(price)) => {
                params.push(("type".to_string(), "LIMIT".to_string()));
                params.push(("timeInForce".to_string(), "GTC".to_string()));
                params.push(("quantity".to_string(), request.amount.normalize().to_string()));
                params.push(("price".to_string(), price.normalize().to_string()));
            }
            (OrderKind::Limit, None) => {
                return Err(ExchangeError::OrderRejected(
                    "limit order requires a price".to_string(),
                ));
            }
            (OrderKind::Market, _) => {
                params.push(("type".to_string(), "MARKET".to_string()));
                params.push(("quantity".to_string(), request.amount.normalize().to_string()));
            }
        }

        if let Some(client_id) = &request.client_order_id {
            params.push(("newClientOrderId".to_string(), client_id.clone()));
        }

        for (key, value) in &request.params {
            if !params.iter().any(|(k, _)| k == key) {
                params.push((key.clone(), value.clone()));
            }
        }

        info!(
            symbol = %request.symbol,
            side = side,
            kind = %request.kind,
            amount = %request.amount,
            price = ?request.price,
            "Placing Binance order"
        );

        let resp: BinanceOrderResponse = self.signed_post("/api/v3/order", &params).await?;

        info!(order_id = resp.order_id, "Order placed successfully");
        Ok(Self::to_placed_order(request, resp))
    }

    async fn close(&self) -> ExchangeResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!(testnet = self.config.testnet, "Binance client closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use rust_decimal_macros::dec;

    fn test_client(base_url: &str) -> BinanceClient {
        let record = ExchangeCredentialRecord::new("binance", "test-api-key-1234", "test-secret")
            .with_option("base_url", base_url)
            .with_rate_limit(false);
        BinanceClient::from_record(&record, false).unwrap()
    }

    #[test]
    fn test_symbol_conversion() {
        assert_eq!(BinanceClient::from_symbol("BTC/USDT"), "BTCUSDT");
        assert_eq!(BinanceClient::from_symbol("eth-usdt"), "ETHUSDT");
    }

    #[test]
    fn test_sign() {
        let config = BinanceConfig::new(
            "vmPUZE6mv9SD5VNHk4HlWFsOr6aKE2zvsw0MuIgwCIPy6utIco14y7Ju91duEh8A",
            "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j",
        );
        let client = BinanceClient::new(config).unwrap();

        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            client.sign(query).unwrap(),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_config_from_record() {
        let record = ExchangeCredentialRecord::new("binance", "key", "very-secret-value")
            .with_option("testnet", true)
            .with_option("recv_window", 10000);
        let config = BinanceConfig::from_record(&record, false).unwrap();
        assert!(config.testnet);
        assert_eq!(config.rest_base_url(), TESTNET_URL);
        assert_eq!(config.recv_window, 10000);
        assert!(config.min_request_interval.is_some());
        assert!(!format!("{:?}", config).contains("very-secret-value"));

        let empty = ExchangeCredentialRecord::new("binance", "", "secret");
        assert!(matches!(
            BinanceConfig::from_record(&empty, false),
            Err(ExchangeError::InvalidCredentials(_))
        ));
    }

    #[test]
    fn test_map_error_code() {
        assert!(matches!(
            BinanceClient::map_error_code(-2015, "Invalid API-key"),
            ExchangeError::Unauthorized(_)
        ));
        assert!(matches!(
            BinanceClient::map_error_code(-1003, "Too many requests"),
            ExchangeError::RateLimited
        ));
        assert!(matches!(
            BinanceClient::map_error_code(-2010, "insufficient"),
            ExchangeError::InsufficientBalance(_)
        ));
        assert!(matches!(
            BinanceClient::map_error_code(-9999, "??"),
            ExchangeError::ApiError { code: -9999, .. }
        ));
    }

    #[tokio::test]
    async fn test_fetch_balance_filters_zero() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/account")
            .match_query(Matcher::Any)
            .match_header("X-MBX-APIKEY", "test-api-key-1234")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"balances":[
                    {"asset":"BTC","free":"0.5","locked":"0.1"},
                    {"asset":"ETH","free":"0.00000000","locked":"0.00000000"},
                    {"asset":"USDT","free":"1000.0","locked":"0"}
                ]}"#,
            )
            .create_async()
            .await;

        let client = test_client(&server.url());
        let account = client.fetch_balance().await.unwrap();

        mock.assert_async().await;
        assert_eq!(account.balances.len(), 2);
        assert_eq!(account.get("BTC").map(Balance::total), Some(dec!(0.6)));
        assert!(account.get("ETH").is_none());
    }

    #[tokio::test]
    async fn test_fetch_balance_unauthorized() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v3/account")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"code":-2015,"msg":"Invalid API-key, IP, or permissions for action."}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let err = client.fetch_balance().await.unwrap_err();
        assert!(err.is_auth_error());
    }

    #[tokio::test]
    async fn test_create_market_order() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v3/order")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("symbol=BTCUSDT".to_string()),
                Matcher::Regex("side=BUY".to_string()),
                Matcher::Regex("type=MARKET".to_string()),
                Matcher::Regex("quantity=0.01".to_string()),
                Matcher::Regex("signature=[0-9a-f]{64}".to_string()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"symbol":"BTCUSDT","orderId":123,"clientOrderId":"abc",
                    "transactTime":1700000000000,"price":"0.00000000","origQty":"0.01000000",
                    "executedQty":"0.01000000","cummulativeQuoteQty":"500.00000000",
                    "status":"FILLED","type":"MARKET","side":"BUY"}"#,
            )
            .create_async()
            .await;

        let client = test_client(&server.url());
        let request = OrderRequest::new("BTC/USDT", Side::Buy, dec!(0.01), None);
        let order = client.create_order(&request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(order.id, "123");
        assert_eq!(order.kind, OrderKind::Market);
        assert_eq!(order.status, OrderState::Filled);
        assert_eq!(order.average_price, Some(dec!(50000)));
        assert_eq!(order.symbol, "BTC/USDT");
    }

    #[tokio::test]
    async fn test_create_limit_order_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v3/order")
            .match_body(Matcher::Regex("type=LIMIT".to_string()))
            .with_status(400)
            .with_body(r#"{"code":-2010,"msg":"Account has insufficient balance for requested action."}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let request = OrderRequest::new("BTC/USDT", Side::Buy, dec!(1), Some(dec!(50000)));
        let err = client.create_order(&request).await.unwrap_err();
        assert!(matches!(err, ExchangeError::InsufficientBalance(_)));
    }

    #[tokio::test]
    async fn test_closed_client_rejects_calls() {
        let client = test_client("http://127.0.0.1:9");
        client.close().await.unwrap();
        assert!(matches!(
            client.fetch_balance().await,
            Err(ExchangeError::Closed)
        ));
    }
}
