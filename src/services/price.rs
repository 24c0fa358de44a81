use crate::services::cache::CacheService;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_COINGECKO_URL: &str = "https://api.coingecko.com";
pub const DEFAULT_CRYPTOCOMPARE_URL: &str = "https://min-api.cryptocompare.com";

/// A fiat price feed for native assets.
#[async_trait]
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Price of one unit of the asset in `fiat`, or `None` when the feed has no usable answer.
    async fn fetch(&self, feed_id: &str, symbol: &str, fiat: &str) -> Option<f64>;
}

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build price HTTP client")
}

fn usable(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

fn positive(value: &Value) -> Option<f64> {
    let price = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    usable(price).then_some(price)
}

async fn get_json(http: &reqwest::Client, url: &str, query: &[(&str, &str)]) -> Option<Value> {
    let response = http.get(url).query(query).send().await.ok()?;
    if !response.status().is_success() {
        return None;
    }
    response.json().await.ok()
}

/// CoinGecko simple-price, keyed by the CoinGecko asset id.
pub struct CoinGeckoSource {
    http: reqwest::Client,
    base_url: String,
}

impl CoinGeckoSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PriceSource for CoinGeckoSource {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    async fn fetch(&self, feed_id: &str, _symbol: &str, fiat: &str) -> Option<f64> {
        let feed_id = feed_id.to_ascii_lowercase();
        let fiat = fiat.to_ascii_lowercase();
        let url = format!("{}/api/v3/simple/price", self.base_url);
        let query = [("ids", feed_id.as_str()), ("vs_currencies", fiat.as_str())];
        let body = get_json(&self.http, &url, &query).await?;
        positive(body.get(&feed_id)?.get(&fiat)?)
    }
}

/// CryptoCompare single-symbol price, keyed by ticker symbol.
pub struct CryptoCompareSource {
    http: reqwest::Client,
    base_url: String,
}

impl CryptoCompareSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PriceSource for CryptoCompareSource {
    fn name(&self) -> &'static str {
        "cryptocompare"
    }

    async fn fetch(&self, _feed_id: &str, symbol: &str, fiat: &str) -> Option<f64> {
        let symbol = symbol.to_ascii_uppercase();
        let fiat = fiat.to_ascii_uppercase();
        let url = format!("{}/data/price", self.base_url);
        let query = [("fsym", symbol.as_str()), ("tsyms", fiat.as_str())];
        let body = get_json(&self.http, &url, &query).await?;
        positive(body.get(&fiat)?)
    }
}

/// Best-effort fiat price lookup over an ordered list of sources with a short TTL cache.
pub struct PriceOracle {
    sources: Vec<Box<dyn PriceSource>>,
    cache: CacheService,
}

impl PriceOracle {
    pub fn new(sources: Vec<Box<dyn PriceSource>>, cache: CacheService) -> Self {
        Self { sources, cache }
    }

    pub async fn price_of(&self, feed_id: &str, symbol: &str, fiat: &str) -> Option<f64> {
        let key = format!(
            "{}:{}:{}",
            feed_id.to_ascii_lowercase(),
            symbol.to_ascii_lowercase(),
            fiat.to_ascii_lowercase()
        );

        if let Some(price) = self.cache.get::<f64>(&key).await.ok().flatten() {
            if usable(price) {
                return Some(price);
            }
        }

        for source in &self.sources {
            match source.fetch(feed_id, symbol, fiat).await.filter(|p| usable(*p)) {
                Some(price) => {
                    tracing::debug!(source = source.name(), feed_id, fiat, price, "Price fetched");
                    if let Err(e) = self.cache.set(&key, &price).await {
                        tracing::warn!("Failed to cache price: {}", e);
                    }
                    return Some(price);
                }
                None => {
                    tracing::warn!(
                        source = source.name(),
                        feed_id,
                        fiat,
                        "Price source unavailable"
                    );
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const TIMEOUT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn test_coingecko_parses_nested_value() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v3/simple/price")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("ids".into(), "ethereum".into()),
                Matcher::UrlEncoded("vs_currencies".into(), "usd".into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(r#"{"ethereum":{"usd":2500.25}}"#)
            .create_async()
            .await;

        let source = CoinGeckoSource::new(&server.url(), TIMEOUT).unwrap();
        assert_eq!(source.fetch("ethereum", "ETH", "USD").await, Some(2500.25));
    }

    #[tokio::test]
    async fn test_falls_back_and_caches() {
        let mut primary = mockito::Server::new_async().await;
        let primary_mock = primary
            .mock("GET", "/api/v3/simple/price")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ethereum":{"usd":0}}"#)
            .expect(1)
            .create_async()
            .await;

        let mut secondary = mockito::Server::new_async().await;
        let secondary_mock = secondary
            .mock("GET", "/data/price")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("fsym".into(), "ETH".into()),
                Matcher::UrlEncoded("tsyms".into(), "USD".into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(r#"{"USD":2400.5}"#)
            .expect(1)
            .create_async()
            .await;

        let sources: Vec<Box<dyn PriceSource>> = vec![
            Box::new(CoinGeckoSource::new(&primary.url(), TIMEOUT).unwrap()),
            Box::new(CryptoCompareSource::new(&secondary.url(), TIMEOUT).unwrap()),
        ];
        let oracle = PriceOracle::new(
            sources,
            CacheService::memory_only("price", Duration::from_secs(60)),
        );

        assert_eq!(oracle.price_of("ethereum", "ETH", "USD").await, Some(2400.5));
        assert_eq!(oracle.price_of("ethereum", "ETH", "usd").await, Some(2400.5));

        primary_mock.assert_async().await;
        secondary_mock.assert_async().await;
    }

    struct Counting {
        calls: Arc<AtomicUsize>,
        answer: Option<f64>,
    }

    fn counting(calls: &Arc<AtomicUsize>, answer: Option<f64>) -> Box<dyn PriceSource> {
        Box::new(Counting {
            calls: calls.clone(),
            answer,
        })
    }

    #[async_trait]
    impl PriceSource for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn fetch(&self, _: &str, _: &str, _: &str) -> Option<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer
        }
    }

    #[tokio::test]
    async fn test_all_sources_fail() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sources: Vec<Box<dyn PriceSource>> = vec![
            counting(&calls, None),
            counting(&calls, None),
        ];
        let oracle = PriceOracle::new(
            sources,
            CacheService::memory_only("price", Duration::from_secs(60)),
        );

        assert!(oracle.price_of("ethereum", "ETH", "USD").await.is_none());
        assert!(oracle.price_of("ethereum", "ETH", "USD").await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_unusable_source_price_falls_through() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sources: Vec<Box<dyn PriceSource>> = vec![
            counting(&calls, Some(0.0)),
            counting(&calls, Some(-1.0)),
            counting(&calls, Some(f64::NAN)),
        ];
        let oracle = PriceOracle::new(
            sources,
            CacheService::memory_only("price", Duration::from_secs(60)),
        );
        assert!(oracle.price_of("ethereum", "ETH", "USD").await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let sources: Vec<Box<dyn PriceSource>> = vec![
            counting(&calls, Some(-5.0)),
            counting(&calls, Some(1850.0)),
        ];
        let oracle = PriceOracle::new(
            sources,
            CacheService::memory_only("price", Duration::from_secs(60)),
        );
        assert_eq!(oracle.price_of("ethereum", "ETH", "USD").await, Some(1850.0));
        assert_eq!(oracle.price_of("ethereum", "ETH", "USD").await, Some(1850.0));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_positive_filter() {
        assert_eq!(positive(&serde_json::json!(12.5)), Some(12.5));
        assert_eq!(positive(&serde_json::json!("3.5")), Some(3.5));
        assert!(positive(&serde_json::json!(-1)).is_none());
        assert!(positive(&serde_json::json!("abc")).is_none());
        assert!(positive(&serde_json::json!(null)).is_none());
    }
}
