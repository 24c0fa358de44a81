use crate::codec;
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// A supported chain, validated once at load time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub name: String,
    pub native_symbol: String,
    #[serde(skip_serializing)]
    pub rpc_endpoints: Vec<Url>,
    pub explorer_base_url: Option<String>,
    pub merchant_address: String,
    pub price_feed_id: String,
}

impl NetworkConfig {
    /// Explorer link for a transaction, when an explorer is configured and the hash is usable.
    pub fn explorer_tx_url(&self, tx_hash: &str) -> Option<String> {
        let base = self.explorer_base_url.as_deref()?;
        let hash = codec::sanitize_hex(tx_hash)?;
        Some(format!("{}/tx/{}", base, hash))
    }
}

/// Network entry as written in configuration. `rpc` may be a single URL or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNetwork {
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub rpc: Option<RpcList>,
    #[serde(default)]
    pub explorer: Option<String>,
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(default, rename = "coingecko_id", alias = "coingeckoId")]
    pub coingecko_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RpcList {
    One(String),
    Many(Vec<String>),
}

impl RpcList {
    fn into_vec(self) -> Vec<String> {
        match self {
            RpcList::One(url) => vec![url],
            RpcList::Many(urls) => urls,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkConfigError {
    #[error("network entry is missing `{0}`")]
    MissingField(&'static str),

    #[error("chain {chain_id}: merchant address `{address}` is not a 20-byte hex address")]
    InvalidMerchant { chain_id: u64, address: String },

    #[error("chain {0}: no usable RPC endpoint")]
    NoRpcEndpoints(u64),
}

impl TryFrom<RawNetwork> for NetworkConfig {
    type Error = NetworkConfigError;

    fn try_from(raw: RawNetwork) -> Result<Self, Self::Error> {
        let chain_id = raw
            .chain_id
            .filter(|id| *id > 0)
            .ok_or(NetworkConfigError::MissingField("chainId"))?;
        let name = non_empty(raw.name).ok_or(NetworkConfigError::MissingField("name"))?;
        let native_symbol =
            non_empty(raw.symbol).ok_or(NetworkConfigError::MissingField("symbol"))?;
        let price_feed_id = non_empty(raw.coingecko_id)
            .ok_or(NetworkConfigError::MissingField("coingecko_id"))?;
        let merchant = non_empty(raw.merchant).ok_or(NetworkConfigError::MissingField("merchant"))?;

        let merchant_address = codec::normalize_address(&merchant).ok_or_else(|| {
            NetworkConfigError::InvalidMerchant {
                chain_id,
                address: merchant.clone(),
            }
        })?;

        let rpc_endpoints: Vec<Url> = raw
            .rpc
            .map(RpcList::into_vec)
            .unwrap_or_default()
            .iter()
            .map(|url| url.trim())
            .filter(|url| !url.is_empty())
            .filter_map(|url| Url::parse(url).ok())
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .collect();
        if rpc_endpoints.is_empty() {
            return Err(NetworkConfigError::NoRpcEndpoints(chain_id));
        }

        let explorer_base_url = non_empty(raw.explorer)
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        Ok(Self {
            chain_id,
            name,
            native_symbol,
            rpc_endpoints,
            explorer_base_url,
            merchant_address,
            price_feed_id: price_feed_id.to_ascii_lowercase(),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Built-in network list used when configuration does not provide one.
pub fn default_networks(merchant: &str) -> Vec<RawNetwork> {
    let entry = |chain_id, name, symbol, rpc: &[&str], explorer, feed| RawNetwork {
        merchant: Some(merchant.to_string()),
        ..preset(chain_id, name, symbol, rpc, explorer, feed)
    };

    vec![
        entry(
            1,
            "Ethereum",
            "ETH",
            &["https://cloudflare-eth.com"],
            "https://etherscan.io",
            "ethereum",
        ),
        entry(
            56,
            "BSC",
            "BNB",
            &["https://bsc-dataseed.binance.org", "https://bsc-rpc.publicnode.com"],
            "https://bscscan.com",
            "binancecoin",
        ),
        entry(
            137,
            "Polygon",
            "MATIC",
            &["https://polygon-rpc.com", "https://polygon-bor-rpc.publicnode.com"],
            "https://polygonscan.com",
            "matic-network",
        ),
        entry(
            43114,
            "Avalanche",
            "AVAX",
            &[
                "https://api.avax.network/ext/bc/C/rpc",
                "https://avalanche-c-chain-rpc.publicnode.com",
            ],
            "https://snowtrace.io",
            "avalanche-2",
        ),
    ]
}

fn preset(
    chain_id: u64,
    name: &str,
    symbol: &str,
    rpc: &[&str],
    explorer: &str,
    feed: &str,
) -> RawNetwork {
    RawNetwork {
        chain_id: Some(chain_id),
        name: Some(name.to_string()),
        symbol: Some(symbol.to_string()),
        rpc: Some(RpcList::Many(rpc.iter().map(|u| u.to_string()).collect())),
        explorer: Some(explorer.to_string()),
        merchant: None,
        coingecko_id: Some(feed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MERCHANT: &str = "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEbb";

    fn parse(value: serde_json::Value) -> Result<NetworkConfig, NetworkConfigError> {
        let raw: RawNetwork = serde_json::from_value(value).unwrap();
        NetworkConfig::try_from(raw)
    }

    #[test]
    fn test_parse_single_rpc_string() {
        let network = parse(json!({
            "chainId": 1,
            "name": "Ethereum",
            "symbol": "ETH",
            "rpc": "https://rpc.example.org",
            "explorer": "https://etherscan.io/",
            "merchant": MERCHANT,
            "coingecko_id": "ethereum"
        }))
        .unwrap();

        assert_eq!(network.rpc_endpoints.len(), 1);
        assert_eq!(network.merchant_address, MERCHANT.to_lowercase());
        assert_eq!(network.explorer_base_url.as_deref(), Some("https://etherscan.io"));
    }

    #[test]
    fn test_rejects_incomplete_entries() {
        let missing_feed = parse(json!({
            "chainId": 56, "name": "BSC", "symbol": "BNB",
            "rpc": ["https://bsc.example.org"], "merchant": MERCHANT
        }));
        assert_eq!(missing_feed, Err(NetworkConfigError::MissingField("coingecko_id")));

        let placeholder_merchant = parse(json!({
            "chainId": 56, "name": "BSC", "symbol": "BNB", "coingecko_id": "binancecoin",
            "rpc": ["https://bsc.example.org"], "merchant": "0xYourBscAddress"
        }));
        assert!(matches!(
            placeholder_merchant,
            Err(NetworkConfigError::InvalidMerchant { chain_id: 56, .. })
        ));

        let no_rpc = parse(json!({
            "chainId": 56, "name": "BSC", "symbol": "BNB", "coingecko_id": "binancecoin",
            "rpc": ["", "not a url"], "merchant": MERCHANT
        }));
        assert_eq!(no_rpc, Err(NetworkConfigError::NoRpcEndpoints(56)));
    }

    #[test]
    fn test_explorer_tx_url() {
        let network = NetworkConfig::try_from(default_networks(MERCHANT).remove(0)).unwrap();
        let hash = format!("0x{}", "AA".repeat(32));
        assert_eq!(
            network.explorer_tx_url(&hash),
            Some(format!("https://etherscan.io/tx/0x{}", "aa".repeat(32)))
        );
        assert_eq!(network.explorer_tx_url("not-a-hash"), None);
    }
}
