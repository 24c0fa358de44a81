//! Shared fixtures for service tests: a mocked JSON-RPC node and a recording notifier.

use crate::{
    models::{NetworkConfig, NewPayment, PaymentRecord, RawNetwork},
    services::{
        networks::NetworkRegistry,
        notify::{NotificationService, NotificationSettings, Notifier},
        rpc::RpcClient,
        store::{MemoryPaymentStore, PaymentStore},
        verifier::TransactionVerifier,
    },
};
use async_trait::async_trait;
use mockito::{Matcher, Mock, ServerGuard};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const MERCHANT: &str = "0x742d35cc6634c0532925a3b844bc9e7595f0bebb";
pub const PAYER: &str = "0x1111111111111111111111111111111111111111";

pub fn hash(n: u64) -> String {
    format!("0x{:064x}", n)
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, _to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((subject.to_string(), body.to_string()));
        Ok(())
    }
}

pub struct Harness {
    pub chain: ServerGuard,
    pub mocks: Vec<Mock>,
    pub registry: Arc<NetworkRegistry>,
    pub store: Arc<MemoryPaymentStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub notifications: NotificationService,
    pub verifier: Arc<TransactionVerifier>,
}

impl Harness {
    pub async fn new() -> Self {
        let chain = mockito::Server::new_async().await;
        let raw: RawNetwork = serde_json::from_value(json!({
            "chainId": 1,
            "name": "Ethereum",
            "symbol": "ETH",
            "rpc": chain.url(),
            "explorer": "https://etherscan.io",
            "merchant": MERCHANT,
            "coingecko_id": "ethereum",
        }))
        .unwrap();
        let registry = Arc::new(NetworkRegistry::from_raw(vec![raw]).unwrap());

        let store = Arc::new(MemoryPaymentStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let notifications = NotificationService::new(
            notifier.clone(),
            NotificationSettings {
                to: "ops@example.com".to_string(),
                on_confirmed: true,
                on_failed: true,
            },
        );
        let verifier = Arc::new(TransactionVerifier::new(
            registry.clone(),
            RpcClient::new(Duration::from_secs(2)).unwrap(),
            store.clone(),
            notifications.clone(),
        ));

        Self {
            chain,
            mocks: Vec::new(),
            registry,
            store,
            notifier,
            notifications,
            verifier,
        }
    }

    pub fn network(&self) -> &NetworkConfig {
        self.registry.get(1).unwrap()
    }

    async fn rpc_result(&mut self, method: &str, tx_hash: &str, result: serde_json::Value) {
        let body = json!({"jsonrpc": "2.0", "id": 1, "result": result}).to_string();
        let mock = self
            .chain
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({
                "method": method,
                "params": [tx_hash],
            })))
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;
        self.mocks.push(mock);
    }

    pub async fn receipt(&mut self, tx_hash: &str, status: &str) {
        self.rpc_result(
            "eth_getTransactionReceipt",
            tx_hash,
            json!({"transactionHash": tx_hash, "status": status}),
        )
        .await;
    }

    pub async fn no_receipt(&mut self, tx_hash: &str) {
        self.rpc_result("eth_getTransactionReceipt", tx_hash, serde_json::Value::Null)
            .await;
    }

    pub async fn transaction(&mut self, tx_hash: &str, to: &str, value: &str) {
        self.rpc_result(
            "eth_getTransactionByHash",
            tx_hash,
            json!({"hash": tx_hash, "from": PAYER, "to": to, "value": value}),
        )
        .await;
    }

    pub async fn record(&self, expected: &str, tx_hash: Option<&str>) -> PaymentRecord {
        self.store
            .insert(NewPayment {
                quote_id: "quote".to_string(),
                chain_id: 1,
                merchant_address: MERCHANT.to_string(),
                expected_amount_minor_units: expected.to_string(),
                tx_hash: tx_hash.map(str::to_string),
                payer_address: None,
            })
            .await
            .unwrap()
    }
}
