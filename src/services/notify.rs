use crate::models::{NetworkConfig, NotificationKind, PaymentRecord};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Outbound channel for merchant notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Writes notifications to the log. Used when no webhook is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        tracing::info!(to, subject, body, "Notification");
        Ok(())
    }
}

/// Posts notifications as JSON to a webhook (mail relay, chat hook, ...).
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build webhook HTTP client")?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let response = self
            .http
            .post(&self.url)
            .json(&json!({ "to": to, "subject": subject, "body": body }))
            .send()
            .await
            .context("Webhook request failed")?;

        if !response.status().is_success() {
            bail!("Webhook returned {}", response.status());
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct NotificationSettings {
    pub to: String,
    pub on_confirmed: bool,
    pub on_failed: bool,
}

impl NotificationSettings {
    pub fn enabled(&self, kind: NotificationKind) -> bool {
        match kind {
            NotificationKind::Confirmed => self.on_confirmed,
            NotificationKind::Failed => self.on_failed,
        }
    }
}

pub fn compose(
    kind: NotificationKind,
    record: &PaymentRecord,
    network: &NetworkConfig,
    tx_hash: &str,
) -> (String, String) {
    let id = record.record_id;
    let (label, headline) = match kind {
        NotificationKind::Confirmed => ("CONFIRMED", "payment confirmed"),
        NotificationKind::Failed => ("FAILED", "payment failed on-chain"),
    };

    let subject = format!("[chainpay] Payment {} for record #{}", label, id);
    let mut body = format!(
        "Record #{} {}.\n\nNetwork: {} ({})\nTx: {}\n",
        id, headline, network.name, network.chain_id, tx_hash
    );
    if let Some(url) = network.explorer_tx_url(tx_hash) {
        body.push_str(&format!("Explorer: {}\n", url));
    }
    (subject, body)
}

/// Sends one-time payment notifications. Delivery failures are logged, never returned.
#[derive(Clone)]
pub struct NotificationService {
    notifier: Arc<dyn Notifier>,
    settings: NotificationSettings,
}

impl NotificationService {
    pub fn new(notifier: Arc<dyn Notifier>, settings: NotificationSettings) -> Self {
        Self { notifier, settings }
    }

    /// The flag to claim in the store for `kind`, or `None` when that kind is switched off.
    pub fn claim(&self, kind: NotificationKind) -> Option<NotificationKind> {
        self.settings.enabled(kind).then_some(kind)
    }

    pub async fn deliver(
        &self,
        kind: NotificationKind,
        record: &PaymentRecord,
        network: &NetworkConfig,
        tx_hash: &str,
    ) {
        let (subject, body) = compose(kind, record, network, tx_hash);
        let record_id = record.record_id;
        match self.notifier.send(&self.settings.to, &subject, &body).await {
            Ok(()) => tracing::info!(record_id, ?kind, "Notification sent"),
            Err(e) => tracing::warn!(record_id, ?kind, "Notification failed: {:#}", e),
        }
    }
}
