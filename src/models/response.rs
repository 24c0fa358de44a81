use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub redis: bool,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

/// Metadata of the most recent reconciliation run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub ran_at: DateTime<Utc>,
    pub ok: bool,
    pub message: String,
    pub checked: u32,
    pub confirmed: u32,
    pub failed: u32,
    pub cancelled: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RpcHealth {
    pub chain_id: u64,
    pub name: String,
    pub ok: bool,
    pub latency_ms: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PricingHealth {
    pub ok: bool,
    pub label: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub reconcile_enabled: bool,
    pub reconcile_interval_minutes: u64,
    pub last_run: Option<RunReport>,
    pub pending_count: usize,
    pub stale_count: usize,
    pub rpc: Vec<RpcHealth>,
    pub pricing: PricingHealth,
    pub timestamp: DateTime<Utc>,
}
