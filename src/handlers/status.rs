use crate::{
    error::ChainPayError,
    handlers::AppState,
    models::{PricingHealth, RpcHealth, SystemStatus},
};
use axum::{extract::State, Json};
use chrono::Utc;
use futures::future::join_all;
use std::time::Instant;

const STATUS_PENDING_LIMIT: usize = 50;

pub async fn system_status(
    State(state): State<AppState>,
) -> Result<Json<SystemStatus>, ChainPayError> {
    let now = Utc::now();
    let settings = state.reconciler.settings();

    let pending = state.store.list_pending(None, STATUS_PENDING_LIMIT).await?;
    let stale_count = pending
        .iter()
        .filter(|record| settings.is_stale(record, now))
        .count();

    let probes = state.registry.all().map(|network| {
        let rpc = state.rpc.clone();
        async move {
            let started = Instant::now();
            let ok = rpc.chain_id(&network.rpc_endpoints).await.is_some();
            RpcHealth {
                chain_id: network.chain_id,
                name: network.name.clone(),
                ok,
                latency_ms: started.elapsed().as_millis() as u64,
            }
        }
    });
    let rpc = join_all(probes).await;

    let pricing = match state.registry.first() {
        Some(network) => {
            let fiat = &state.quotes.settings().fiat_currency;
            match state
                .oracle
                .price_of(&network.price_feed_id, &network.native_symbol, fiat)
                .await
            {
                Some(price) => PricingHealth {
                    ok: true,
                    label: format!("{}/{} = {}", network.native_symbol, fiat, price),
                },
                None => PricingHealth {
                    ok: false,
                    label: format!("{}/{} unavailable", network.native_symbol, fiat),
                },
            }
        }
        None => PricingHealth {
            ok: false,
            label: "No network configured".to_string(),
        },
    };

    Ok(Json(SystemStatus {
        reconcile_enabled: settings.enabled,
        reconcile_interval_minutes: settings.interval_minutes,
        last_run: state.reconcile_state.last().await,
        pending_count: pending.len(),
        stale_count,
        rpc,
        pricing,
        timestamp: now,
    }))
}
