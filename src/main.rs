use anyhow::Result;
use chainpay::{
    app::build_router,
    config::Config,
    handlers::AppState,
    middleware::{create_rate_limiter, AdminToken},
    services::{cache::connect_redis, *},
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    tracing::info!("Starting chainpay v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {:?}", config.environment);

    // Initialize services
    let redis = connect_redis(config.redis_url.as_deref()).await;
    let health_cache = Arc::new(CacheService::new(
        redis.clone(),
        "health",
        config.price_cache_ttl,
    ));

    let registry = Arc::new(NetworkRegistry::from_raw(config.networks.clone())?);
    let rpc = RpcClient::new(config.rpc_timeout)?;

    let sources: Vec<Box<dyn PriceSource>> = vec![
        Box::new(CoinGeckoSource::new(&config.coingecko_url, config.price_timeout)?),
        Box::new(CryptoCompareSource::new(&config.cryptocompare_url, config.price_timeout)?),
    ];
    let oracle = Arc::new(PriceOracle::new(
        sources,
        CacheService::new(redis.clone(), "price", config.price_cache_ttl),
    ));

    let signer = match &config.quote_signing_secret {
        Some(secret) => QuoteSigner::new(secret.as_bytes()),
        None => {
            tracing::warn!("QUOTE_SIGNING_SECRET not set; quote signatures end with this process");
            QuoteSigner::ephemeral()
        }
    };
    let quotes = Arc::new(QuoteBuilder::new(
        registry.clone(),
        oracle.clone(),
        CacheService::new(redis, "quote", config.quote.ttl),
        config.quote.clone(),
        signer,
    ));

    let store: Arc<dyn PaymentStore> = Arc::new(MemoryPaymentStore::new());

    let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url, config.price_timeout)?),
        None => Arc::new(LogNotifier),
    };
    let notifications = NotificationService::new(notifier, config.notify.clone());

    let verifier = Arc::new(TransactionVerifier::new(
        registry.clone(),
        rpc.clone(),
        store.clone(),
        notifications,
    ));
    let payments = Arc::new(PaymentService::new(
        registry.clone(),
        quotes.clone(),
        store.clone(),
        verifier.clone(),
    ));

    let reconcile_state = Arc::new(ReconciliationState::new());
    let reconciler = Arc::new(Reconciler::new(
        store.clone(),
        verifier,
        config.reconcile.clone(),
        reconcile_state.clone(),
    ));

    // Build application state
    let app_state = AppState {
        registry,
        quotes,
        payments,
        store,
        oracle,
        rpc,
        reconciler: reconciler.clone(),
        reconcile_state,
        cache: health_cache,
        started_at: Instant::now(),
    };

    let app = build_router(
        app_state,
        create_rate_limiter(config.rate_limit_per_second, config.rate_limit_burst),
        AdminToken::new(config.admin_token.clone()),
    );

    // Background reconciliation
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reconcile_task = tokio::spawn(reconciler.run_forever(shutdown_rx));

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = reconcile_task.await {
        tracing::warn!("Reconciliation task ended abnormally: {}", e);
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl+c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down gracefully...");
}
