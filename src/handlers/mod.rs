pub mod admin;
pub mod health;
pub mod payments;
pub mod quote;
pub mod status;

pub use admin::*;
pub use health::*;
pub use payments::*;
pub use quote::*;
pub use status::*;

use crate::services::{
    CacheService, NetworkRegistry, PaymentService, PaymentStore, PriceOracle, QuoteBuilder,
    Reconciler, ReconciliationState, RpcClient,
};
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<NetworkRegistry>,
    pub quotes: Arc<QuoteBuilder>,
    pub payments: Arc<PaymentService>,
    pub store: Arc<dyn PaymentStore>,
    pub oracle: Arc<PriceOracle>,
    pub rpc: RpcClient,
    pub reconciler: Arc<Reconciler>,
    pub reconcile_state: Arc<ReconciliationState>,
    pub cache: Arc<CacheService>,
    pub started_at: Instant,
}
