pub mod cache;
pub mod networks;
pub mod notify;
pub mod payments;
pub mod price;
pub mod quote;
pub mod reconcile;
pub mod replay;
pub mod rpc;
pub mod signing;
pub mod store;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::CacheService;
pub use networks::NetworkRegistry;
pub use notify::{
    LogNotifier, NotificationService, NotificationSettings, Notifier, WebhookNotifier,
};
pub use payments::PaymentService;
pub use price::{CoinGeckoSource, CryptoCompareSource, PriceOracle, PriceSource};
pub use quote::{QuoteBuilder, QuoteSettings};
pub use reconcile::{CancelPolicy, ReconcileSettings, Reconciler, ReconciliationState};
pub use replay::AntiReplayGuard;
pub use rpc::RpcClient;
pub use signing::{QuoteClaims, QuoteSigner};
pub use store::{MemoryPaymentStore, PaymentStore, StoreError};
pub use verifier::TransactionVerifier;
