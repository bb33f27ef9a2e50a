use crate::client::LedgerClient;
use crate::config::RetryPolicy;
use crate::store::JsonLedgerStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<LedgerClient<JsonLedgerStore>>,
}

impl AppState {
    pub fn new(store: JsonLedgerStore, retry: RetryPolicy) -> Self {
        Self {
            ledger: Arc::new(LedgerClient::new(store, retry)),
        }
    }
}
