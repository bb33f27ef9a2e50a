pub mod app;
pub mod client;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod state;
pub mod storage;
pub mod store;
pub mod summary;

pub use app::router;
pub use client::LedgerClient;
pub use config::Config;
pub use errors::{AppError, LedgerError};
pub use state::AppState;
pub use storage::load_data;
pub use store::{JsonLedgerStore, LedgerStore};
