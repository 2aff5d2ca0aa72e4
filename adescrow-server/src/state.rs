//! Application state shared across all request handlers.

use adescrow_core::ledger::LedgerClient;
use sqlx::PgPool;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Ledger client, pinged by the readiness check.
    pub ledger: Arc<dyn LedgerClient>,
}

impl AppState {
    pub fn new(db: PgPool, ledger: Arc<dyn LedgerClient>) -> Self {
        Self { db, ledger }
    }
}
