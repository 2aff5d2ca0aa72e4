use sqlx::PgPool;

/// Executes kanau `Processor` queries against the connection pool.
#[derive(Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}
