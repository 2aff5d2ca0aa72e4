//! Axum server setup and router configuration.

use crate::shutdown::shutdown_signal;
use crate::state::AppState;
use axum::{
    Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get,
};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Simple health check - returns OK if the server is running.
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Ready check response.
#[derive(Serialize)]
struct ReadyResponse {
    status: &'static str,
    database: &'static str,
    ledger: &'static str,
}

/// Readiness: the database answers and the ledger API is reachable.
async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    let database_ok = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check: database unavailable");
            false
        }
    };
    let ledger_ok = state.ledger.is_reachable().await;

    let ready = database_ok && ledger_ok;
    let body = ReadyResponse {
        status: if ready { "ready" } else { "not_ready" },
        database: if database_ok { "ok" } else { "unavailable" },
        ledger: if ledger_ok { "ok" } else { "unreachable" },
    };
    let code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(body))
}

/// Run the server with graceful shutdown support.
pub async fn run_server(router: Router, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}
