//! Ad Escrow Server
//!
//! Runs the deal settlement engine: the scheduled publisher that posts due
//! ads, completes their deals and pays channel owners, plus health and
//! readiness endpoints.

mod config;
mod deal_events;
mod server;
mod shutdown;
mod state;

use adescrow_core::config::EngineConfig;
use adescrow_core::directory::PgDirectory;
use adescrow_core::events::deal_event_channel;
use adescrow_core::ledger::{Ed25519TransferSigner, TonCenterClient, TransferSigner};
use adescrow_core::processors::channel_publisher::TELEGRAM_API_BASE;
use adescrow_core::processors::{
    PayoutEngine, PayoutError, ScheduledPublisher, TelegramChannelPublisher,
};
use adescrow_core::state_machine::DealStateMachine;
use adescrow_core::store::PgDealStore;
use clap::Parser;
use config::{ConfigLoader, Secrets};
use server::{build_router, run_server};
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Ad Escrow - escrowed ad deal settlement engine
#[derive(Parser, Debug)]
#[command(name = "adescrow-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./adescrow.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Emit logs as JSON lines
    #[arg(long, default_value = "false")]
    log_json: bool,

    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,

    /// TonCenter API key
    #[arg(long, env = "TONCENTER_API_KEY", hide_env_values = true)]
    toncenter_api_key: Option<String>,

    /// 24-word mnemonic of the custodial wallet; payouts fail without it
    #[arg(long, env = "WALLET_MNEMONIC", hide_env_values = true)]
    wallet_mnemonic: Option<String>,

    /// Telegram bot token used to publish posts
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    bot_token: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    tracing::info!("Starting adescrow-server v{}", env!("CARGO_PKG_VERSION"));

    let secrets = Secrets {
        toncenter_api_key: args.toncenter_api_key,
        wallet_mnemonic: args.wallet_mnemonic,
        bot_token: args.bot_token,
    };
    let loaded_config = ConfigLoader::new(&args.config, args.listen)
        .load(secrets)
        .map_err(|e| {
            tracing::error!("Failed to load configuration: {}", e);
            e
        })?;
    tracing::info!("Configuration loaded from {:?}", args.config);
    let listen_addr = loaded_config.listen;
    let engine_config = loaded_config.engine;

    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&args.database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    let (events_tx, events_rx) = deal_event_channel();
    let event_logger = tokio::spawn(deal_events::log_deal_events(events_rx));

    let machine = DealStateMachine::new(Arc::new(PgDealStore::new(db_pool.clone())))
        .with_events(events_tx);
    let ledger = Arc::new(TonCenterClient::new(
        engine_config.ledger.api_base.clone(),
        engine_config.ledger.api_key.clone(),
    ));
    let retry = engine_config.retry.to_policy();
    let mut payouts = PayoutEngine::new(ledger.clone(), build_signer(&engine_config), retry);
    if payouts.is_configured() {
        match payouts.verify_signer().await {
            Ok(()) => {}
            Err(PayoutError::Configuration(reason)) => {
                tracing::error!(%reason, "Payout signer rejected, payouts are disabled");
                payouts = PayoutEngine::new(ledger.clone(), None, retry);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not verify the payout wallet key, continuing");
            }
        }
    }

    let publisher_handle = if engine_config.publisher.enabled {
        let bot_token = loaded_config.bot_token.ok_or_else(|| {
            anyhow::anyhow!("BOT_TOKEN must be set while the publisher is enabled")
        })?;
        let channel_publisher =
            TelegramChannelPublisher::new(bot_token, url::Url::parse(TELEGRAM_API_BASE)?);
        let publisher = ScheduledPublisher::new(
            machine.clone(),
            Arc::new(PgDirectory::new(db_pool.clone())),
            Arc::new(channel_publisher),
            payouts,
            engine_config.publisher.interval,
        );
        Some(publisher.start())
    } else {
        tracing::info!("Scheduled publisher disabled by configuration");
        None
    };

    let state = AppState::new(db_pool.clone(), ledger);
    let router = build_router(state);

    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    if let Some(handle) = publisher_handle {
        tracing::info!("Stopping scheduled publisher...");
        handle.stop().await;
    }
    // The logger ends once the last event sender is gone.
    drop(machine);
    if let Err(e) = event_logger.await {
        tracing::error!("Deal event logger failed: {}", e);
    }

    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Build the payout signer, or `None` when payouts cannot be signed.
///
/// Missing or unusable signing material does not stop the server; every
/// payout then fails with a configuration error instead.
fn build_signer(config: &EngineConfig) -> Option<Arc<dyn TransferSigner>> {
    let Some(mnemonic) = config.payout.mnemonic.as_deref() else {
        tracing::warn!("WALLET_MNEMONIC not set, payouts are disabled");
        return None;
    };
    match Ed25519TransferSigner::from_mnemonic(
        mnemonic,
        config.payout.wallet_scheme,
        config.ledger.custodial_address.clone(),
        config.payout.wallet_id,
    ) {
        Ok(signer) => {
            tracing::info!(
                wallet = %config.ledger.custodial_address,
                scheme = %config.payout.wallet_scheme,
                "Payout signer ready"
            );
            Some(Arc::new(signer))
        }
        Err(e) => {
            tracing::error!(error = %e, "Payout signer unusable, payouts are disabled");
            None
        }
    }
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
