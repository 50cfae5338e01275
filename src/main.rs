//! Single-mode binary entrypoint: launches the full engine plus its HTTP
//! control plane. No flags beyond environment variables.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, watch, RwLock};

use regime_engine::config::{Credentials, EngineConfig, HttpConfig};
use regime_engine::engine::Engine;
use regime_engine::error::{EngineError, Result};
use regime_engine::http::AppState;
use regime_engine::ingest::IngestSupervisor;
use regime_engine::logging::{LogLevel, StatefulLogger};
use regime_engine::notifier::{NotificationSink, NullSink, TelegramSink};
use regime_engine::scheduler::{Scheduler, WorkerContext};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    match run().await {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            tracing::error!(error = %err, "fatal error during startup or run, exiting");
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<()> {
    let credentials = Credentials::from_env()
        .map_err(|e| EngineError::Fatal(format!("credential loading failed: {e}")))?;
    let engine_config = EngineConfig::from_env();
    let http_config = HttpConfig::from_env()
        .map_err(|e| EngineError::Fatal(format!("HTTP config loading failed: {e}")))?;

    tracing::info!(symbol = %engine_config.symbol, "starting regime engine");

    let logger = Arc::new(
        StatefulLogger::new(LogLevel::Info).with_file_sink(PathBuf::from("./logs"), 10 * 1024 * 1024, 30),
    );

    let worker_ctx = WorkerContext {
        balance_api_key: Some(Arc::from(credentials.balance_provider_api_key.expose_secret())),
        ..Default::default()
    };
    let scheduler = Scheduler::new(4, worker_ctx);

    let notifier: Arc<dyn NotificationSink> =
        match (&credentials.telegram_bot_token, &credentials.telegram_chat_id) {
            (Some(token), Some(chat_id)) => Arc::new(TelegramSink::new(
                token.clone(),
                chat_id.clone(),
                reqwest::Client::new(),
            )),
            _ => {
                tracing::warn!("TELEGRAM_BOT_TOKEN not set, notifications will be dropped");
                Arc::new(NullSink)
            }
        };

    let (book_tx, book_rx) = mpsc::channel(256);
    let (derivatives_tx, derivatives_rx) = mpsc::channel(256);

    let (ingest, whale_rx) = IngestSupervisor::new(
        &engine_config.symbol,
        "wss://stream.binance.com:9443",
        "https://api.binance.com",
        &engine_config.derivatives_venues,
        book_tx,
        derivatives_tx,
    );
    let whale_sender = ingest.whale_intake.sender();
    let ingest = Arc::new(ingest);

    let engine = Engine::initialize(engine_config, logger, scheduler, notifier, Arc::clone(&ingest));

    engine.start(book_rx, derivatives_rx, whale_rx).await;

    let engine_slot = Arc::new(RwLock::new(Some(Arc::clone(&engine))));
    let app_state = AppState::new(
        Arc::clone(&engine_slot),
        whale_sender,
        credentials.webhook_security_token.clone(),
        http_config.rate_limit,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let http_addr = http_config.addr;
    let http_server = tokio::spawn(regime_engine::http::serve(http_addr, app_state, shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| EngineError::Fatal(format!("failed to listen for shutdown signal: {e}")))?;
    tracing::info!("received shutdown signal, stopping gracefully");
    let _ = shutdown_tx.send(true);

    engine.shutdown().await;

    match http_server.await {
        Ok(inner) => inner?,
        Err(e) => return Err(EngineError::Fatal(format!("HTTP control plane task panicked: {e}"))),
    }

    tracing::info!("shutdown complete");
    Ok(())
}
