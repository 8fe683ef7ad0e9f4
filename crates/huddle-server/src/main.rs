use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use huddle_api::{AppState, AppStateInner, Config, router, session};
use huddle_crypto::CredentialStore;
use huddle_db::Database;

/// Expired sessions are swept once an hour.
const SESSION_SWEEP_SECS: u64 = 3600;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "huddle=debug,huddle_api=debug,huddle_gateway=debug,tower_http=debug".into()
            }),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {:#}", e);
            eprintln!("       Check your .env file and restart.");
            std::process::exit(1);
        }
    };

    let db = Arc::new(Database::open(&config.db_path)?);
    let credentials = CredentialStore::recommended()?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        "Huddle starting in {:?} mode (db: {}, uploads: {})",
        config.mode,
        config.db_path.display(),
        config.upload_dir.display()
    );

    let state: AppState = Arc::new(AppStateInner::new(db.clone(), credentials, config)?);
    tokio::spawn(session::run_sweeper(db, SESSION_SWEEP_SECS));

    let app = router::build(state);

    info!("Huddle server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
