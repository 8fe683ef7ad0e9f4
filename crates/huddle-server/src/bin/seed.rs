//! Create the demo tenant in the configured database.

use tracing::info;

use huddle_api::Config;
use huddle_api::seed::seed_demo;
use huddle_crypto::CredentialStore;
use huddle_db::Database;

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "huddle=info,huddle_api=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    let db = Database::open(&config.db_path)?;
    let credentials = CredentialStore::recommended()?;

    if seed_demo(&db, &credentials)? {
        info!("Demo data written to {}", config.db_path.display());
    }

    Ok(())
}
