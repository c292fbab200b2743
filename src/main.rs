//! KANTOR — multi-currency wallet and exchange service
//!
//! Entry point. Loads configuration, initialises structured logging,
//! opens the SQLite database and serves the HTTP API until Ctrl+C.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use kantor::api;
use kantor::auth::TokenKeys;
use kantor::config;
use kantor::rates::exchangerate_api::ExchangeRateApiClient;
use kantor::rates::RateProvider;
use kantor::storage::Store;
use kantor::wallet::WalletService;

const BANNER: &str = r#"
 _  __    _    _   _ _____ ___  ____
| |/ /   / \  | \ | |_   _/ _ \|  _ \
| ' /   / _ \ |  \| | | || | | | |_) |
| . \  / ___ \| |\  | | || |_| |  _ <
|_|\_\/_/   \_\_| \_| |_| \___/|_| \_\

  Multi-currency wallet & exchange service
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    let config_path = std::env::var("KANTOR_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let cfg = config::AppConfig::load_or_default(&config_path)?;

    println!("{BANNER}");
    info!(
        port = cfg.server.port,
        database = %cfg.database.path,
        rates = %cfg.rates.base_url,
        "KANTOR starting up"
    );

    let store = Store::open(&cfg.database.path)
        .await
        .with_context(|| format!("Failed to open database {}", cfg.database.path))?;

    let rates: Arc<dyn RateProvider> =
        Arc::new(ExchangeRateApiClient::new(&cfg.rates.base_url, cfg.rates.timeout_secs)?);

    let tokens = TokenKeys::new(&cfg.jwt_secret(), cfg.auth.token_ttl_secs);
    let service = Arc::new(WalletService::new(store, rates, tokens, cfg.auth.bcrypt_cost));

    api::serve(service, cfg.listen_addr()?).await?;

    info!("KANTOR shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("kantor=info,tower_http=info"));

    let json_logging = std::env::var("KANTOR_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
