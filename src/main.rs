use anyhow::{Context, Result};
use chrono::NaiveDate;
use ledgersync::api::{create_router, AppState};
use ledgersync::config;
use ledgersync::crypto::TokenCipher;
use ledgersync::oauth::{run_state_cleanup, OAuthFlow, PendingAuthorizations, ProviderConfig};
use ledgersync::sync::{AccountingApiClient, LedgerStore, LedgerSyncPipeline};
use ledgersync::tokens::TokenStore;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ledgersync=info".into()),
        )
        .init();

    info!("Ledgersync starting...");

    // Load TOML configuration; a missing file means defaults
    let config_path = std::env::var("LEDGERSYNC_CONFIG")
        .unwrap_or_else(|_| "ledgersync.toml".to_string());
    let app_config = match config::load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(path = %config_path, error = %e, "Config file not loaded, using defaults");
            config::AppConfig::default()
        }
    };

    // Secrets come from the environment
    let client_id = std::env::var("LEDGERSYNC_CLIENT_ID")
        .context("LEDGERSYNC_CLIENT_ID is required")?;
    let client_secret = std::env::var("LEDGERSYNC_CLIENT_SECRET")
        .context("LEDGERSYNC_CLIENT_SECRET is required")?;
    let encryption_key = std::env::var("LEDGERSYNC_ENCRYPTION_KEY")
        .context("LEDGERSYNC_ENCRYPTION_KEY is required (base64-encoded 32-byte key)")?;

    info!(
        bind_addr = %app_config.server.bind_addr,
        database = %app_config.database.path,
        company_id = %app_config.provider.company_id,
        "Configuration loaded"
    );

    let cipher = TokenCipher::new(&encryption_key).context("Invalid encryption key")?;

    let token_store = Arc::new(
        TokenStore::new(&app_config.database.path)
            .context("Failed to initialize token store")?,
    );
    let ledger_store = Arc::new(
        LedgerStore::new(&app_config.database.path)
            .context("Failed to initialize ledger store")?,
    );
    info!("Stores initialized");

    let provider = ProviderConfig {
        auth_url: app_config.provider.auth_url.clone(),
        token_url: app_config.provider.token_url.clone(),
        scope: app_config.provider.scope.clone(),
        redirect_uri: app_config.provider.redirect_uri.clone(),
        client_id,
        client_secret,
    };

    // Pending-state map with 10-minute expiry, swept every minute
    let pending = PendingAuthorizations::new(600);
    tokio::spawn(run_state_cleanup(pending.clone(), 60));

    let oauth = Arc::new(OAuthFlow::new(
        provider,
        cipher,
        Arc::clone(&token_store),
        pending,
    ));

    let floor_date = NaiveDate::parse_from_str(&app_config.sync.floor_date, "%Y-%m-%d")
        .context("sync.floor_date must be YYYY-MM-DD")?;

    let client = AccountingApiClient::new(
        app_config.provider.api_base_url.clone(),
        app_config.provider.company_id.clone(),
        app_config.provider.minor_version,
    );

    let pipeline = Arc::new(LedgerSyncPipeline::new(
        Arc::clone(&oauth),
        client,
        Arc::clone(&ledger_store),
        floor_date,
        app_config.sync.accounting_method.clone(),
    ));

    let router = create_router(AppState {
        oauth,
        sync: pipeline,
    });

    let listener = tokio::net::TcpListener::bind(&app_config.server.bind_addr)
        .await
        .context("Failed to bind server address")?;
    info!(addr = %app_config.server.bind_addr, "Listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    info!("Ledgersync stopped");

    Ok(())
}
