use std::process::ExitCode;

use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use turnstile_server::config::Config;
use turnstile_server::routes::create_routes;
use turnstile_server::state::AppState;
use turnstile_server::store::PgStore;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!(?config, "Configuration loaded");
    if config.payment_confirmation_secret.is_none() {
        tracing::warn!("PAYMENT_CONFIRMATION_SECRET is not set; payment confirmations are unauthenticated");
    }

    let store = match PgStore::connect(&config.database_url, config.max_connections).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = ?e, "Failed to connect to database");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("Successfully connected to database");

    if let Err(e) = store.migrate().await {
        tracing::error!(error = %e, "Failed to run migrations");
        return ExitCode::FAILURE;
    }
    tracing::info!("Migrations run successfully");

    let state = match AppState::new(&config, store) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialise signing keys");
            return ExitCode::FAILURE;
        }
    };
    let app = create_routes(state, &config);

    let listener = match TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, addr = %config.bind_addr, "Failed to bind address");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("🚀 Server running at http://{}", config.bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Server failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
