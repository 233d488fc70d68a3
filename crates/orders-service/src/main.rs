//! Brew club orders service
//!
//! REST API for member carts, checkout and supplier order aggregation

use anyhow::{Context, Result};
use orders_service::{
    create_router, AppState, Config, LogNotifier, Notifier, RelayNotifier, Storage,
    StorageBackend,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "orders_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    info!("Starting orders service");
    info!("Storage backend: {:?}", config.storage_backend);
    if !config.orders_enabled {
        warn!("Ordering is disabled");
    }

    // Initialize storage
    let storage = match config.storage_backend {
        StorageBackend::Redis => {
            info!("Redis URL: {}", config.redis_url);
            Storage::new(&config.redis_url)
                .await
                .context("Failed to initialize storage")?
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; state is lost on restart");
            Storage::in_memory()
        }
    };

    let notifier: Box<dyn Notifier> = match &config.mail_relay_url {
        Some(url) => {
            info!("Order confirmations go to mail relay {}", url);
            Box::new(RelayNotifier::new(url.clone()))
        }
        None => {
            info!("No MAIL_RELAY_URL set; order confirmations are logged only");
            Box::new(LogNotifier)
        }
    };

    // Create application state
    let state = AppState::new(storage, &config, notifier);
    state
        .import_registry
        .validate()
        .context("Invalid import model registry")?;
    info!(
        "CSV import models: {}",
        state.import_registry.model_names().collect::<Vec<_>>().join(", ")
    );

    // Create router
    let app = create_router(state);

    // Bind and serve
    let addr = config.api_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    info!("Orders service running on http://{}", addr);

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
