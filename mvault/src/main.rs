//! mvault - personal music library service
//!
//! Serves the HTTP + SSE surface for a browser front end. Identity, blob
//! storage and track rows live in the hosted backend configured via
//! `MVAULT_SUPABASE_URL` / `MVAULT_SUPABASE_ANON_KEY` or the config file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mvault_common::config::{self, ConfigOverrides, TomlConfig};
use mvault_common::events::EventBus;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mvault::backend::supabase::SupabaseClient;
use mvault::backend::Backend;
use mvault::AppState;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "mvault", version, about = "Personal music library service")]
struct Args {
    /// Config file (default: ~/.config/mvault/config.toml)
    #[arg(short, long, env = "MVAULT_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, env = config::BIND_ENV)]
    bind: Option<String>,

    /// Backend project URL
    #[arg(long, env = config::URL_ENV)]
    supabase_url: Option<String>,

    /// Backend anonymous API key
    #[arg(long, env = config::ANON_KEY_ENV, hide_env_values = true)]
    anon_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Resolve before tracing starts so the configured log level applies;
    // outcomes are logged once the subscriber is up
    let config_path = args.config.clone().or_else(config::default_config_path);
    let overrides = ConfigOverrides {
        url: args.supabase_url,
        anon_key: args.anon_key,
        bind: args.bind,
    };
    let resolved = match &config_path {
        Some(path) => config::load_toml_config(path),
        None => Ok(TomlConfig::default()),
    }
    .and_then(|file| config::resolve(&overrides, &file));
    let level = resolved
        .as_ref()
        .map(|c| c.log_level.clone())
        .unwrap_or_else(|_| config::DEFAULT_LOG_LEVEL.to_string());

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("mvault={level},tower_http={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting mvault (music library)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    match &config_path {
        Some(path) if path.exists() => info!("Config file: {}", path.display()),
        Some(path) => warn!("Config file not found: {}, using defaults", path.display()),
        None => warn!("No config directory, using defaults"),
    }

    let vault_config = match resolved {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            return Err(e).context("Refusing to start with invalid configuration");
        }
    };
    info!(
        url = %vault_config.backend.url,
        log_level = %vault_config.log_level,
        bucket = %vault_config.backend.bucket,
        table = %vault_config.backend.table,
        "Backend configured"
    );

    let client = SupabaseClient::new(vault_config.backend.clone())
        .context("Failed to build backend client")?;
    let backend = Backend::from_client(Arc::new(client));

    // Create event bus for SSE broadcasting
    let event_bus = EventBus::new(256);

    let state = AppState::new(backend, event_bus);
    let refresh = state.library.spawn_refresh_listener(state.session.clone());
    state.session.start().await;
    info!(signed_in = state.session.current().is_some(), "Session initialized");

    let session = state.session.clone();
    let app = mvault::build_router(state);

    let listener = tokio::net::TcpListener::bind(&vault_config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", vault_config.bind))?;
    info!("Listening on http://{}", vault_config.bind);
    info!("Health check: http://{}/health", vault_config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    session.shutdown();
    refresh.abort();
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
