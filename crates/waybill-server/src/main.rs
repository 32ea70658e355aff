//! waybill-server - REST API server binary.

use std::net::SocketAddr;

use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use waybill_core::WaybillConfig;
use waybill_server::{create_server, AppState};

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing; WAYBILL_LOG_JSON switches to structured output
    let filter = EnvFilter::from_default_env()
        .add_directive(Level::INFO.into())
        .add_directive("waybill_server=debug".parse()?);
    if std::env::var("WAYBILL_LOG_JSON").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    // Get configuration from environment, optionally layered over a file
    let host = std::env::var("WAYBILL_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("WAYBILL_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .map_err(|_| "WAYBILL_PORT must be a valid port number")?;
    let config = match std::env::var("WAYBILL_CONFIG") {
        Ok(path) => WaybillConfig::from_file(&path)?.with_env()?,
        Err(_) => WaybillConfig::from_env()?,
    };

    info!(database = %config.database_path.display(), "Opening database");
    let state = AppState::open(config)?;
    let app = create_server(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting waybill-server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            info!("Shutdown signal received");
        })
        .await?;

    info!("Server stopped cleanly");
    Ok(())
}
