use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use course_enrollment_service::config::Settings;
use course_enrollment_service::server::{create_app, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    init_tracing();

    // Load configuration
    let settings = Settings::new()?;
    tracing::info!("Configuration loaded");

    // Shutdown signal shared by background tasks
    let (shutdown_tx, _) = broadcast::channel(1);

    // Create application state and background tasks
    let (state, dispatcher, worker) = AppState::new(settings.clone(), &shutdown_tx)?;
    tracing::info!("Application state initialized");

    // Start event dispatch and email worker in background
    let dispatcher_handle = tokio::spawn(dispatcher.run());
    let worker_handle = tokio::spawn(worker.run());

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop background tasks
    let _ = shutdown_tx.send(());
    tracing::info!("Waiting for background tasks to finish...");
    let _ = tokio::join!(dispatcher_handle, worker_handle);

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
