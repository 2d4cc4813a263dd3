use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use forge3d_comfyui::api::ComfyUIApi;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use forge3d_api::config::ServerConfig;
use forge3d_api::router::build_app_router;
use forge3d_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "forge3d_api=debug,forge3d_comfyui=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");
    tracing::info!(
        base_url = %config.pipeline.base_url,
        workflow = %config.pipeline.template_path.display(),
        output_dir = %config.pipeline.output_dir.display(),
        "Loaded ComfyUI configuration",
    );

    tokio::fs::create_dir_all(&config.pipeline.output_dir)
        .await
        .expect("Failed to create output directory");

    // --- ComfyUI client ---
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.backend_request_timeout_secs))
        .build()
        .expect("Failed to build HTTP client");
    let backend = Arc::new(ComfyUIApi::with_client(client, config.pipeline.base_url.clone()));

    // --- App state ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    let state = AppState::new(config, backend);
    let shutdown = state.shutdown.clone();

    let app = build_app_router(state);

    // --- Start server ---
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Jobs still polling stop waiting and dequeue their prompts.
            shutdown.cancel();
        })
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
