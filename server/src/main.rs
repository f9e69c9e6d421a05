mod app;
mod color_store;
mod config;
mod export;
mod loader;
mod routes;
mod state;

use tokio::signal;
use tracing_subscriber::EnvFilter;

use crate::color_store::ColorTagStore;
use crate::config::Settings;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = Settings::from_env();
    tracing::info!(
        sites_path = %settings.sites_path.display(),
        layout = ?settings.layout,
        policy = ?settings.policy,
        color_tags_path = ?settings.color_tags_path,
        static_dir = %settings.static_dir.display(),
        "starting branchmap-server"
    );

    let color_tags = ColorTagStore::load(settings.color_tags_path.clone()).await;
    let state = AppState::new(settings, color_tags);

    // Read the sheet up front so a bad file shows in the log at startup; the
    // page reports the same error to the user.
    if let Err(e) = state.sites().await {
        tracing::warn!(error = %e, "dashboard will show the load error until restart");
    }

    let app = app::build_app(state);

    let addr = format!("0.0.0.0:{}", config::server_port());
    tracing::info!("branchmap server listening on {addr}");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "failed to bind TCP listener");
            return;
        }
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server failed");
    }

    tracing::info!("Server shut down gracefully");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
