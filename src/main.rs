//! drill-sync binary entrypoint wiring REST, WebSocket and SSE layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use drill_sync::{
    config::AppConfig,
    dao::session_directory::{SessionDirectory, memory::InMemoryDirectory},
    routes,
    state::{AppState, SharedState, clock::SystemClock},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let directory = build_directory(&config)?;
    let app_state = AppState::new(config, directory, Arc::new(SystemClock));

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Pick the session directory: the content service when configured, otherwise the
/// sessions listed in the configuration file.
#[cfg(feature = "http-directory")]
fn build_directory(config: &AppConfig) -> anyhow::Result<Arc<dyn SessionDirectory>> {
    use drill_sync::dao::session_directory::http::{HttpDirectoryConfig, HttpSessionDirectory};

    match config.content_service_url() {
        Some(url) => {
            let directory = HttpSessionDirectory::new(HttpDirectoryConfig::new(url).with_env_token())
                .context("building content service client")?;
            info!(%url, "using content service session directory");
            Ok(Arc::new(directory))
        }
        None => Ok(memory_directory(config)),
    }
}

#[cfg(not(feature = "http-directory"))]
fn build_directory(config: &AppConfig) -> anyhow::Result<Arc<dyn SessionDirectory>> {
    if config.content_service_url().is_some() {
        tracing::warn!("content_service_url is set but the http-directory feature is disabled");
    }
    Ok(memory_directory(config))
}

fn memory_directory(config: &AppConfig) -> Arc<dyn SessionDirectory> {
    info!(sessions = config.sessions().len(), "using in-memory session directory");
    Arc::new(InMemoryDirectory::from_config(config))
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
