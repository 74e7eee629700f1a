//! TechQuiz Back binary entrypoint wiring REST, WebSocket, SSE and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use techquiz_back::{
    config::AppConfig,
    dao::{
        quiz_store::{MemoryQuizStore, QuizStore},
        storage::StorageError,
    },
    routes,
    services::{mailer::LogMailer, storage_supervisor},
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config, Arc::new(LogMailer));

    spawn_storage_supervisor(app_state.clone());
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

/// Start the storage supervisor for the backend selected by `STORAGE_BACKEND`.
fn spawn_storage_supervisor(state: SharedState) {
    let backend = env::var("STORAGE_BACKEND").unwrap_or_else(|_| "mongo".into());
    match backend.trim().to_ascii_lowercase().as_str() {
        "memory" => spawn_memory_supervisor(state),
        #[cfg(feature = "mongo-store")]
        "mongo" | "mongodb" => spawn_mongo_supervisor(state),
        other => {
            warn!(backend = %other, "unsupported storage backend; using in-memory storage");
            spawn_memory_supervisor(state);
        }
    }
}

fn spawn_memory_supervisor(state: SharedState) {
    info!("using in-memory storage; data is lost on restart");
    let store: Arc<dyn QuizStore> = Arc::new(MemoryQuizStore::new());
    tokio::spawn(storage_supervisor::run(state, move || {
        let store = store.clone();
        async move { Ok::<_, StorageError>(store) }
    }));
}

#[cfg(feature = "mongo-store")]
fn spawn_mongo_supervisor(state: SharedState) {
    use techquiz_back::dao::quiz_store::mongodb::{MongoConfig, MongoQuizStore};

    tokio::spawn(storage_supervisor::run(state, || async {
        let config = MongoConfig::from_env().await?;
        let store = MongoQuizStore::connect(config).await?;
        Ok::<Arc<dyn QuizStore>, StorageError>(Arc::new(store))
    }));
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

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
