//! FlashQuiz Back binary entrypoint wiring REST, SSE and the quiz store backends.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use flashquiz_back::{
    config::AppConfig,
    dao::quiz_store::{QuizStore, memory::MemoryQuizStore},
    routes,
    state::{AppState, SharedState},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = install_store(config).await?;

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
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Pick the backend from `QUIZ_STORE` (`memory` by default, or `mongo`).
async fn install_store(config: AppConfig) -> anyhow::Result<SharedState> {
    let backend = env::var("QUIZ_STORE").unwrap_or_else(|_| "memory".into());
    match backend.as_str() {
        "memory" => {
            info!("using in-memory quiz store");
            let store: Arc<dyn QuizStore> = Arc::new(MemoryQuizStore::new());
            Ok(AppState::with_store(config, store).await)
        }
        #[cfg(feature = "mongo-store")]
        "mongo" => {
            use flashquiz_back::{
                dao::{
                    quiz_store::mongodb::{MongoConfig, MongoQuizStore},
                    storage::StorageError,
                },
                services::storage_supervisor,
            };

            let mongo_config = MongoConfig::from_env()
                .await
                .context("reading MongoDB configuration")?;
            let state = AppState::new(config);
            info!(database = %mongo_config.database_name, "using MongoDB quiz store");
            tokio::spawn(storage_supervisor::run(state.clone(), move || {
                let mongo_config = mongo_config.clone();
                async move {
                    let store = MongoQuizStore::connect(mongo_config).await?;
                    Ok::<_, StorageError>(Arc::new(store) as Arc<dyn QuizStore>)
                }
            }));
            Ok(state)
        }
        other => anyhow::bail!("unsupported QUIZ_STORE backend `{other}`"),
    }
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
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
