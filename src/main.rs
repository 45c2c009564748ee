//! Escape Hunt Back binary entrypoint wiring REST, SSE, and storage layers.

use std::{env, net::SocketAddr};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use escape_hunt_back::{
    config::AppConfig,
    routes,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config);

    spawn_storage(app_state.clone()).await;
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

/// Background-connect to MongoDB, keeping the state degraded until ready.
#[cfg(feature = "mongo-store")]
async fn spawn_storage(state: SharedState) {
    use std::sync::Arc;

    use escape_hunt_back::{
        dao::event_store::{
            EventStore,
            mongodb::{MongoConfig, MongoEventStore},
        },
        services::storage_supervisor,
    };

    let uri = env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
    let db_name = env::var("MONGO_DB").ok();

    tokio::spawn(storage_supervisor::run(state, move || {
        let uri = uri.clone();
        let db_name = db_name.clone();
        async move {
            let config = MongoConfig::from_uri(&uri, db_name.as_deref()).await?;
            let store = MongoEventStore::connect(config).await?;
            Ok(Arc::new(store) as Arc<dyn EventStore>)
        }
    }));
}

/// Install the volatile in-memory backend when built without `mongo-store`.
#[cfg(not(feature = "mongo-store"))]
async fn spawn_storage(state: SharedState) {
    use std::sync::Arc;

    use escape_hunt_back::dao::event_store::memory::MemoryEventStore;
    use tracing::warn;

    warn!("built without mongo-store; using volatile in-memory storage");
    state
        .install_event_store(Arc::new(MemoryEventStore::new()))
        .await;
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
