pub mod config;
pub mod db;
pub mod logging;
pub mod response;
pub mod routes;
pub mod state;
pub mod tutor;

use std::sync::Arc;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::db::{InMemoryProfileStore, ProfileStore, SqliteProfileStore, StoreError};
use crate::state::AppState;
use crate::tutor::TutorEngine;

/// SQLite when a URL is given, otherwise a process-local store.
pub async fn create_store(database_url: Option<&str>) -> Result<Arc<dyn ProfileStore>, StoreError> {
    match database_url {
        Some(url) => Ok(Arc::new(SqliteProfileStore::connect(url).await?)),
        None => Ok(Arc::new(InMemoryProfileStore::new())),
    }
}

pub fn create_app_with_engine(engine: Arc<TutorEngine>) -> axum::Router {
    routes::router(AppState::new(engine))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn create_app() -> Result<axum::Router, StoreError> {
    let config = config::Config::from_env();
    let store = create_store(config.database_url.as_deref()).await?;
    let engine = Arc::new(TutorEngine::new(config.tutor, store));
    Ok(create_app_with_engine(engine))
}
