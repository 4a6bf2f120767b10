//! HTTP surface for the browser editor.

pub mod error;
pub mod handlers;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::engine::Engine;
use crate::store::{ChangeLog, EditStore};
use crate::tracker::SessionRegistry;

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<dyn Engine>,
    pub edits: Arc<dyn EditStore>,
    pub changes: Arc<dyn ChangeLog>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    /// Build state around one store that holds both edits and the change log.
    pub fn new<S>(engine: Arc<dyn Engine>, store: Arc<S>) -> Self
    where
        S: EditStore + ChangeLog + 'static,
    {
        Self {
            engine,
            edits: Arc::clone(&store) as Arc<dyn EditStore>,
            changes: store,
            sessions: Arc::new(SessionRegistry::new()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/evaluate", post(handlers::evaluate))
        .route("/generate", post(handlers::generate))
        .route("/store-edits", post(handlers::store_edits))
        .route("/get-edits", get(handlers::get_edits))
        .route("/update-completion", post(handlers::update_completion))
        .route("/track-edits", post(handlers::track_edits))
        .route("/clear-tables", get(handlers::clear_tables))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
