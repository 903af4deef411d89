// HTTP + WebSocket routes

mod http;
mod ws;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tower_http::cors::{Any, CorsLayer};

use crate::preferences::PreferencesStore;
use crate::report_hub::ReportHub;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) hub: Arc<ReportHub>,
    pub(crate) preferences: Arc<PreferencesStore>,
    pub(crate) ws_volume_connections: Arc<AtomicUsize>,
}

pub fn app(
    hub: Arc<ReportHub>,
    preferences: Arc<PreferencesStore>,
    ws_volume_connections: Arc<AtomicUsize>,
) -> Router {
    let state = AppState {
        hub,
        preferences,
        ws_volume_connections,
    };
    Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/volumes", get(http::volumes_handler)) // GET /api/volumes
        .route("/api/volumes/{class}", get(http::volume_class_handler)) // GET /api/volumes/local
        .route("/api/preferences", get(http::preferences_handler)) // GET /api/preferences
        .route("/api/selection", post(http::selection_handler)) // POST /api/selection
        .route("/ws/volumes", get(ws::ws_volumes)) // WS /ws/volumes
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
