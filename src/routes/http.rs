// GET handlers: version, volumes, preferences; POST selection

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use super::AppState;
use crate::models::{VolumeClass, VolumeKey};

/// GET /version: service name and version from Cargo.toml.
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/volumes: latest cycle report of every class that has completed a cycle.
pub(super) async fn volumes_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.hub.latest_all())
}

pub(super) async fn volume_class_handler(
    State(state): State<AppState>,
    Path(class): Path<VolumeClass>,
) -> impl IntoResponse {
    match state.hub.latest(class) {
        Some(report) => Json(report).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("no {} report yet", class) })),
        )
            .into_response(),
    }
}

pub(super) async fn preferences_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.preferences.current())
}

#[derive(Debug, Deserialize)]
pub(super) struct SelectionRequest {
    class: VolumeClass,
    key: VolumeKey,
    selected: bool,
}

/// POST /api/selection: toggle whether a volume is tracked for warnings, then persist.
/// Takes effect on the class's next cycle.
pub(super) async fn selection_handler(
    State(state): State<AppState>,
    Json(req): Json<SelectionRequest>,
) -> impl IntoResponse {
    state
        .preferences
        .set_selected(req.class, &req.key, req.selected);
    if let Err(e) = state.preferences.save().await {
        tracing::warn!(error = %e, operation = "save_preferences", "cannot save preferences");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response();
    }
    tracing::info!(class = %req.class, volume = %req.key, selected = req.selected, "selection changed");
    Json(state.preferences.current()).into_response()
}
