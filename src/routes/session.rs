use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppResult,
    middleware::request_id::RequestId,
    models::{GenerateOutcome, ItemId, PlayState, PreferenceVector, SessionSnapshot},
    routes::AppState,
};

#[derive(Debug, Deserialize)]
pub struct BatchSizeRequest {
    pub size: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub size: Option<usize>,
    #[serde(default)]
    pub preferences: Option<PreferenceVector>,
}

#[derive(Debug, Serialize)]
pub struct PlayResponse {
    pub item_id: ItemId,
    pub state: PlayState,
}

/// Handler for the session snapshot the UI renders from
pub async fn snapshot(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot().await)
}

/// Handler for slider changes
pub async fn update_preferences(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(preferences): Json<PreferenceVector>,
) -> AppResult<StatusCode> {
    tracing::info!(request_id = %request_id, ?preferences, "Preference update received");

    state.session.on_preferences_changed(preferences).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for batch size changes
pub async fn update_batch_size(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<BatchSizeRequest>,
) -> AppResult<StatusCode> {
    tracing::info!(request_id = %request_id, size = request.size, "Batch size update received");

    state.session.on_batch_size_changed(request.size).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for "generate recommendations"
pub async fn generate(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<GenerateRequest>,
) -> AppResult<Json<GenerateOutcome>> {
    tracing::info!(
        request_id = %request_id,
        size = ?request.size,
        explicit_preferences = request.preferences.is_some(),
        "Processing generate request"
    );

    let outcome = state
        .session
        .on_generate_requested(request.size, request.preferences)
        .await?;

    tracing::info!(
        request_id = %request_id,
        served = outcome.items.len(),
        source = ?outcome.source,
        "Generate completed"
    );

    Ok(Json(outcome))
}

/// Handler for play/pause toggles on a displayed item
pub async fn play(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(item_id): Path<String>,
) -> AppResult<Json<PlayResponse>> {
    let item_id = ItemId::new(item_id);
    let play_state = state.session.on_item_play_requested(&item_id).await?;

    tracing::info!(
        request_id = %request_id,
        item_id = %item_id,
        state = ?play_state,
        "Play toggled"
    );

    Ok(Json(PlayResponse {
        item_id,
        state: play_state,
    }))
}

/// Handler for logout: drops every piece of session state
pub async fn reset(State(state): State<AppState>) -> StatusCode {
    state.session.reset().await;
    StatusCode::NO_CONTENT
}
