use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};

use crate::{
    auth::require_admin,
    error::{AppError, AppResult},
    schemas::{validate_input, IdPath, NameInput},
    services::realty::{rename, sync_from_all_sources},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/realty", axum::routing::get(list_realty))
        .route(
            "/realty/{id}",
            axum::routing::put(rename_realty).delete(toggle_realty),
        )
}

/// Lists the registry after pulling in any unit titles seen since the last
/// visit.
async fn list_realty(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let added = sync_from_all_sources(&state.repos).await?;
    let entries = state.repos.realty.list().await?;
    Ok(Json(json!({ "data": entries, "synced": added })))
}

async fn rename_realty(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
    Json(payload): Json<NameInput>,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    validate_input(&payload)?;
    let name = payload.trimmed()?;
    let realty = rename(&state.repos, path.id, &name).await?;
    Ok(Json(json!(realty)))
}

async fn toggle_realty(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let realty = state
        .repos
        .realty
        .toggle(path.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Realty not found.".to_string()))?;
    tracing::info!(realty_id = realty.id, active = realty.is_active, "Realty toggled");
    Ok(Json(json!(realty)))
}
