use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use crate::{
    auth::{require_admin, require_user},
    error::{AppError, AppResult},
    schemas::{validate_input, IdPath, NameInput},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/services",
            axum::routing::get(list_active_services).post(create_service),
        )
        .route("/services/all", axum::routing::get(list_all_services))
        .route(
            "/services/{id}",
            axum::routing::put(rename_service).delete(toggle_service),
        )
}

async fn list_active_services(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_user(&state, &headers)?;
    let services = state.repos.services.list(true).await?;
    Ok(Json(json!({ "data": services })))
}

async fn list_all_services(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let services = state.repos.services.list(false).await?;
    Ok(Json(json!({ "data": services })))
}

async fn create_service(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<NameInput>,
) -> AppResult<impl IntoResponse> {
    require_admin(&state, &headers)?;
    validate_input(&payload)?;
    let name = payload.trimmed()?;

    if state.repos.services.find_by_name(&name).await?.is_some() {
        return Err(AppError::Conflict(format!("Service '{name}' already exists.")));
    }
    let service = state.repos.services.create(&name).await?;
    tracing::info!(service_id = service.id, name = %service.name, "Service created");
    Ok((StatusCode::CREATED, Json(json!(service))))
}

async fn rename_service(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
    Json(payload): Json<NameInput>,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    validate_input(&payload)?;
    let name = payload.trimmed()?;

    let service = state
        .repos
        .services
        .rename(path.id, &name)
        .await?
        .ok_or_else(|| AppError::NotFound("Service not found.".to_string()))?;
    Ok(Json(json!(service)))
}

/// Services are never removed, only switched on or off.
async fn toggle_service(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let service = state
        .repos
        .services
        .toggle(path.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Service not found.".to_string()))?;
    Ok(Json(json!(service)))
}
