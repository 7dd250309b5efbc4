use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use crate::{
    auth::require_admin,
    error::{AppError, AppResult},
    models::{NewPlan, PlanPatch},
    schemas::{validate_input, IdPath},
    services::plans::progress,
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/plans", axum::routing::get(list_plans).post(create_plan))
        .route(
            "/plans/{id}",
            axum::routing::get(get_plan).put(update_plan).delete(delete_plan),
        )
        .route("/plans/{id}/progress", axum::routing::get(plan_progress))
}

async fn list_plans(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let plans = state.repos.plans.list().await?;
    Ok(Json(json!({ "data": plans })))
}

async fn get_plan(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let plan = state
        .repos
        .plans
        .get(path.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Plan not found.".to_string()))?;
    Ok(Json(json!(plan)))
}

async fn create_plan(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<NewPlan>,
) -> AppResult<impl IntoResponse> {
    require_admin(&state, &headers)?;
    validate_input(&payload)?;
    if payload.start_date > payload.end_date {
        return Err(AppError::BadRequest(
            "start_date must not be after end_date.".to_string(),
        ));
    }
    let plan = state.repos.plans.create(payload).await?;
    Ok((StatusCode::CREATED, Json(json!(plan))))
}

async fn update_plan(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
    Json(patch): Json<PlanPatch>,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    if patch.is_empty() {
        return Err(AppError::BadRequest("No fields to update.".to_string()));
    }
    if patch.target_amount.is_some_and(|amount| amount < 0.0) {
        return Err(AppError::UnprocessableEntity(
            "target_amount must not be negative.".to_string(),
        ));
    }

    let current = state
        .repos
        .plans
        .get(path.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Plan not found.".to_string()))?;
    let start = patch.start_date.unwrap_or(current.start_date);
    let end = patch.end_date.unwrap_or(current.end_date);
    if start > end {
        return Err(AppError::BadRequest(
            "start_date must not be after end_date.".to_string(),
        ));
    }

    let plan = state
        .repos
        .plans
        .update(path.id, patch)
        .await?
        .ok_or_else(|| AppError::NotFound("Plan not found.".to_string()))?;
    Ok(Json(json!(plan)))
}

async fn delete_plan(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    if !state.repos.plans.delete(path.id).await? {
        return Err(AppError::NotFound("Plan not found.".to_string()));
    }
    Ok(Json(json!({ "id": path.id, "deleted": true })))
}

async fn plan_progress(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let plan = state
        .repos
        .plans
        .get(path.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Plan not found.".to_string()))?;
    let result = progress(&state.repos, plan).await?;
    Ok(Json(json!(result)))
}
