use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use crate::{
    auth::require_user,
    error::{AppError, AppResult},
    models::{ExpenseFilter, ExpensePatch, NewExpense},
    schemas::{non_empty_opt, parse_date_param, validate_input, ExpensesQuery, IdPath},
    services::financials::round2,
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/expenses",
            axum::routing::get(list_expenses).post(create_expense),
        )
        .route(
            "/expenses/{id}",
            axum::routing::get(get_expense)
                .put(update_expense)
                .delete(delete_expense),
        )
}

async fn list_expenses(
    State(state): State<AppState>,
    Query(query): Query<ExpensesQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_user(&state, &headers)?;
    let filter = ExpenseFilter {
        date_from: parse_date_param("filter_date_from", query.filter_date_from.as_deref()),
        date_to: parse_date_param("filter_date_to", query.filter_date_to.as_deref()),
        apartment_title: non_empty_opt(query.apartment_title.as_deref()),
    };
    let expenses = state.repos.expenses.list(&filter).await?;
    let total_expenses = round2(expenses.iter().map(|expense| expense.amount).sum());
    Ok(Json(json!({
        "data": expenses,
        "total_expenses": total_expenses,
    })))
}

async fn get_expense(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_user(&state, &headers)?;
    let expense = state
        .repos
        .expenses
        .get(path.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Expense not found.".to_string()))?;
    Ok(Json(json!(expense)))
}

async fn create_expense(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<NewExpense>,
) -> AppResult<impl IntoResponse> {
    require_user(&state, &headers)?;
    validate_input(&payload)?;
    let expense = state.repos.expenses.create(payload.normalized()).await?;
    tracing::info!(
        expense_id = expense.id,
        general = expense.is_general(),
        "Expense recorded"
    );
    Ok((StatusCode::CREATED, Json(json!(expense))))
}

async fn update_expense(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
    Json(patch): Json<ExpensePatch>,
) -> AppResult<Json<Value>> {
    require_user(&state, &headers)?;
    if patch.amount.is_some_and(|amount| amount < 0.0) {
        return Err(AppError::UnprocessableEntity(
            "amount must not be negative.".to_string(),
        ));
    }
    let expense = state
        .repos
        .expenses
        .update(path.id, patch)
        .await?
        .ok_or_else(|| AppError::NotFound("Expense not found.".to_string()))?;
    Ok(Json(json!(expense)))
}

async fn delete_expense(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_user(&state, &headers)?;
    if !state.repos.expenses.delete(path.id).await? {
        return Err(AppError::NotFound("Expense not found.".to_string()));
    }
    Ok(Json(json!({ "id": path.id, "deleted": true })))
}
