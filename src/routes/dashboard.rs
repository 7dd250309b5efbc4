use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use chrono::Datelike;
use serde_json::{json, Value};

use crate::{
    auth::require_admin,
    error::AppResult,
    schemas::DashboardQuery,
    services::{financials::annual_report, realty::dashboard_units},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route("/dashboard", axum::routing::get(dashboard))
}

async fn dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;

    let current_year = state.config.today().year();
    let year = clamp_year(query.year, current_year, state.config.dashboard_year_window);

    let units = match dashboard_units(&state.repos, state.config.dashboard_unit_limit).await {
        Ok(units) => units,
        Err(error) => {
            tracing::error!(error = %error, "Could not load dashboard units");
            Vec::new()
        }
    };

    let report = annual_report(&state.repos, year, &units).await;
    Ok(Json(json!({
        "current_year": current_year,
        "report": report,
    })))
}

fn clamp_year(requested: Option<i32>, current: i32, window: i32) -> i32 {
    let window = window.max(0);
    requested
        .unwrap_or(current)
        .clamp(current - window, current + window)
}
