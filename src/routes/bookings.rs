use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};

use crate::{
    auth::require_user,
    error::{AppError, AppResult},
    models::{non_blank, BookingFilter},
    schemas::{
        parse_date_param, validate_input, BookingsQuery, CheckinCommentInput,
        CreateBookingServiceInput, IdPath,
    },
    services::{
        catalog::services_total,
        export::grouped_rows_csv,
        grouping::{group_bookings, GroupedRow},
        realty::retain_active,
    },
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/bookings", axum::routing::get(list_bookings))
        .route("/bookings/grouped", axum::routing::get(grouped_bookings))
        .route("/bookings/export", axum::routing::get(export_bookings))
        .route("/bookings/{id}", axum::routing::get(get_booking))
        .route(
            "/bookings/{id}/checkin-comment",
            axum::routing::post(update_checkin_comment),
        )
        .route(
            "/bookings/{id}/services",
            axum::routing::get(list_booking_services),
        )
        .route(
            "/booking-services",
            axum::routing::post(create_booking_service),
        )
        .route(
            "/booking-services/{id}",
            axum::routing::delete(delete_booking_service),
        )
}

async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<BookingsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_user(&state, &headers)?;
    let filter = BookingFilter {
        touching_date: parse_date_param("filter_date", query.filter_date.as_deref()),
        ..BookingFilter::default()
    };
    let rows = state.repos.bookings.list_active(&filter).await?;
    Ok(Json(json!({ "data": rows })))
}

async fn grouped_bookings(
    State(state): State<AppState>,
    Query(query): Query<BookingsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_user(&state, &headers)?;
    let filter_date = parse_date_param("filter_date", query.filter_date.as_deref());
    let rows = grouped_rows(&state, filter_date).await?;
    Ok(Json(json!({ "filter_date": filter_date, "data": rows })))
}

async fn export_bookings(
    State(state): State<AppState>,
    Query(query): Query<BookingsQuery>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    require_user(&state, &headers)?;
    let filter_date = parse_date_param("filter_date", query.filter_date.as_deref());
    let rows = grouped_rows(&state, filter_date).await?;

    let mut totals = HashMap::new();
    for booking in rows.iter().filter_map(|row| row.checkin.as_ref()) {
        if totals.contains_key(&booking.id) {
            continue;
        }
        let lines = state.repos.services.list_for_booking(booking.id).await?;
        totals.insert(booking.id, services_total(&lines));
    }
    let body = grouped_rows_csv(&rows, &totals)?;

    let filename = format!(
        "bookings_{}_{}.csv",
        filter_date
            .map(|day| day.to_string())
            .unwrap_or_else(|| "all".to_string()),
        Utc::now().format("%Y%m%d_%H%M%S")
    );
    tracing::info!(rows = rows.len(), filename = %filename, "Bookings exported");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={filename}"),
            ),
        ],
        body,
    ))
}

/// Grouped table over active bookings whose unit is not deactivated.
async fn grouped_rows(
    state: &AppState,
    filter_date: Option<NaiveDate>,
) -> AppResult<Vec<GroupedRow>> {
    let filter = BookingFilter {
        touching_date: filter_date,
        ..BookingFilter::default()
    };
    let bookings = state.repos.bookings.list_active(&filter).await?;
    let bookings = retain_active(&state.repos, bookings).await?;
    Ok(group_bookings(&bookings, filter_date))
}

async fn get_booking(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_user(&state, &headers)?;
    let booking = state
        .repos
        .bookings
        .get(path.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found.".to_string()))?;
    Ok(Json(json!(booking)))
}

async fn update_checkin_comment(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
    Json(payload): Json<CheckinCommentInput>,
) -> AppResult<Json<Value>> {
    require_user(&state, &headers)?;
    let booking = state
        .repos
        .bookings
        .update_checkin_comment(path.id, payload.comments.and_then(non_blank))
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found.".to_string()))?;
    Ok(Json(json!(booking)))
}

async fn list_booking_services(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_user(&state, &headers)?;
    if state.repos.bookings.get(path.id).await?.is_none() {
        return Err(AppError::NotFound("Booking not found.".to_string()));
    }
    let lines = state.repos.services.list_for_booking(path.id).await?;
    let total = services_total(&lines);
    Ok(Json(json!({ "services": lines, "total": total })))
}

async fn create_booking_service(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateBookingServiceInput>,
) -> AppResult<impl IntoResponse> {
    require_user(&state, &headers)?;
    validate_input(&payload)?;

    if state.repos.bookings.get(payload.booking_id).await?.is_none() {
        return Err(AppError::NotFound("Booking not found.".to_string()));
    }
    if state.repos.services.get(payload.service_id).await?.is_none() {
        return Err(AppError::NotFound("Service not found.".to_string()));
    }

    let line = state
        .repos
        .services
        .add_to_booking(payload.booking_id, payload.service_id, payload.price)
        .await?;
    Ok((StatusCode::CREATED, Json(json!(line))))
}

async fn delete_booking_service(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_user(&state, &headers)?;
    if !state.repos.services.remove_from_booking(path.id).await? {
        return Err(AppError::NotFound("Booking service not found.".to_string()));
    }
    Ok(Json(json!({ "id": path.id, "deleted": true })))
}
