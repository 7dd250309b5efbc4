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
    models::{non_blank, NewPayment, PaymentFilter, PaymentPatch},
    schemas::{non_empty_opt, parse_date_param, validate_input, IdPath, PaymentsQuery},
    services::financials::round2,
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/payments",
            axum::routing::get(list_payments).post(create_payment),
        )
        .route(
            "/payments/{id}",
            axum::routing::get(get_payment)
                .put(update_payment)
                .delete(delete_payment),
        )
}

async fn list_payments(
    State(state): State<AppState>,
    Query(query): Query<PaymentsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_user(&state, &headers)?;
    let filter = PaymentFilter {
        receipt_date: parse_date_param("filter_date", query.filter_date.as_deref()),
        date_from: parse_date_param("filter_date_from", query.filter_date_from.as_deref()),
        date_to: parse_date_param("filter_date_to", query.filter_date_to.as_deref()),
        apartment_title: non_empty_opt(query.apartment_title.as_deref()),
    };
    let payments = state.repos.payments.list(&filter).await?;

    let total_fact = round2(payments.iter().map(|payment| payment.amount).sum());
    let total_plan = round2(
        payments
            .iter()
            .filter_map(|payment| payment.advance_for_future)
            .sum(),
    );
    Ok(Json(json!({
        "data": payments,
        "totals": {
            "total_fact": total_fact,
            "total_plan": total_plan,
            "total_advance": round2(total_fact - total_plan),
        }
    })))
}

async fn get_payment(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_user(&state, &headers)?;
    let payment = state
        .repos
        .payments
        .get(path.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment not found.".to_string()))?;
    Ok(Json(json!(payment)))
}

async fn create_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<NewPayment>,
) -> AppResult<impl IntoResponse> {
    require_user(&state, &headers)?;
    validate_input(&payload)?;

    let mut payment = NewPayment {
        apartment_title: payload.apartment_title.clone().and_then(non_blank),
        operation_type: payload.operation_type.clone().and_then(non_blank),
        income_category: payload.income_category.clone().and_then(non_blank),
        comment: payload.comment.clone().and_then(non_blank),
        ..payload
    };

    if let Some(booking_id) = payment.booking_id {
        let booking = state
            .repos
            .bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found.".to_string()))?;
        if payment.apartment_title.is_none() {
            payment.apartment_title = booking.apartment_title;
        }
    }
    if let Some(line_id) = payment.booking_service_id {
        if state.repos.services.get_booking_service(line_id).await?.is_none() {
            return Err(AppError::NotFound("Booking service not found.".to_string()));
        }
    }
    if payment.apartment_title.is_none() {
        return Err(AppError::BadRequest(
            "apartment_title is required when it cannot be taken from the booking.".to_string(),
        ));
    }

    let created = state.repos.payments.create(payment).await?;
    tracing::info!(payment_id = created.id, amount = created.amount, "Payment recorded");
    Ok((StatusCode::CREATED, Json(json!(created))))
}

async fn update_payment(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
    Json(patch): Json<PaymentPatch>,
) -> AppResult<Json<Value>> {
    require_user(&state, &headers)?;
    if patch.amount.is_some_and(|amount| amount < 0.0) {
        return Err(AppError::UnprocessableEntity(
            "amount must not be negative.".to_string(),
        ));
    }
    let payment = state
        .repos
        .payments
        .update(path.id, patch)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment not found.".to_string()))?;
    Ok(Json(json!(payment)))
}

async fn delete_payment(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_user(&state, &headers)?;
    if !state.repos.payments.delete(path.id).await? {
        return Err(AppError::NotFound("Payment not found.".to_string()));
    }
    Ok(Json(json!({ "id": path.id, "deleted": true })))
}
