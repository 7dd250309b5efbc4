use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use serde_json::{json, Value};

use crate::{
    auth::require_webhook,
    error::AppResult,
    services::ingest::{ingest_all, ingest_event, parse_body, WebhookBody},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route("/webhook", axum::routing::post(receive_webhook))
}

async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Value>> {
    require_webhook(&state, &headers)?;

    let parsed = parse_body(&body).inspect_err(|error| {
        tracing::warn!(error = %error, bytes = body.len(), "Rejected webhook payload");
    })?;

    match parsed {
        WebhookBody::Single(event) => {
            let result = ingest_event(state.repos.bookings.as_ref(), event).await?;
            Ok(Json(json!({ "status": "success", "result": result })))
        }
        WebhookBody::Batch(events) => {
            let results = ingest_all(state.repos.bookings.as_ref(), events).await?;
            tracing::info!(processed = results.len(), "Webhook batch applied");
            Ok(Json(json!({
                "status": "success",
                "processed": results.len(),
                "results": results,
            })))
        }
    }
}
