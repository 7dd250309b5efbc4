use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    routing::get,
    Router,
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{
    middleware::{cors::build_cors_layer, request_id::inject_request_id},
    state::AppState,
};

pub mod bookings;
pub mod catalog;
pub mod dashboard;
pub mod expenses;
pub mod health;
pub mod payments;
pub mod plans;
pub mod realty;
pub mod webhook;

pub fn v1_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .merge(webhook::router())
        .merge(bookings::router())
        .merge(catalog::router())
        .merge(payments::router())
        .merge(expenses::router())
        .merge(realty::router())
        .merge(plans::router())
        .merge(dashboard::router())
}

/// The full application minus rate limiting, which needs peer addresses
/// and is added by `main`.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .nest(&state.config.api_prefix, v1_router())
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::GATEWAY_TIMEOUT,
            Duration::from_secs(state.config.request_timeout_seconds),
        ))
        .layer(axum::middleware::from_fn(inject_request_id))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(&state.config))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::app_router;
    use crate::{config::AppConfig, state::AppState};

    fn app_with(pairs: &[(&str, &str)]) -> Router {
        let pairs = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<Vec<_>>();
        let config = AppConfig::from_lookup(|key| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        });
        app_router(AppState::in_memory(config))
    }

    fn app() -> Router {
        app_with(&[])
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                request = request.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    fn webhook(action: &str, id: i64, amount: f64) -> Value {
        json!({
            "action": action,
            "status": "booked",
            "data": {"booking": {
                "id": id,
                "begin_date": "2024-06-01",
                "end_date": "2024-06-03",
                "realty_id": 7,
                "amount": amount,
                "client": {"id": 1, "fio": "Иванов И.", "phone": "+7900"},
                "apartment": {"id": 7, "title": "004) 29Б"}
            }}
        })
    }

    #[tokio::test]
    async fn health_reports_ok_without_database() {
        let app = app();
        let (status, body) = send(&app, "GET", "/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["store"], "memory");
    }

    #[tokio::test]
    async fn webhook_upsert_updates_in_place() {
        let app = app();
        let (status, body) =
            send(&app, "POST", "/v1/webhook", Some(webhook("create_booking", 1001, 10000.0))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["result"]["booking_id"], 1001);

        let (_, grouped) =
            send(&app, "GET", "/v1/bookings/grouped?filter_date=2024-06-01", None).await;
        let rows = grouped["data"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["checkin"]["amount"], 10000.0);

        let (status, _) =
            send(&app, "POST", "/v1/webhook", Some(webhook("update_booking", 1001, 12000.0))).await;
        assert_eq!(status, StatusCode::OK);
        let (_, grouped) =
            send(&app, "GET", "/v1/bookings/grouped?filter_date=2024-06-01", None).await;
        let rows = grouped["data"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["checkin"]["amount"], 12000.0);
        assert_eq!(rows[0]["checkin"]["id"], 1001);
    }

    #[tokio::test]
    async fn soft_deleted_booking_leaves_reports_but_stays_readable() {
        let app = app();
        send(&app, "POST", "/v1/webhook", Some(webhook("create_booking", 1001, 10000.0))).await;
        let (status, body) = send(
            &app,
            "POST",
            "/v1/webhook",
            Some(json!([webhook("delete_booking", 1001, 10000.0)])),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["processed"], 1);
        assert_eq!(body["results"][0]["status"], "deleted");

        let (_, grouped) =
            send(&app, "GET", "/v1/bookings/grouped?filter_date=2024-06-01", None).await;
        assert!(grouped["data"].as_array().unwrap().is_empty());
        let (_, listed) = send(&app, "GET", "/v1/bookings", None).await;
        assert!(listed["data"].as_array().unwrap().is_empty());

        let (status, raw) = send(&app, "GET", "/v1/bookings/1001", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(raw["is_delete"], true);
        assert_eq!(raw["status"], "deleted");
    }

    #[tokio::test]
    async fn malformed_batch_is_rejected_without_writes() {
        let app = app();
        let (status, body) = send(
            &app,
            "POST",
            "/v1/webhook",
            Some(json!([
                webhook("create_booking", 1, 100.0),
                {"action": "create_booking", "status": "booked", "data": {"booking": {"id": 2}}}
            ])),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("item 1"));

        let (status, _) = send(&app, "GET", "/v1/bookings/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn payment_takes_title_from_booking() {
        let app = app();
        send(&app, "POST", "/v1/webhook", Some(webhook("create_booking", 5, 1000.0))).await;

        let (status, created) = send(
            &app,
            "POST",
            "/v1/payments",
            Some(json!({"booking_id": 5, "receipt_date": "2024-06-02", "amount": 400.0, "advance_for_future": 100.0})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["apartment_title"], "004) 29Б");

        let (status, _) = send(
            &app,
            "POST",
            "/v1/payments",
            Some(json!({"receipt_date": "2024-06-02", "amount": 10.0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, listed) = send(&app, "GET", "/v1/payments?filter_date=2024-06-02", None).await;
        assert_eq!(listed["totals"]["total_fact"], 400.0);
        assert_eq!(listed["totals"]["total_plan"], 100.0);
        assert_eq!(listed["totals"]["total_advance"], 300.0);
    }

    #[tokio::test]
    async fn payment_with_unknown_references_is_not_found() {
        let app = app();
        let (status, body) = send(
            &app,
            "POST",
            "/v1/payments",
            Some(json!({"booking_id": 999, "apartment_title": "X", "receipt_date": "2024-06-02", "amount": 10.0})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Booking not found.");

        let (status, body) = send(
            &app,
            "POST",
            "/v1/payments",
            Some(json!({"booking_service_id": 42, "apartment_title": "X", "receipt_date": "2024-06-02", "amount": 10.0})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Booking service not found.");

        let (_, listed) = send(&app, "GET", "/v1/payments", None).await;
        assert!(listed["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn booking_services_are_totalled_and_checked() {
        let app = app();
        send(&app, "POST", "/v1/webhook", Some(webhook("create_booking", 9, 1000.0))).await;
        let (_, service) =
            send(&app, "POST", "/v1/services", Some(json!({"name": " Баня "}))).await;
        assert_eq!(service["name"], "Баня");
        let service_id = service["id"].as_i64().unwrap();

        let (status, _) =
            send(&app, "POST", "/v1/services", Some(json!({"name": "Баня"}))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        for price in [500.0, 250.5] {
            let (status, _) = send(
                &app,
                "POST",
                "/v1/booking-services",
                Some(json!({"booking_id": 9, "service_id": service_id, "price": price})),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }
        let (status, _) = send(
            &app,
            "POST",
            "/v1/booking-services",
            Some(json!({"booking_id": 404, "service_id": service_id, "price": 1.0})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, lines) = send(&app, "GET", "/v1/bookings/9/services", None).await;
        assert_eq!(lines["total"], 750.5);
        assert_eq!(lines["services"][0]["service_name"], "Баня");
    }

    #[tokio::test]
    async fn export_returns_csv_attachment() {
        let app = app();
        send(&app, "POST", "/v1/webhook", Some(webhook("create_booking", 3, 1000.0))).await;
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/v1/bookings/export?filter_date=2024-06-01")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response
            .headers()
            .get("content-disposition")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.starts_with("attachment; filename=bookings_2024-06-01_"));
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.lines().nth(1).unwrap().starts_with("004) 29Б,Заселение"));
    }

    #[tokio::test]
    async fn tokens_guard_admin_routes() {
        let app = app_with(&[("ADMIN_TOKEN", "adm"), ("USER_TOKEN", "usr")]);
        let call = |token: &'static str| {
            let app = app.clone();
            async move {
                app.oneshot(
                    Request::builder()
                        .uri("/v1/dashboard")
                        .header("authorization", format!("Bearer {token}"))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap()
                .status()
            }
        };
        assert_eq!(call("usr").await, StatusCode::FORBIDDEN);
        assert_eq!(call("nope").await, StatusCode::UNAUTHORIZED);
        assert_eq!(call("adm").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn dashboard_reports_year_with_grand_total() {
        let app = app();
        send(&app, "POST", "/v1/webhook", Some(webhook("create_booking", 1, 10000.0))).await;
        send(
            &app,
            "POST",
            "/v1/expenses",
            Some(json!({"apartment_title": "", "expense_date": "2024-06-10", "amount": 200.0})),
        )
        .await;

        let (status, body) = send(&app, "GET", "/v1/dashboard?year=2024", None).await;
        assert_eq!(status, StatusCode::OK);
        let report = &body["report"];
        assert_eq!(report["year"], 2024);
        assert_eq!(report["months"]["2024-06"]["objects"]["29Б"]["income"], 10000.0);
        assert!(report["months"]["2024-07"]["objects"]["29Б"].is_null());
        assert_eq!(report["yearly_totals"]["total_general_expenses"], 200.0);
        assert_eq!(report["yearly_totals"]["grand_total_expenses"], 200.0);
    }

    #[tokio::test]
    async fn realty_rename_cascades_and_deactivation_hides_rows() {
        let app = app();
        send(&app, "POST", "/v1/webhook", Some(webhook("create_booking", 1, 10000.0))).await;
        let (_, realty) = send(&app, "GET", "/v1/realty", None).await;
        assert_eq!(realty["synced"], 1);
        let id = realty["data"][0]["id"].as_i64().unwrap();

        let (status, _) = send(
            &app,
            "PUT",
            &format!("/v1/realty/{id}"),
            Some(json!({"name": "005) 30А"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, booking) = send(&app, "GET", "/v1/bookings/1", None).await;
        assert_eq!(booking["apartment_title"], "005) 30А");

        send(&app, "DELETE", &format!("/v1/realty/{id}"), None).await;
        let (_, grouped) = send(&app, "GET", "/v1/bookings/grouped", None).await;
        assert!(grouped["data"].as_array().unwrap().is_empty());
    }
}
