use chrono::{DateTime, NaiveDateTime, NaiveTime};
use serde::Serialize;
use serde_json::Value;

use crate::{
    error::{AppError, AppResult},
    models::{Booking, BookingUpsert},
    repository::BookingRepository,
    schemas::WebhookEvent,
};

const DELETE_ACTION: &str = "delete_booking";
const KNOWN_ACTIONS: [&str; 3] = ["create_booking", "update_booking", DELETE_ACTION];

/// A webhook body: the channel manager sends either one event or a list.
#[derive(Debug, Clone)]
pub enum WebhookBody {
    Single(WebhookEvent),
    Batch(Vec<WebhookEvent>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestOutcome {
    pub action: String,
    pub booking_id: i64,
    pub status: String,
}

/// Decodes and validates the whole body before anything is written, so a
/// malformed item rejects the batch without partial effects.
pub fn parse_body(body: &[u8]) -> AppResult<WebhookBody> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|error| AppError::BadRequest(format!("Invalid webhook payload: {error}")))?;

    match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(position, item)| {
                serde_json::from_value::<WebhookEvent>(item).map_err(|error| {
                    AppError::BadRequest(format!(
                        "Invalid webhook payload at item {position}: {error}"
                    ))
                })
            })
            .collect::<AppResult<Vec<_>>>()
            .map(WebhookBody::Batch),
        other => serde_json::from_value::<WebhookEvent>(other)
            .map(WebhookBody::Single)
            .map_err(|error| AppError::BadRequest(format!("Invalid webhook payload: {error}"))),
    }
}

/// Applies one event. `delete_booking` still stores the latest snapshot
/// before flagging the row.
pub async fn ingest_event(
    bookings: &dyn BookingRepository,
    event: WebhookEvent,
) -> AppResult<IngestOutcome> {
    if !KNOWN_ACTIONS.contains(&event.action.as_str()) {
        tracing::warn!(action = %event.action, "Unknown webhook action, treating as upsert");
    }
    tracing::info!(
        action = %event.action,
        booking_id = event.data.booking.id,
        "Processing booking webhook"
    );

    let action = event.action.clone();
    let upsert = to_upsert(event);
    let booking = if action == DELETE_ACTION {
        delete_booking(bookings, upsert).await?
    } else {
        bookings.upsert(upsert).await?
    };

    Ok(IngestOutcome {
        action,
        booking_id: booking.id,
        status: booking.status,
    })
}

pub async fn ingest_all(
    bookings: &dyn BookingRepository,
    events: Vec<WebhookEvent>,
) -> AppResult<Vec<IngestOutcome>> {
    let mut outcomes = Vec::with_capacity(events.len());
    for event in events {
        outcomes.push(ingest_event(bookings, event).await?);
    }
    Ok(outcomes)
}

pub async fn delete_booking(
    bookings: &dyn BookingRepository,
    upsert: BookingUpsert,
) -> AppResult<Booking> {
    let id = upsert.id;
    bookings.upsert(upsert).await?;
    bookings
        .mark_deleted(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Booking {id} not found.")))
}

pub fn to_upsert(event: WebhookEvent) -> BookingUpsert {
    let booking = event.data.booking;
    let id = booking.id;

    let (apartment_title, apartment_address) = match booking.apartment {
        Some(apartment) => (apartment.title, apartment.address),
        None => (None, None),
    };
    let apartment_address = apartment_address
        .filter(|address| !address.trim().is_empty())
        .or(booking.address);
    let (client_ref, client_fio, client_phone, client_email) = match booking.client {
        Some(client) => (client.id, client.fio, client.phone, client.email),
        None => (None, None, None, None),
    };

    BookingUpsert {
        id,
        action: event.action,
        status: event.status,
        begin_date: booking.begin_date,
        end_date: booking.end_date,
        realty_id: booking.realty_id,
        client_id: booking.client_id.or(client_ref),
        amount: lenient_money(id, "amount", booking.amount.as_ref()),
        prepayment: lenient_money(id, "prepayment", booking.prepayment.as_ref()),
        payment: lenient_money(id, "payment", booking.payment.as_ref()),
        platform_tax: lenient_money(id, "platform_tax", booking.platform_tax.as_ref()),
        balance_to_be_paid_1: lenient_money(
            id,
            "balance_to_be_paid_1",
            booking.balance_to_be_paid_1.as_ref(),
        ),
        arrival_time: lenient_time(id, "arrival_time", booking.arrival_time.as_ref()),
        departure_time: lenient_time(id, "departure_time", booking.departure_time.as_ref()),
        notes: booking.notes,
        client_fio,
        client_phone,
        client_email,
        apartment_title,
        apartment_address,
        number_of_days: booking.number_of_days,
        number_of_nights: booking.number_of_nights,
        is_delete: booking.is_delete,
        webhook_created_at: lenient_timestamp(id, "created_at", booking.created_at.as_ref()),
        webhook_updated_at: lenient_timestamp(id, "updated_at", booking.updated_at.as_ref()),
    }
}

fn lenient_money(booking_id: i64, field: &str, value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Null => return None,
        Value::Number(number) => number.as_f64(),
        Value::String(text) if text.trim().is_empty() => return None,
        Value::String(text) => text.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    };
    if parsed.is_none() {
        tracing::warn!(booking_id, field, "Ignoring unparseable amount");
    }
    parsed
}

fn lenient_time(booking_id: i64, field: &str, value: Option<&Value>) -> Option<NaiveTime> {
    let text = match value? {
        Value::Null => return None,
        Value::String(text) if text.trim().is_empty() => return None,
        Value::String(text) => text.trim(),
        _ => {
            tracing::warn!(booking_id, field, "Ignoring non-string time");
            return None;
        }
    };
    let parsed = NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .ok();
    if parsed.is_none() {
        tracing::warn!(booking_id, field, value = text, "Ignoring unparseable time");
    }
    parsed
}

fn lenient_timestamp(booking_id: i64, field: &str, value: Option<&Value>) -> Option<NaiveDateTime> {
    let text = match value? {
        Value::Null => return None,
        Value::String(text) if text.trim().is_empty() => return None,
        Value::String(text) => text.trim(),
        _ => {
            tracing::warn!(booking_id, field, "Ignoring non-string timestamp");
            return None;
        }
    };
    let parsed = DateTime::parse_from_rfc3339(text)
        .map(|timestamp| timestamp.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok();
    if parsed.is_none() {
        tracing::warn!(booking_id, field, value = text, "Ignoring unparseable timestamp");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};
    use serde_json::json;

    use super::{ingest_all, parse_body, to_upsert, WebhookBody};
    use crate::{models::BookingFilter, repository::Repositories};

    fn event(action: &str, id: i64, amount: serde_json::Value) -> serde_json::Value {
        json!({
            "action": action,
            "status": "booked",
            "data": {"booking": {
                "id": id,
                "begin_date": "2024-06-01",
                "end_date": "2024-06-03",
                "realty_id": 7,
                "amount": amount,
                "arrival_time": "14:00",
                "created_at": "2024-05-20 10:15:00",
                "client": {"id": 3, "fio": "Петров П.", "phone": "+7900"},
                "apartment": {"id": 7, "title": "004) 29Б", "address": null},
                "address": "ул. Мира, 3"
            }}
        })
    }

    fn events(body: serde_json::Value) -> Vec<crate::schemas::WebhookEvent> {
        match parse_body(body.to_string().as_bytes()).unwrap() {
            WebhookBody::Batch(events) => events,
            WebhookBody::Single(event) => vec![event],
        }
    }

    #[test]
    fn lenient_fields_fall_back_instead_of_failing() {
        let event = events(event("create_booking", 1, json!("10 000"))).remove(0);
        let upsert = to_upsert(event);
        assert_eq!(upsert.amount, None);
        assert_eq!(upsert.arrival_time, NaiveTime::from_hms_opt(14, 0, 0));
        assert!(upsert.webhook_created_at.is_some());
        assert_eq!(upsert.apartment_address.as_deref(), Some("ул. Мира, 3"));
        assert_eq!(upsert.client_fio.as_deref(), Some("Петров П."));
        assert_eq!(upsert.client_id, Some(3));
    }

    #[test]
    fn top_level_client_id_wins_over_nested_one() {
        let mut body = event("create_booking", 1, json!(100));
        body["data"]["booking"]["client_id"] = json!(11);
        let upsert = to_upsert(events(body).remove(0));
        assert_eq!(upsert.client_id, Some(11));
    }

    #[test]
    fn money_accepts_numeric_strings() {
        let upsert = to_upsert(events(event("create_booking", 1, json!("1500,50"))).remove(0));
        assert_eq!(upsert.amount, Some(1500.5));
    }

    #[test]
    fn one_malformed_item_rejects_the_batch() {
        let body = json!([
            event("create_booking", 1, json!(100)),
            {"action": "create_booking", "status": "booked", "data": {"booking": {"id": "x"}}}
        ]);
        assert!(parse_body(body.to_string().as_bytes()).is_err());
        assert!(parse_body(b"not json").is_err());
    }

    #[tokio::test]
    async fn delete_stores_snapshot_then_flags_row() {
        let repos = Repositories::memory();
        let outcomes = ingest_all(
            repos.bookings.as_ref(),
            events(json!([
                event("create_booking", 1001, json!(10000)),
                event("delete_booking", 1001, json!(9000)),
            ])),
        )
        .await
        .unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[1].status, "deleted");

        let stored = repos.bookings.get(1001).await.unwrap().unwrap();
        assert!(stored.is_delete);
        assert_eq!(stored.amount, Some(9000.0));
        assert_eq!(stored.begin_date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        let active = repos
            .bookings
            .list_active(&BookingFilter::default())
            .await
            .unwrap();
        assert!(active.is_empty());
    }
}
