use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

use crate::error::AppError;

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::UnprocessableEntity(format!("Validation failed: {errors}")))
}

/// Parses an optional `YYYY-MM-DD` query value. Garbage is ignored with a
/// warning so a bad filter never breaks a report.
pub fn parse_date_param(name: &str, raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw.map(str::trim).filter(|value| !value.is_empty())?;
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            tracing::warn!(param = name, value = raw, "Ignoring malformed date filter");
            None
        }
    }
}

pub fn non_empty_opt(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

// Webhook payloads. Unknown fields are ignored throughout.

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub action: String,
    pub status: String,
    pub data: WebhookData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub booking: WebhookBooking,
}

/// Booking as sent by the channel manager. Identity and dates are strict;
/// money, times and timestamps are kept raw and parsed leniently.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookBooking {
    pub id: i64,
    pub begin_date: NaiveDate,
    pub end_date: NaiveDate,
    pub realty_id: i64,
    pub client_id: Option<i64>,
    pub amount: Option<Value>,
    pub prepayment: Option<Value>,
    pub payment: Option<Value>,
    pub platform_tax: Option<Value>,
    pub balance_to_be_paid_1: Option<Value>,
    pub arrival_time: Option<Value>,
    pub departure_time: Option<Value>,
    pub notes: Option<String>,
    pub client: Option<WebhookClient>,
    pub apartment: Option<WebhookApartment>,
    pub address: Option<String>,
    pub number_of_days: Option<i32>,
    pub number_of_nights: Option<i32>,
    #[serde(default)]
    pub is_delete: bool,
    pub created_at: Option<Value>,
    pub updated_at: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookClient {
    /// Used when the booking carries no top-level `client_id`.
    pub id: Option<i64>,
    pub fio: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookApartment {
    pub title: Option<String>,
    pub address: Option<String>,
}

// Bookings.

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct BookingsQuery {
    pub filter_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct CheckinCommentInput {
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CreateBookingServiceInput {
    pub booking_id: i64,
    pub service_id: i64,
    #[validate(range(min = 0.0))]
    pub price: f64,
}

// Service catalog and realty.

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct NameInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

impl NameInput {
    pub fn trimmed(&self) -> Result<String, AppError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("Name must not be empty.".to_string()));
        }
        Ok(name.to_string())
    }
}

// Payments and expenses.

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct PaymentsQuery {
    pub filter_date: Option<String>,
    pub filter_date_from: Option<String>,
    pub filter_date_to: Option<String>,
    pub apartment_title: Option<String>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct ExpensesQuery {
    pub filter_date_from: Option<String>,
    pub filter_date_to: Option<String>,
    pub apartment_title: Option<String>,
}

// Dashboard.

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct DashboardQuery {
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct IdPath {
    pub id: i64,
}
