use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A booking as mirrored from the channel manager. `id` is the external id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Booking {
    pub id: i64,
    pub action: String,
    pub status: String,
    pub begin_date: NaiveDate,
    pub end_date: NaiveDate,
    pub realty_id: i64,
    pub client_id: Option<i64>,
    pub amount: Option<f64>,
    pub prepayment: Option<f64>,
    pub payment: Option<f64>,
    pub platform_tax: Option<f64>,
    pub balance_to_be_paid_1: Option<f64>,
    pub arrival_time: Option<NaiveTime>,
    pub departure_time: Option<NaiveTime>,
    pub notes: Option<String>,
    pub checkin_day_comments: Option<String>,
    pub client_fio: Option<String>,
    pub client_phone: Option<String>,
    pub client_email: Option<String>,
    pub apartment_title: Option<String>,
    pub apartment_address: Option<String>,
    pub number_of_days: Option<i32>,
    pub number_of_nights: Option<i32>,
    pub is_delete: bool,
    pub webhook_created_at: Option<NaiveDateTime>,
    pub webhook_updated_at: Option<NaiveDateTime>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Build a fresh row from an upsert; the external id becomes the key.
    pub fn from_upsert(upsert: BookingUpsert, now: DateTime<Utc>) -> Self {
        let mut booking = Self {
            id: upsert.id,
            action: String::new(),
            status: String::new(),
            begin_date: upsert.begin_date,
            end_date: upsert.end_date,
            realty_id: upsert.realty_id,
            client_id: None,
            amount: None,
            prepayment: None,
            payment: None,
            platform_tax: None,
            balance_to_be_paid_1: None,
            arrival_time: None,
            departure_time: None,
            notes: None,
            checkin_day_comments: None,
            client_fio: None,
            client_phone: None,
            client_email: None,
            apartment_title: None,
            apartment_address: None,
            number_of_days: None,
            number_of_nights: None,
            is_delete: false,
            webhook_created_at: None,
            webhook_updated_at: None,
            created_at: now,
            updated_at: now,
        };
        booking.apply_upsert(upsert, now);
        booking
    }

    /// Overwrite every webhook-owned field. `checkin_day_comments` is
    /// maintained by staff and survives re-ingestion.
    pub fn apply_upsert(&mut self, upsert: BookingUpsert, now: DateTime<Utc>) {
        self.action = upsert.action;
        self.status = upsert.status;
        self.begin_date = upsert.begin_date;
        self.end_date = upsert.end_date;
        self.realty_id = upsert.realty_id;
        self.client_id = upsert.client_id;
        self.amount = upsert.amount;
        self.prepayment = upsert.prepayment;
        self.payment = upsert.payment;
        self.platform_tax = upsert.platform_tax;
        self.balance_to_be_paid_1 = upsert.balance_to_be_paid_1;
        self.arrival_time = upsert.arrival_time;
        self.departure_time = upsert.departure_time;
        self.notes = upsert.notes;
        self.client_fio = upsert.client_fio;
        self.client_phone = upsert.client_phone;
        self.client_email = upsert.client_email;
        self.apartment_title = upsert.apartment_title;
        self.apartment_address = upsert.apartment_address;
        self.number_of_days = upsert.number_of_days;
        self.number_of_nights = upsert.number_of_nights;
        self.is_delete = upsert.is_delete;
        self.webhook_created_at = upsert.webhook_created_at;
        self.webhook_updated_at = upsert.webhook_updated_at;
        self.updated_at = now;
    }

    pub fn unit_label(&self) -> &str {
        self.apartment_title.as_deref().unwrap_or_default()
    }

    /// Booking total net of the platform commission.
    pub fn net_amount(&self) -> f64 {
        self.amount.unwrap_or(0.0) - self.platform_tax.unwrap_or(0.0)
    }

    pub fn net_prepayment(&self) -> f64 {
        self.prepayment.unwrap_or(0.0) - self.platform_tax.unwrap_or(0.0)
    }

    /// Amount still to be collected on arrival.
    pub fn balance_due(&self) -> f64 {
        self.balance_to_be_paid_1
            .unwrap_or_else(|| self.amount.unwrap_or(0.0) - self.prepayment.unwrap_or(0.0))
    }
}

/// Webhook-owned booking fields, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingUpsert {
    pub id: i64,
    pub action: String,
    pub status: String,
    pub begin_date: NaiveDate,
    pub end_date: NaiveDate,
    pub realty_id: i64,
    pub client_id: Option<i64>,
    pub amount: Option<f64>,
    pub prepayment: Option<f64>,
    pub payment: Option<f64>,
    pub platform_tax: Option<f64>,
    pub balance_to_be_paid_1: Option<f64>,
    pub arrival_time: Option<NaiveTime>,
    pub departure_time: Option<NaiveTime>,
    pub notes: Option<String>,
    pub client_fio: Option<String>,
    pub client_phone: Option<String>,
    pub client_email: Option<String>,
    pub apartment_title: Option<String>,
    pub apartment_address: Option<String>,
    pub number_of_days: Option<i32>,
    pub number_of_nights: Option<i32>,
    pub is_delete: bool,
    pub webhook_created_at: Option<NaiveDateTime>,
    pub webhook_updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingFilter {
    /// Keep bookings whose begin or end date equals this day.
    pub touching_date: Option<NaiveDate>,
    pub begin_from: Option<NaiveDate>,
    pub begin_to: Option<NaiveDate>,
    pub apartment_title: Option<String>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        if let Some(day) = self.touching_date {
            if booking.begin_date != day && booking.end_date != day {
                return false;
            }
        }
        if self.begin_from.is_some_and(|from| booking.begin_date < from) {
            return false;
        }
        if self.begin_to.is_some_and(|to| booking.begin_date > to) {
            return false;
        }
        if let Some(title) = &self.apartment_title {
            if booking.apartment_title.as_deref() != Some(title.as_str()) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BookingService {
    pub id: i64,
    pub booking_id: i64,
    pub service_id: i64,
    pub price: f64,
    pub created_at: DateTime<Utc>,
}

/// A booking service joined with its catalog name.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct BookingServiceLine {
    pub id: i64,
    pub booking_id: i64,
    pub service_id: i64,
    pub service_name: String,
    pub price: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: i64,
    pub booking_id: Option<i64>,
    pub booking_service_id: Option<i64>,
    pub apartment_title: Option<String>,
    pub receipt_date: NaiveDate,
    pub receipt_time: Option<NaiveTime>,
    pub amount: f64,
    pub advance_for_future: Option<f64>,
    pub operation_type: Option<String>,
    pub income_category: Option<String>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn apply(&mut self, patch: PaymentPatch, now: DateTime<Utc>) {
        if let Some(title) = patch.apartment_title {
            self.apartment_title = non_blank(title);
        }
        if let Some(receipt_date) = patch.receipt_date {
            self.receipt_date = receipt_date;
        }
        if let Some(receipt_time) = patch.receipt_time {
            self.receipt_time = Some(receipt_time);
        }
        if let Some(amount) = patch.amount {
            self.amount = amount;
        }
        if let Some(advance) = patch.advance_for_future {
            self.advance_for_future = Some(advance);
        }
        if let Some(operation_type) = patch.operation_type {
            self.operation_type = non_blank(operation_type);
        }
        if let Some(category) = patch.income_category {
            self.income_category = non_blank(category);
        }
        if let Some(comment) = patch.comment {
            self.comment = non_blank(comment);
        }
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewPayment {
    pub booking_id: Option<i64>,
    pub booking_service_id: Option<i64>,
    pub apartment_title: Option<String>,
    pub receipt_date: NaiveDate,
    pub receipt_time: Option<NaiveTime>,
    #[validate(range(min = 0.0))]
    pub amount: f64,
    pub advance_for_future: Option<f64>,
    pub operation_type: Option<String>,
    pub income_category: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentPatch {
    pub apartment_title: Option<String>,
    pub receipt_date: Option<NaiveDate>,
    pub receipt_time: Option<NaiveTime>,
    pub amount: Option<f64>,
    pub advance_for_future: Option<f64>,
    pub operation_type: Option<String>,
    pub income_category: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentFilter {
    pub receipt_date: Option<NaiveDate>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub apartment_title: Option<String>,
}

impl PaymentFilter {
    pub fn matches(&self, payment: &Payment) -> bool {
        if self.receipt_date.is_some_and(|day| payment.receipt_date != day) {
            return false;
        }
        if self.date_from.is_some_and(|from| payment.receipt_date < from) {
            return false;
        }
        if self.date_to.is_some_and(|to| payment.receipt_date > to) {
            return false;
        }
        if let Some(title) = &self.apartment_title {
            if payment.apartment_title.as_deref() != Some(title.as_str()) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Expense {
    pub id: i64,
    pub apartment_title: Option<String>,
    pub expense_date: NaiveDate,
    pub amount: f64,
    pub category: Option<String>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Expense {
    /// An expense not attributed to any unit.
    pub fn is_general(&self) -> bool {
        self.apartment_title
            .as_deref()
            .is_none_or(|title| title.trim().is_empty())
    }

    pub fn apply(&mut self, patch: ExpensePatch, now: DateTime<Utc>) {
        if let Some(title) = patch.apartment_title {
            self.apartment_title = non_blank(title);
        }
        if let Some(expense_date) = patch.expense_date {
            self.expense_date = expense_date;
        }
        if let Some(amount) = patch.amount {
            self.amount = amount;
        }
        if let Some(category) = patch.category {
            self.category = non_blank(category);
        }
        if let Some(comment) = patch.comment {
            self.comment = non_blank(comment);
        }
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewExpense {
    pub apartment_title: Option<String>,
    pub expense_date: NaiveDate,
    #[validate(range(min = 0.0))]
    pub amount: f64,
    pub category: Option<String>,
    pub comment: Option<String>,
}

impl NewExpense {
    /// Blank optional text is stored as null; a blank title makes the
    /// expense a general one.
    pub fn normalized(self) -> Self {
        Self {
            apartment_title: self.apartment_title.and_then(non_blank),
            category: self.category.and_then(non_blank),
            comment: self.comment.and_then(non_blank),
            ..self
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpensePatch {
    pub apartment_title: Option<String>,
    pub expense_date: Option<NaiveDate>,
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpenseFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub apartment_title: Option<String>,
}

impl ExpenseFilter {
    pub fn matches(&self, expense: &Expense) -> bool {
        if self.date_from.is_some_and(|from| expense.expense_date < from) {
            return false;
        }
        if self.date_to.is_some_and(|to| expense.expense_date > to) {
            return false;
        }
        if let Some(title) = &self.apartment_title {
            if expense.apartment_title.as_deref() != Some(title.as_str()) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Realty {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A renamed realty entry and how many rows took the new title.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtyRename {
    pub realty: Realty,
    pub bookings: u64,
    pub payments: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MonthlyPlan {
    pub id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub target_amount: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MonthlyPlan {
    pub fn apply(&mut self, patch: PlanPatch, now: DateTime<Utc>) {
        if let Some(start_date) = patch.start_date {
            self.start_date = start_date;
        }
        if let Some(end_date) = patch.end_date {
            self.end_date = end_date;
        }
        if let Some(target_amount) = patch.target_amount {
            self.target_amount = target_amount;
        }
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewPlan {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[validate(range(min = 0.0))]
    pub target_amount: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanPatch {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub target_amount: Option<f64>,
}

impl PlanPatch {
    pub fn is_empty(&self) -> bool {
        self.start_date.is_none() && self.end_date.is_none() && self.target_amount.is_none()
    }
}

pub fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
