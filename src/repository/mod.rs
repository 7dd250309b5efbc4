pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    error::AppResult,
    models::{
        Booking, BookingFilter, BookingService, BookingServiceLine, BookingUpsert, Expense,
        ExpenseFilter, ExpensePatch, MonthlyPlan, NewExpense, NewPayment, NewPlan, Payment,
        PaymentFilter, PaymentPatch, PlanPatch, Realty, RealtyRename, Service,
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Insert or overwrite the booking keyed by its external id.
    async fn upsert(&self, booking: BookingUpsert) -> AppResult<Booking>;
    async fn mark_deleted(&self, id: i64) -> AppResult<Option<Booking>>;
    /// Fetch a booking regardless of its soft-delete flag.
    async fn get(&self, id: i64) -> AppResult<Option<Booking>>;
    /// Non-deleted bookings matching the filter, newest begin date first,
    /// ties broken by id descending.
    async fn list_active(&self, filter: &BookingFilter) -> AppResult<Vec<Booking>>;
    async fn update_checkin_comment(
        &self,
        id: i64,
        comments: Option<String>,
    ) -> AppResult<Option<Booking>>;
    /// Distinct non-blank titles of non-deleted bookings.
    async fn distinct_titles(&self) -> AppResult<Vec<String>>;
}

#[async_trait]
pub trait ServiceRepository: Send + Sync {
    async fn list(&self, active_only: bool) -> AppResult<Vec<Service>>;
    async fn get(&self, id: i64) -> AppResult<Option<Service>>;
    async fn find_by_name(&self, name: &str) -> AppResult<Option<Service>>;
    /// Fails with `Conflict` when the name is taken.
    async fn create(&self, name: &str) -> AppResult<Service>;
    async fn rename(&self, id: i64, name: &str) -> AppResult<Option<Service>>;
    async fn toggle(&self, id: i64) -> AppResult<Option<Service>>;
    async fn list_for_booking(&self, booking_id: i64) -> AppResult<Vec<BookingServiceLine>>;
    async fn add_to_booking(
        &self,
        booking_id: i64,
        service_id: i64,
        price: f64,
    ) -> AppResult<BookingService>;
    async fn get_booking_service(&self, id: i64) -> AppResult<Option<BookingService>>;
    async fn remove_from_booking(&self, id: i64) -> AppResult<bool>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Matching payments, newest receipt date first.
    async fn list(&self, filter: &PaymentFilter) -> AppResult<Vec<Payment>>;
    async fn get(&self, id: i64) -> AppResult<Option<Payment>>;
    async fn create(&self, payment: NewPayment) -> AppResult<Payment>;
    async fn update(&self, id: i64, patch: PaymentPatch) -> AppResult<Option<Payment>>;
    async fn delete(&self, id: i64) -> AppResult<bool>;
    async fn distinct_titles(&self) -> AppResult<Vec<String>>;
}

#[async_trait]
pub trait ExpenseRepository: Send + Sync {
    /// Matching expenses, newest expense date first.
    async fn list(&self, filter: &ExpenseFilter) -> AppResult<Vec<Expense>>;
    async fn get(&self, id: i64) -> AppResult<Option<Expense>>;
    async fn create(&self, expense: NewExpense) -> AppResult<Expense>;
    async fn update(&self, id: i64, patch: ExpensePatch) -> AppResult<Option<Expense>>;
    async fn delete(&self, id: i64) -> AppResult<bool>;
    async fn distinct_titles(&self) -> AppResult<Vec<String>>;
}

#[async_trait]
pub trait RealtyRepository: Send + Sync {
    /// All entries ordered by name.
    async fn list(&self) -> AppResult<Vec<Realty>>;
    async fn get(&self, id: i64) -> AppResult<Option<Realty>>;
    /// Registers each unknown name as active. Returns how many were added.
    async fn insert_missing(&self, names: &[String]) -> AppResult<u64>;
    /// Renames the entry and moves every booking and payment carrying the old
    /// name to the new one, all or nothing.
    async fn rename(&self, id: i64, name: &str) -> AppResult<Option<RealtyRename>>;
    async fn toggle(&self, id: i64) -> AppResult<Option<Realty>>;
    async fn inactive_names(&self) -> AppResult<Vec<String>>;
}

#[async_trait]
pub trait PlanRepository: Send + Sync {
    /// Plans ordered by start date, newest first.
    async fn list(&self) -> AppResult<Vec<MonthlyPlan>>;
    async fn get(&self, id: i64) -> AppResult<Option<MonthlyPlan>>;
    async fn create(&self, plan: NewPlan) -> AppResult<MonthlyPlan>;
    async fn update(&self, id: i64, patch: PlanPatch) -> AppResult<Option<MonthlyPlan>>;
    async fn delete(&self, id: i64) -> AppResult<bool>;
}

/// Handles to every repository, shared by request handlers and services.
#[derive(Clone)]
pub struct Repositories {
    pub bookings: Arc<dyn BookingRepository>,
    pub services: Arc<dyn ServiceRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub expenses: Arc<dyn ExpenseRepository>,
    pub realty: Arc<dyn RealtyRepository>,
    pub plans: Arc<dyn PlanRepository>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self::from_store(Arc::new(PgStore::new(pool)))
    }

    pub fn memory() -> Self {
        Self::from_store(Arc::new(MemoryStore::default()))
    }

    fn from_store<S>(store: Arc<S>) -> Self
    where
        S: BookingRepository
            + ServiceRepository
            + PaymentRepository
            + ExpenseRepository
            + RealtyRepository
            + PlanRepository
            + 'static,
    {
        Self {
            bookings: store.clone(),
            services: store.clone(),
            payments: store.clone(),
            expenses: store.clone(),
            realty: store.clone(),
            plans: store,
        }
    }
}
