use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    error::{AppError, AppResult},
    models::{
        Booking, BookingFilter, BookingService, BookingServiceLine, BookingUpsert, Expense,
        ExpenseFilter, ExpensePatch, MonthlyPlan, NewExpense, NewPayment, NewPlan, Payment,
        PaymentFilter, PaymentPatch, PlanPatch, Realty, RealtyRename, Service,
    },
};

use super::{
    BookingRepository, ExpenseRepository, PaymentRepository, PlanRepository, RealtyRepository,
    ServiceRepository,
};

/// Process-local store used when no database is configured and in tests.
/// Guards are never held across an await point.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    bookings: BTreeMap<i64, Booking>,
    services: BTreeMap<i64, Service>,
    booking_services: BTreeMap<i64, BookingService>,
    payments: BTreeMap<i64, Payment>,
    expenses: BTreeMap<i64, Expense>,
    realty: BTreeMap<i64, Realty>,
    plans: BTreeMap<i64, MonthlyPlan>,
    last_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

impl MemoryStore {
    fn read(&self) -> AppResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| AppError::Internal("In-memory store lock poisoned.".to_string()))
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| AppError::Internal("In-memory store lock poisoned.".to_string()))
    }
}

fn duplicate() -> AppError {
    AppError::Conflict("Duplicate value violates a unique constraint.".to_string())
}

fn distinct_titles<'a>(titles: impl Iterator<Item = Option<&'a str>>) -> Vec<String> {
    titles
        .flatten()
        .filter(|title| !title.trim().is_empty())
        .map(ToOwned::to_owned)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn upsert(&self, upsert: BookingUpsert) -> AppResult<Booking> {
        let now = Utc::now();
        let mut tables = self.write()?;
        if let Some(existing) = tables.bookings.get_mut(&upsert.id) {
            existing.apply_upsert(upsert, now);
            return Ok(existing.clone());
        }
        let booking = Booking::from_upsert(upsert, now);
        tables.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn mark_deleted(&self, id: i64) -> AppResult<Option<Booking>> {
        let mut tables = self.write()?;
        Ok(tables.bookings.get_mut(&id).map(|booking| {
            booking.is_delete = true;
            booking.status = "deleted".to_string();
            booking.updated_at = Utc::now();
            booking.clone()
        }))
    }

    async fn get(&self, id: i64) -> AppResult<Option<Booking>> {
        Ok(self.read()?.bookings.get(&id).cloned())
    }

    async fn list_active(&self, filter: &BookingFilter) -> AppResult<Vec<Booking>> {
        let mut rows = self
            .read()?
            .bookings
            .values()
            .filter(|booking| !booking.is_delete && filter.matches(booking))
            .cloned()
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| {
            b.begin_date
                .cmp(&a.begin_date)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(rows)
    }

    async fn update_checkin_comment(
        &self,
        id: i64,
        comments: Option<String>,
    ) -> AppResult<Option<Booking>> {
        let mut tables = self.write()?;
        Ok(tables.bookings.get_mut(&id).map(|booking| {
            booking.checkin_day_comments = comments;
            booking.updated_at = Utc::now();
            booking.clone()
        }))
    }

    async fn distinct_titles(&self) -> AppResult<Vec<String>> {
        let tables = self.read()?;
        Ok(distinct_titles(
            tables
                .bookings
                .values()
                .filter(|booking| !booking.is_delete)
                .map(|booking| booking.apartment_title.as_deref()),
        ))
    }
}

#[async_trait]
impl ServiceRepository for MemoryStore {
    async fn list(&self, active_only: bool) -> AppResult<Vec<Service>> {
        let mut rows = self
            .read()?
            .services
            .values()
            .filter(|service| !active_only || service.is_active)
            .cloned()
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn get(&self, id: i64) -> AppResult<Option<Service>> {
        Ok(self.read()?.services.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Service>> {
        Ok(self
            .read()?
            .services
            .values()
            .find(|service| service.name == name)
            .cloned())
    }

    async fn create(&self, name: &str) -> AppResult<Service> {
        let mut tables = self.write()?;
        if tables.services.values().any(|service| service.name == name) {
            return Err(duplicate());
        }
        let now = Utc::now();
        let service = Service {
            id: tables.next_id(),
            name: name.to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        tables.services.insert(service.id, service.clone());
        Ok(service)
    }

    async fn rename(&self, id: i64, name: &str) -> AppResult<Option<Service>> {
        let mut tables = self.write()?;
        if tables
            .services
            .values()
            .any(|service| service.id != id && service.name == name)
        {
            return Err(duplicate());
        }
        Ok(tables.services.get_mut(&id).map(|service| {
            service.name = name.to_string();
            service.updated_at = Utc::now();
            service.clone()
        }))
    }

    async fn toggle(&self, id: i64) -> AppResult<Option<Service>> {
        let mut tables = self.write()?;
        Ok(tables.services.get_mut(&id).map(|service| {
            service.is_active = !service.is_active;
            service.updated_at = Utc::now();
            service.clone()
        }))
    }

    async fn list_for_booking(&self, booking_id: i64) -> AppResult<Vec<BookingServiceLine>> {
        let tables = self.read()?;
        Ok(tables
            .booking_services
            .values()
            .filter(|line| line.booking_id == booking_id)
            .map(|line| BookingServiceLine {
                id: line.id,
                booking_id: line.booking_id,
                service_id: line.service_id,
                service_name: tables
                    .services
                    .get(&line.service_id)
                    .map(|service| service.name.clone())
                    .unwrap_or_default(),
                price: line.price,
                created_at: line.created_at,
            })
            .collect())
    }

    async fn add_to_booking(
        &self,
        booking_id: i64,
        service_id: i64,
        price: f64,
    ) -> AppResult<BookingService> {
        let mut tables = self.write()?;
        let line = BookingService {
            id: tables.next_id(),
            booking_id,
            service_id,
            price,
            created_at: Utc::now(),
        };
        tables.booking_services.insert(line.id, line.clone());
        Ok(line)
    }

    async fn get_booking_service(&self, id: i64) -> AppResult<Option<BookingService>> {
        Ok(self.read()?.booking_services.get(&id).cloned())
    }

    async fn remove_from_booking(&self, id: i64) -> AppResult<bool> {
        Ok(self.write()?.booking_services.remove(&id).is_some())
    }
}

#[async_trait]
impl PaymentRepository for MemoryStore {
    async fn list(&self, filter: &PaymentFilter) -> AppResult<Vec<Payment>> {
        let mut rows = self
            .read()?
            .payments
            .values()
            .filter(|payment| filter.matches(payment))
            .cloned()
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| {
            b.receipt_date
                .cmp(&a.receipt_date)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(rows)
    }

    async fn get(&self, id: i64) -> AppResult<Option<Payment>> {
        Ok(self.read()?.payments.get(&id).cloned())
    }

    async fn create(&self, input: NewPayment) -> AppResult<Payment> {
        let mut tables = self.write()?;
        let now = Utc::now();
        let payment = Payment {
            id: tables.next_id(),
            booking_id: input.booking_id,
            booking_service_id: input.booking_service_id,
            apartment_title: input.apartment_title,
            receipt_date: input.receipt_date,
            receipt_time: input.receipt_time,
            amount: input.amount,
            advance_for_future: input.advance_for_future,
            operation_type: input.operation_type,
            income_category: input.income_category,
            comment: input.comment,
            created_at: now,
            updated_at: now,
        };
        tables.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn update(&self, id: i64, patch: PaymentPatch) -> AppResult<Option<Payment>> {
        let mut tables = self.write()?;
        Ok(tables.payments.get_mut(&id).map(|payment| {
            payment.apply(patch, Utc::now());
            payment.clone()
        }))
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        Ok(self.write()?.payments.remove(&id).is_some())
    }

    async fn distinct_titles(&self) -> AppResult<Vec<String>> {
        let tables = self.read()?;
        Ok(distinct_titles(
            tables
                .payments
                .values()
                .map(|payment| payment.apartment_title.as_deref()),
        ))
    }
}

#[async_trait]
impl ExpenseRepository for MemoryStore {
    async fn list(&self, filter: &ExpenseFilter) -> AppResult<Vec<Expense>> {
        let mut rows = self
            .read()?
            .expenses
            .values()
            .filter(|expense| filter.matches(expense))
            .cloned()
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| {
            b.expense_date
                .cmp(&a.expense_date)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(rows)
    }

    async fn get(&self, id: i64) -> AppResult<Option<Expense>> {
        Ok(self.read()?.expenses.get(&id).cloned())
    }

    async fn create(&self, input: NewExpense) -> AppResult<Expense> {
        let input = input.normalized();
        let mut tables = self.write()?;
        let now = Utc::now();
        let expense = Expense {
            id: tables.next_id(),
            apartment_title: input.apartment_title,
            expense_date: input.expense_date,
            amount: input.amount,
            category: input.category,
            comment: input.comment,
            created_at: now,
            updated_at: now,
        };
        tables.expenses.insert(expense.id, expense.clone());
        Ok(expense)
    }

    async fn update(&self, id: i64, patch: ExpensePatch) -> AppResult<Option<Expense>> {
        let mut tables = self.write()?;
        Ok(tables.expenses.get_mut(&id).map(|expense| {
            expense.apply(patch, Utc::now());
            expense.clone()
        }))
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        Ok(self.write()?.expenses.remove(&id).is_some())
    }

    async fn distinct_titles(&self) -> AppResult<Vec<String>> {
        let tables = self.read()?;
        Ok(distinct_titles(
            tables
                .expenses
                .values()
                .map(|expense| expense.apartment_title.as_deref()),
        ))
    }
}

#[async_trait]
impl RealtyRepository for MemoryStore {
    async fn list(&self) -> AppResult<Vec<Realty>> {
        let mut rows = self.read()?.realty.values().cloned().collect::<Vec<_>>();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn get(&self, id: i64) -> AppResult<Option<Realty>> {
        Ok(self.read()?.realty.get(&id).cloned())
    }

    async fn insert_missing(&self, names: &[String]) -> AppResult<u64> {
        let mut tables = self.write()?;
        let mut added = 0;
        for name in names {
            if tables.realty.values().any(|realty| &realty.name == name) {
                continue;
            }
            let now = Utc::now();
            let realty = Realty {
                id: tables.next_id(),
                name: name.clone(),
                is_active: true,
                created_at: now,
                updated_at: now,
            };
            tables.realty.insert(realty.id, realty);
            added += 1;
        }
        Ok(added)
    }

    async fn rename(&self, id: i64, name: &str) -> AppResult<Option<RealtyRename>> {
        let mut tables = self.write()?;
        if tables
            .realty
            .values()
            .any(|realty| realty.id != id && realty.name == name)
        {
            return Err(duplicate());
        }
        let now = Utc::now();
        let Some(realty) = tables.realty.get_mut(&id) else {
            return Ok(None);
        };
        let old_name = std::mem::replace(&mut realty.name, name.to_string());
        realty.updated_at = now;
        let realty = realty.clone();

        let mut bookings = 0;
        for booking in tables.bookings.values_mut() {
            if booking.apartment_title.as_deref() == Some(old_name.as_str()) {
                booking.apartment_title = Some(name.to_string());
                booking.updated_at = now;
                bookings += 1;
            }
        }
        let mut payments = 0;
        for payment in tables.payments.values_mut() {
            if payment.apartment_title.as_deref() == Some(old_name.as_str()) {
                payment.apartment_title = Some(name.to_string());
                payment.updated_at = now;
                payments += 1;
            }
        }
        Ok(Some(RealtyRename {
            realty,
            bookings,
            payments,
        }))
    }

    async fn toggle(&self, id: i64) -> AppResult<Option<Realty>> {
        let mut tables = self.write()?;
        Ok(tables.realty.get_mut(&id).map(|realty| {
            realty.is_active = !realty.is_active;
            realty.updated_at = Utc::now();
            realty.clone()
        }))
    }

    async fn inactive_names(&self) -> AppResult<Vec<String>> {
        Ok(self
            .read()?
            .realty
            .values()
            .filter(|realty| !realty.is_active)
            .map(|realty| realty.name.clone())
            .collect())
    }
}

#[async_trait]
impl PlanRepository for MemoryStore {
    async fn list(&self) -> AppResult<Vec<MonthlyPlan>> {
        let mut rows = self.read()?.plans.values().cloned().collect::<Vec<_>>();
        rows.sort_by(|a, b| {
            b.start_date
                .cmp(&a.start_date)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(rows)
    }

    async fn get(&self, id: i64) -> AppResult<Option<MonthlyPlan>> {
        Ok(self.read()?.plans.get(&id).cloned())
    }

    async fn create(&self, input: NewPlan) -> AppResult<MonthlyPlan> {
        let mut tables = self.write()?;
        let now = Utc::now();
        let plan = MonthlyPlan {
            id: tables.next_id(),
            start_date: input.start_date,
            end_date: input.end_date,
            target_amount: input.target_amount,
            created_at: now,
            updated_at: now,
        };
        tables.plans.insert(plan.id, plan.clone());
        Ok(plan)
    }

    async fn update(&self, id: i64, patch: PlanPatch) -> AppResult<Option<MonthlyPlan>> {
        let mut tables = self.write()?;
        Ok(tables.plans.get_mut(&id).map(|plan| {
            plan.apply(patch, Utc::now());
            plan.clone()
        }))
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        Ok(self.write()?.plans.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::{
        models::{BookingFilter, BookingUpsert},
        repository::Repositories,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn booking(id: i64, title: &str, begin: NaiveDate) -> BookingUpsert {
        BookingUpsert {
            id,
            action: "create_booking".to_string(),
            status: "booked".to_string(),
            begin_date: begin,
            end_date: begin + chrono::Duration::days(2),
            realty_id: 1,
            client_id: None,
            amount: Some(1000.0),
            prepayment: None,
            payment: None,
            platform_tax: None,
            balance_to_be_paid_1: None,
            arrival_time: None,
            departure_time: None,
            notes: None,
            client_fio: None,
            client_phone: None,
            client_email: None,
            apartment_title: Some(title.to_string()),
            apartment_address: None,
            number_of_days: None,
            number_of_nights: None,
            is_delete: false,
            webhook_created_at: None,
            webhook_updated_at: None,
        }
    }

    #[tokio::test]
    async fn upsert_never_duplicates_and_soft_delete_hides_from_active() {
        let repos = Repositories::memory();
        repos
            .bookings
            .upsert(booking(1001, "29Б", date(2024, 6, 1)))
            .await
            .unwrap();
        let mut changed = booking(1001, "29Б", date(2024, 6, 1));
        changed.amount = Some(12000.0);
        repos.bookings.upsert(changed).await.unwrap();

        let active = repos
            .bookings
            .list_active(&BookingFilter::default())
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].amount, Some(12000.0));

        repos.bookings.mark_deleted(1001).await.unwrap();
        let active = repos
            .bookings
            .list_active(&BookingFilter::default())
            .await
            .unwrap();
        assert!(active.is_empty());
        let raw = repos.bookings.get(1001).await.unwrap().unwrap();
        assert!(raw.is_delete);
        assert_eq!(raw.status, "deleted");
    }

    #[tokio::test]
    async fn active_bookings_are_ordered_by_begin_then_id_descending() {
        let repos = Repositories::memory();
        for (id, begin) in [(1, date(2024, 6, 1)), (3, date(2024, 6, 1)), (2, date(2024, 6, 5))] {
            repos.bookings.upsert(booking(id, "A", begin)).await.unwrap();
        }
        let ids = repos
            .bookings
            .list_active(&BookingFilter::default())
            .await
            .unwrap()
            .into_iter()
            .map(|booking| booking.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[tokio::test]
    async fn service_names_are_unique() {
        let repos = Repositories::memory();
        repos.services.create("Баня").await.unwrap();
        let error = repos.services.create("Баня").await.unwrap_err();
        assert_eq!(error.status_code(), axum::http::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn realty_registration_skips_known_names() {
        let repos = Repositories::memory();
        let names = vec!["A".to_string(), "B".to_string()];
        assert_eq!(repos.realty.insert_missing(&names).await.unwrap(), 2);
        assert_eq!(repos.realty.insert_missing(&names).await.unwrap(), 0);
        let listed = repos.realty.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        repos.realty.toggle(listed[0].id).await.unwrap();
        assert_eq!(repos.realty.inactive_names().await.unwrap(), vec!["A"]);
    }
}
