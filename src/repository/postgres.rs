use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder};

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

const BOOKING_COLUMNS: &str = "id, action, status, begin_date, end_date, realty_id, client_id, \
     amount::float8 AS amount, prepayment::float8 AS prepayment, payment::float8 AS payment, \
     platform_tax::float8 AS platform_tax, balance_to_be_paid_1::float8 AS balance_to_be_paid_1, \
     arrival_time, departure_time, notes, checkin_day_comments, client_fio, client_phone, \
     client_email, apartment_title, apartment_address, number_of_days, number_of_nights, \
     is_delete, webhook_created_at, webhook_updated_at, created_at, updated_at";

const PAYMENT_COLUMNS: &str = "id, booking_id, booking_service_id, apartment_title, receipt_date, \
     receipt_time, amount::float8 AS amount, advance_for_future::float8 AS advance_for_future, \
     operation_type, income_category, comment, created_at, updated_at";

const EXPENSE_COLUMNS: &str = "id, apartment_title, expense_date, amount::float8 AS amount, \
     category, comment, created_at, updated_at";

const PLAN_COLUMNS: &str =
    "id, start_date, end_date, target_amount::float8 AS target_amount, created_at, updated_at";

const SERVICE_COLUMNS: &str = "id, name, is_active, created_at, updated_at";

const REALTY_COLUMNS: &str = "id, name, is_active, created_at, updated_at";

/// Repository implementation over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub fn map_db_error(error: sqlx::Error) -> AppError {
    let message = error.to_string();
    tracing::error!(db_error = %message, "Database query failed");

    let code = error
        .as_database_error()
        .and_then(|db_error| db_error.code())
        .map(|code| code.into_owned());
    let lowered = message.to_ascii_lowercase();
    if code.as_deref() == Some("23505")
        || lowered.contains("duplicate key value violates unique constraint")
    {
        return AppError::Conflict("Duplicate value violates a unique constraint.".to_string());
    }
    if code.as_deref() == Some("23503") || lowered.contains("violates foreign key constraint") {
        return AppError::NotFound("Referenced record does not exist.".to_string());
    }
    AppError::Dependency("Database operation failed.".to_string())
}

fn push_title_filter(query: &mut QueryBuilder<'_, Postgres>, title: Option<&String>) {
    if let Some(title) = title {
        query.push(" AND apartment_title = ").push_bind(title.clone());
    }
}

#[async_trait]
impl BookingRepository for PgStore {
    async fn upsert(&self, booking: BookingUpsert) -> AppResult<Booking> {
        let sql = format!(
            "INSERT INTO bookings (
                id, action, status, begin_date, end_date, realty_id, client_id, amount,
                prepayment, payment, platform_tax, balance_to_be_paid_1, arrival_time,
                departure_time, notes, client_fio, client_phone, client_email, apartment_title,
                apartment_address, number_of_days, number_of_nights, is_delete,
                webhook_created_at, webhook_updated_at
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                     $17, $18, $19, $20, $21, $22, $23, $24, $25)
             ON CONFLICT (id) DO UPDATE SET
                action = EXCLUDED.action,
                status = EXCLUDED.status,
                begin_date = EXCLUDED.begin_date,
                end_date = EXCLUDED.end_date,
                realty_id = EXCLUDED.realty_id,
                client_id = EXCLUDED.client_id,
                amount = EXCLUDED.amount,
                prepayment = EXCLUDED.prepayment,
                payment = EXCLUDED.payment,
                platform_tax = EXCLUDED.platform_tax,
                balance_to_be_paid_1 = EXCLUDED.balance_to_be_paid_1,
                arrival_time = EXCLUDED.arrival_time,
                departure_time = EXCLUDED.departure_time,
                notes = EXCLUDED.notes,
                client_fio = EXCLUDED.client_fio,
                client_phone = EXCLUDED.client_phone,
                client_email = EXCLUDED.client_email,
                apartment_title = EXCLUDED.apartment_title,
                apartment_address = EXCLUDED.apartment_address,
                number_of_days = EXCLUDED.number_of_days,
                number_of_nights = EXCLUDED.number_of_nights,
                is_delete = EXCLUDED.is_delete,
                webhook_created_at = EXCLUDED.webhook_created_at,
                webhook_updated_at = EXCLUDED.webhook_updated_at,
                updated_at = now()
             RETURNING {BOOKING_COLUMNS}"
        );
        sqlx::query_as::<_, Booking>(&sql)
            .bind(booking.id)
            .bind(booking.action)
            .bind(booking.status)
            .bind(booking.begin_date)
            .bind(booking.end_date)
            .bind(booking.realty_id)
            .bind(booking.client_id)
            .bind(booking.amount)
            .bind(booking.prepayment)
            .bind(booking.payment)
            .bind(booking.platform_tax)
            .bind(booking.balance_to_be_paid_1)
            .bind(booking.arrival_time)
            .bind(booking.departure_time)
            .bind(booking.notes)
            .bind(booking.client_fio)
            .bind(booking.client_phone)
            .bind(booking.client_email)
            .bind(booking.apartment_title)
            .bind(booking.apartment_address)
            .bind(booking.number_of_days)
            .bind(booking.number_of_nights)
            .bind(booking.is_delete)
            .bind(booking.webhook_created_at)
            .bind(booking.webhook_updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn mark_deleted(&self, id: i64) -> AppResult<Option<Booking>> {
        let sql = format!(
            "UPDATE bookings SET is_delete = TRUE, status = 'deleted', updated_at = now()
             WHERE id = $1
             RETURNING {BOOKING_COLUMNS}"
        );
        sqlx::query_as::<_, Booking>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn get(&self, id: i64) -> AppResult<Option<Booking>> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1 LIMIT 1");
        sqlx::query_as::<_, Booking>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn list_active(&self, filter: &BookingFilter) -> AppResult<Vec<Booking>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE is_delete = FALSE"
        ));
        if let Some(day) = filter.touching_date {
            query
                .push(" AND (begin_date = ")
                .push_bind(day)
                .push(" OR end_date = ")
                .push_bind(day)
                .push(")");
        }
        if let Some(from) = filter.begin_from {
            query.push(" AND begin_date >= ").push_bind(from);
        }
        if let Some(to) = filter.begin_to {
            query.push(" AND begin_date <= ").push_bind(to);
        }
        push_title_filter(&mut query, filter.apartment_title.as_ref());
        query.push(" ORDER BY begin_date DESC, id DESC");

        query
            .build_query_as::<Booking>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn update_checkin_comment(
        &self,
        id: i64,
        comments: Option<String>,
    ) -> AppResult<Option<Booking>> {
        let sql = format!(
            "UPDATE bookings SET checkin_day_comments = $2, updated_at = now()
             WHERE id = $1
             RETURNING {BOOKING_COLUMNS}"
        );
        sqlx::query_as::<_, Booking>(&sql)
            .bind(id)
            .bind(comments)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn distinct_titles(&self) -> AppResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT apartment_title FROM bookings
             WHERE is_delete = FALSE AND apartment_title IS NOT NULL
               AND btrim(apartment_title) <> ''
             ORDER BY apartment_title",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)
    }
}

#[async_trait]
impl ServiceRepository for PgStore {
    async fn list(&self, active_only: bool) -> AppResult<Vec<Service>> {
        let sql = format!(
            "SELECT {SERVICE_COLUMNS} FROM services
             WHERE ($1 = FALSE OR is_active = TRUE)
             ORDER BY name"
        );
        sqlx::query_as::<_, Service>(&sql)
            .bind(active_only)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn get(&self, id: i64) -> AppResult<Option<Service>> {
        let sql = format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = $1");
        sqlx::query_as::<_, Service>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Service>> {
        let sql = format!("SELECT {SERVICE_COLUMNS} FROM services WHERE name = $1");
        sqlx::query_as::<_, Service>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn create(&self, name: &str) -> AppResult<Service> {
        let sql = format!("INSERT INTO services (name) VALUES ($1) RETURNING {SERVICE_COLUMNS}");
        sqlx::query_as::<_, Service>(&sql)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn rename(&self, id: i64, name: &str) -> AppResult<Option<Service>> {
        let sql = format!(
            "UPDATE services SET name = $2, updated_at = now()
             WHERE id = $1
             RETURNING {SERVICE_COLUMNS}"
        );
        sqlx::query_as::<_, Service>(&sql)
            .bind(id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn toggle(&self, id: i64) -> AppResult<Option<Service>> {
        let sql = format!(
            "UPDATE services SET is_active = NOT is_active, updated_at = now()
             WHERE id = $1
             RETURNING {SERVICE_COLUMNS}"
        );
        sqlx::query_as::<_, Service>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn list_for_booking(&self, booking_id: i64) -> AppResult<Vec<BookingServiceLine>> {
        sqlx::query_as::<_, BookingServiceLine>(
            "SELECT bs.id, bs.booking_id, bs.service_id, s.name AS service_name,
                    bs.price::float8 AS price, bs.created_at
             FROM booking_services bs
             JOIN services s ON s.id = bs.service_id
             WHERE bs.booking_id = $1
             ORDER BY bs.id",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn add_to_booking(
        &self,
        booking_id: i64,
        service_id: i64,
        price: f64,
    ) -> AppResult<BookingService> {
        sqlx::query_as::<_, BookingService>(
            "INSERT INTO booking_services (booking_id, service_id, price)
             VALUES ($1, $2, $3)
             RETURNING id, booking_id, service_id, price::float8 AS price, created_at",
        )
        .bind(booking_id)
        .bind(service_id)
        .bind(price)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn get_booking_service(&self, id: i64) -> AppResult<Option<BookingService>> {
        sqlx::query_as::<_, BookingService>(
            "SELECT id, booking_id, service_id, price::float8 AS price, created_at
             FROM booking_services WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn remove_from_booking(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM booking_services WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PaymentRepository for PgStore {
    async fn list(&self, filter: &PaymentFilter) -> AppResult<Vec<Payment>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE TRUE"
        ));
        if let Some(day) = filter.receipt_date {
            query.push(" AND receipt_date = ").push_bind(day);
        }
        if let Some(from) = filter.date_from {
            query.push(" AND receipt_date >= ").push_bind(from);
        }
        if let Some(to) = filter.date_to {
            query.push(" AND receipt_date <= ").push_bind(to);
        }
        push_title_filter(&mut query, filter.apartment_title.as_ref());
        query.push(" ORDER BY receipt_date DESC, id DESC");

        query
            .build_query_as::<Payment>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn get(&self, id: i64) -> AppResult<Option<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1");
        sqlx::query_as::<_, Payment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn create(&self, payment: NewPayment) -> AppResult<Payment> {
        let sql = format!(
            "INSERT INTO payments (
                booking_id, booking_service_id, apartment_title, receipt_date, receipt_time,
                amount, advance_for_future, operation_type, income_category, comment
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {PAYMENT_COLUMNS}"
        );
        sqlx::query_as::<_, Payment>(&sql)
            .bind(payment.booking_id)
            .bind(payment.booking_service_id)
            .bind(payment.apartment_title)
            .bind(payment.receipt_date)
            .bind(payment.receipt_time)
            .bind(payment.amount)
            .bind(payment.advance_for_future)
            .bind(payment.operation_type)
            .bind(payment.income_category)
            .bind(payment.comment)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn update(&self, id: i64, patch: PaymentPatch) -> AppResult<Option<Payment>> {
        let Some(mut payment) = PaymentRepository::get(self, id).await? else {
            return Ok(None);
        };
        payment.apply(patch, Utc::now());

        let sql = format!(
            "UPDATE payments SET
                apartment_title = $2, receipt_date = $3, receipt_time = $4, amount = $5,
                advance_for_future = $6, operation_type = $7, income_category = $8,
                comment = $9, updated_at = now()
             WHERE id = $1
             RETURNING {PAYMENT_COLUMNS}"
        );
        sqlx::query_as::<_, Payment>(&sql)
            .bind(id)
            .bind(payment.apartment_title)
            .bind(payment.receipt_date)
            .bind(payment.receipt_time)
            .bind(payment.amount)
            .bind(payment.advance_for_future)
            .bind(payment.operation_type)
            .bind(payment.income_category)
            .bind(payment.comment)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM payments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn distinct_titles(&self) -> AppResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT apartment_title FROM payments
             WHERE apartment_title IS NOT NULL AND btrim(apartment_title) <> ''
             ORDER BY apartment_title",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)
    }
}

#[async_trait]
impl ExpenseRepository for PgStore {
    async fn list(&self, filter: &ExpenseFilter) -> AppResult<Vec<Expense>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE TRUE"
        ));
        if let Some(from) = filter.date_from {
            query.push(" AND expense_date >= ").push_bind(from);
        }
        if let Some(to) = filter.date_to {
            query.push(" AND expense_date <= ").push_bind(to);
        }
        push_title_filter(&mut query, filter.apartment_title.as_ref());
        query.push(" ORDER BY expense_date DESC, id DESC");

        query
            .build_query_as::<Expense>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn get(&self, id: i64) -> AppResult<Option<Expense>> {
        let sql = format!("SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = $1");
        sqlx::query_as::<_, Expense>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn create(&self, expense: NewExpense) -> AppResult<Expense> {
        let expense = expense.normalized();
        let sql = format!(
            "INSERT INTO expenses (apartment_title, expense_date, amount, category, comment)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {EXPENSE_COLUMNS}"
        );
        sqlx::query_as::<_, Expense>(&sql)
            .bind(expense.apartment_title)
            .bind(expense.expense_date)
            .bind(expense.amount)
            .bind(expense.category)
            .bind(expense.comment)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn update(&self, id: i64, patch: ExpensePatch) -> AppResult<Option<Expense>> {
        let Some(mut expense) = ExpenseRepository::get(self, id).await? else {
            return Ok(None);
        };
        expense.apply(patch, Utc::now());

        let sql = format!(
            "UPDATE expenses SET
                apartment_title = $2, expense_date = $3, amount = $4, category = $5,
                comment = $6, updated_at = now()
             WHERE id = $1
             RETURNING {EXPENSE_COLUMNS}"
        );
        sqlx::query_as::<_, Expense>(&sql)
            .bind(id)
            .bind(expense.apartment_title)
            .bind(expense.expense_date)
            .bind(expense.amount)
            .bind(expense.category)
            .bind(expense.comment)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn distinct_titles(&self) -> AppResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT apartment_title FROM expenses
             WHERE apartment_title IS NOT NULL AND btrim(apartment_title) <> ''
             ORDER BY apartment_title",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)
    }
}

#[async_trait]
impl RealtyRepository for PgStore {
    async fn list(&self) -> AppResult<Vec<Realty>> {
        let sql = format!("SELECT {REALTY_COLUMNS} FROM realty ORDER BY name");
        sqlx::query_as::<_, Realty>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn get(&self, id: i64) -> AppResult<Option<Realty>> {
        let sql = format!("SELECT {REALTY_COLUMNS} FROM realty WHERE id = $1");
        sqlx::query_as::<_, Realty>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn insert_missing(&self, names: &[String]) -> AppResult<u64> {
        if names.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "INSERT INTO realty (name)
             SELECT UNNEST($1::text[])
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(names)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(result.rows_affected())
    }

    async fn rename(&self, id: i64, name: &str) -> AppResult<Option<RealtyRename>> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let old_name =
            sqlx::query_scalar::<_, String>("SELECT name FROM realty WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_db_error)?;
        let Some(old_name) = old_name else {
            return Ok(None);
        };

        let sql = format!(
            "UPDATE realty SET name = $2, updated_at = now()
             WHERE id = $1
             RETURNING {REALTY_COLUMNS}"
        );
        let realty = sqlx::query_as::<_, Realty>(&sql)
            .bind(id)
            .bind(name)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_db_error)?;
        let bookings = sqlx::query(
            "UPDATE bookings SET apartment_title = $2, updated_at = now()
             WHERE apartment_title = $1",
        )
        .bind(&old_name)
        .bind(name)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?
        .rows_affected();
        let payments = sqlx::query(
            "UPDATE payments SET apartment_title = $2, updated_at = now()
             WHERE apartment_title = $1",
        )
        .bind(&old_name)
        .bind(name)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?
        .rows_affected();

        tx.commit().await.map_err(map_db_error)?;
        Ok(Some(RealtyRename {
            realty,
            bookings,
            payments,
        }))
    }

    async fn toggle(&self, id: i64) -> AppResult<Option<Realty>> {
        let sql = format!(
            "UPDATE realty SET is_active = NOT is_active, updated_at = now()
             WHERE id = $1
             RETURNING {REALTY_COLUMNS}"
        );
        sqlx::query_as::<_, Realty>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn inactive_names(&self) -> AppResult<Vec<String>> {
        sqlx::query_scalar::<_, String>("SELECT name FROM realty WHERE is_active = FALSE")
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)
    }
}

#[async_trait]
impl PlanRepository for PgStore {
    async fn list(&self) -> AppResult<Vec<MonthlyPlan>> {
        let sql =
            format!("SELECT {PLAN_COLUMNS} FROM monthly_plans ORDER BY start_date DESC, id DESC");
        sqlx::query_as::<_, MonthlyPlan>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn get(&self, id: i64) -> AppResult<Option<MonthlyPlan>> {
        let sql = format!("SELECT {PLAN_COLUMNS} FROM monthly_plans WHERE id = $1");
        sqlx::query_as::<_, MonthlyPlan>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn create(&self, plan: NewPlan) -> AppResult<MonthlyPlan> {
        let sql = format!(
            "INSERT INTO monthly_plans (start_date, end_date, target_amount)
             VALUES ($1, $2, $3)
             RETURNING {PLAN_COLUMNS}"
        );
        sqlx::query_as::<_, MonthlyPlan>(&sql)
            .bind(plan.start_date)
            .bind(plan.end_date)
            .bind(plan.target_amount)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn update(&self, id: i64, patch: PlanPatch) -> AppResult<Option<MonthlyPlan>> {
        let Some(mut plan) = PlanRepository::get(self, id).await? else {
            return Ok(None);
        };
        plan.apply(patch, Utc::now());

        let sql = format!(
            "UPDATE monthly_plans SET
                start_date = $2, end_date = $3, target_amount = $4, updated_at = now()
             WHERE id = $1
             RETURNING {PLAN_COLUMNS}"
        );
        sqlx::query_as::<_, MonthlyPlan>(&sql)
            .bind(id)
            .bind(plan.start_date)
            .bind(plan.end_date)
            .bind(plan.target_amount)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM monthly_plans WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(result.rows_affected() > 0)
    }
}
