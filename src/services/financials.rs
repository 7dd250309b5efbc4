use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    error::AppResult,
    models::{BookingFilter, ExpenseFilter, PaymentFilter},
    repository::Repositories,
    services::address::grouping_key,
};

/// Income, expenses and profit of one unit over one period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UnitFinancials {
    pub income: f64,
    pub expenses: f64,
    pub profit: f64,
}

impl UnitFinancials {
    pub fn is_empty(&self) -> bool {
        self.income == 0.0 && self.expenses == 0.0 && self.profit == 0.0
    }
}

/// Totals of every unit sharing a grouping key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObjectTotals {
    pub apartments: Vec<String>,
    pub income: f64,
    pub expenses: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthReport {
    pub month: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Units with no activity in the month are absent, not zeroed.
    pub objects: BTreeMap<String, ObjectTotals>,
    pub total_income: f64,
    /// Unit expenses only; `general_expenses` is reported separately.
    pub total_expenses: f64,
    pub total_profit: f64,
    pub general_expenses: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct YearlyTotals {
    pub total_income: f64,
    pub total_expenses: f64,
    pub total_profit: f64,
    pub total_general_expenses: f64,
    pub grand_total_expenses: f64,
}

impl YearlyTotals {
    /// Unit expenses plus general expenses.
    pub fn grand_total_expenses(&self) -> f64 {
        round2(self.total_expenses + self.total_general_expenses)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApartmentSummary {
    pub apartments: Vec<String>,
    pub total_income: f64,
    pub total_expenses: f64,
    pub total_profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnualReport {
    pub year: i32,
    pub months: BTreeMap<String, MonthReport>,
    pub yearly_totals: YearlyTotals,
    pub apartment_summary: BTreeMap<String, ApartmentSummary>,
}

/// Reporting window of a month: the 1st through the 1st of the following
/// month inclusive, except December which ends on the 31st.
pub fn month_range(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let end = if month == 12 {
        NaiveDate::from_ymd_opt(year, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((start, end))
}

pub async fn unit_financials(
    repos: &Repositories,
    unit: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> AppResult<UnitFinancials> {
    let bookings = repos
        .bookings
        .list_active(&BookingFilter {
            begin_from: Some(start),
            begin_to: Some(end),
            apartment_title: Some(unit.to_string()),
            ..BookingFilter::default()
        })
        .await?;
    let payments = repos
        .payments
        .list(&PaymentFilter {
            date_from: Some(start),
            date_to: Some(end),
            apartment_title: Some(unit.to_string()),
            ..PaymentFilter::default()
        })
        .await?;
    let expenses = repos
        .expenses
        .list(&ExpenseFilter {
            date_from: Some(start),
            date_to: Some(end),
            apartment_title: Some(unit.to_string()),
        })
        .await?;

    let income = bookings
        .iter()
        .filter_map(|booking| booking.amount)
        .sum::<f64>()
        + payments.iter().map(|payment| payment.amount).sum::<f64>();
    let expenses = expenses.iter().map(|expense| expense.amount).sum::<f64>();

    Ok(UnitFinancials {
        income,
        expenses,
        profit: income - expenses,
    })
}

/// Sum of expenses attached to no unit.
pub async fn general_expenses(
    repos: &Repositories,
    start: NaiveDate,
    end: NaiveDate,
) -> AppResult<f64> {
    let expenses = repos
        .expenses
        .list(&ExpenseFilter {
            date_from: Some(start),
            date_to: Some(end),
            apartment_title: None,
        })
        .await?;
    Ok(expenses
        .iter()
        .filter(|expense| expense.is_general())
        .map(|expense| expense.amount)
        .sum())
}

/// Financials of one month. A unit whose figures cannot be loaded is logged
/// and left out; the rest of the month is still reported.
pub async fn monthly_financials(
    repos: &Repositories,
    year: i32,
    month: u32,
    units: &[String],
) -> Option<MonthReport> {
    let Some((start_date, end_date)) = month_range(year, month) else {
        tracing::error!(year, month, "Invalid reporting month");
        return None;
    };

    let mut report = MonthReport {
        month,
        start_date,
        end_date,
        objects: BTreeMap::new(),
        total_income: 0.0,
        total_expenses: 0.0,
        total_profit: 0.0,
        general_expenses: 0.0,
    };

    for unit in units {
        let figures = match unit_financials(repos, unit, start_date, end_date).await {
            Ok(figures) => figures,
            Err(error) => {
                tracing::error!(unit = %unit, year, month, error = %error, "Unit financials failed");
                continue;
            }
        };
        if figures.is_empty() {
            continue;
        }

        let bucket = report
            .objects
            .entry(grouping_key(Some(unit)))
            .or_default();
        if !bucket.apartments.contains(unit) {
            bucket.apartments.push(unit.clone());
        }
        bucket.income += figures.income;
        bucket.expenses += figures.expenses;
        bucket.profit += figures.profit;

        report.total_income += figures.income;
        report.total_expenses += figures.expenses;
        report.total_profit += figures.profit;
    }

    report.general_expenses = match general_expenses(repos, start_date, end_date).await {
        Ok(total) => total,
        Err(error) => {
            tracing::error!(year, month, error = %error, "General expenses failed");
            0.0
        }
    };

    for bucket in report.objects.values_mut() {
        bucket.income = round2(bucket.income);
        bucket.expenses = round2(bucket.expenses);
        bucket.profit = round2(bucket.profit);
    }
    report.total_income = round2(report.total_income);
    report.total_expenses = round2(report.total_expenses);
    report.total_profit = round2(report.total_profit);
    report.general_expenses = round2(report.general_expenses);

    tracing::debug!(year, month, objects = report.objects.len(), "Month aggregated");
    Some(report)
}

pub async fn annual_report(repos: &Repositories, year: i32, units: &[String]) -> AnnualReport {
    let mut months = BTreeMap::new();
    for month in 1..=12 {
        if let Some(report) = monthly_financials(repos, year, month, units).await {
            months.insert(format!("{year}-{month:02}"), report);
        }
    }

    let yearly_totals = yearly_totals(months.values());
    let apartment_summary = apartment_summary(months.values());
    tracing::info!(year, units = units.len(), "Annual financial report built");

    AnnualReport {
        year,
        months,
        yearly_totals,
        apartment_summary,
    }
}

pub fn yearly_totals<'a>(months: impl IntoIterator<Item = &'a MonthReport>) -> YearlyTotals {
    let mut totals = YearlyTotals::default();
    for month in months {
        totals.total_income += month.total_income;
        totals.total_expenses += month.total_expenses;
        totals.total_profit += month.total_profit;
        totals.total_general_expenses += month.general_expenses;
    }
    totals.total_income = round2(totals.total_income);
    totals.total_expenses = round2(totals.total_expenses);
    totals.total_profit = round2(totals.total_profit);
    totals.total_general_expenses = round2(totals.total_general_expenses);
    totals.grand_total_expenses = totals.grand_total_expenses();
    totals
}

pub fn apartment_summary<'a>(
    months: impl IntoIterator<Item = &'a MonthReport>,
) -> BTreeMap<String, ApartmentSummary> {
    let mut summary: BTreeMap<String, ApartmentSummary> = BTreeMap::new();
    for month in months {
        for (base, object) in &month.objects {
            let entry = summary.entry(base.clone()).or_default();
            for apartment in &object.apartments {
                if !entry.apartments.contains(apartment) {
                    entry.apartments.push(apartment.clone());
                }
            }
            entry.total_income += object.income;
            entry.total_expenses += object.expenses;
            entry.total_profit += object.profit;
        }
    }
    for entry in summary.values_mut() {
        entry.total_income = round2(entry.total_income);
        entry.total_expenses = round2(entry.total_expenses);
        entry.total_profit = round2(entry.total_profit);
    }
    summary
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};

    use super::{annual_report, month_range, monthly_financials, yearly_totals};
    use crate::{
        error::{AppError, AppResult},
        models::{
            Booking, BookingUpsert, Expense, ExpenseFilter, ExpensePatch, NewExpense, NewPayment,
        },
        repository::{ExpenseRepository, Repositories},
        services::grouping::group_bookings,
    };

    /// Expense store that fails every lookup for one unit title.
    struct BrokenUnitExpenses {
        inner: Arc<dyn ExpenseRepository>,
        broken_title: String,
    }

    #[async_trait]
    impl ExpenseRepository for BrokenUnitExpenses {
        async fn list(&self, filter: &ExpenseFilter) -> AppResult<Vec<Expense>> {
            if filter.apartment_title.as_deref() == Some(self.broken_title.as_str()) {
                return Err(AppError::Dependency("Database operation failed.".to_string()));
            }
            self.inner.list(filter).await
        }

        async fn get(&self, id: i64) -> AppResult<Option<Expense>> {
            self.inner.get(id).await
        }

        async fn create(&self, expense: NewExpense) -> AppResult<Expense> {
            self.inner.create(expense).await
        }

        async fn update(&self, id: i64, patch: ExpensePatch) -> AppResult<Option<Expense>> {
            self.inner.update(id, patch).await
        }

        async fn delete(&self, id: i64) -> AppResult<bool> {
            self.inner.delete(id).await
        }

        async fn distinct_titles(&self) -> AppResult<Vec<String>> {
            self.inner.distinct_titles().await
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn booking(id: i64, title: &str, begin: NaiveDate, amount: f64) -> BookingUpsert {
        BookingUpsert {
            id,
            action: "create_booking".to_string(),
            status: "booked".to_string(),
            begin_date: begin,
            end_date: begin + chrono::Duration::days(2),
            realty_id: 1,
            client_id: None,
            amount: Some(amount),
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

    fn expense(title: Option<&str>, day: NaiveDate, amount: f64) -> NewExpense {
        NewExpense {
            apartment_title: title.map(ToOwned::to_owned),
            expense_date: day,
            amount,
            category: None,
            comment: None,
        }
    }

    fn payment(title: &str, day: NaiveDate, amount: f64) -> NewPayment {
        NewPayment {
            booking_id: None,
            booking_service_id: None,
            apartment_title: Some(title.to_string()),
            receipt_date: day,
            receipt_time: None,
            amount,
            advance_for_future: None,
            operation_type: None,
            income_category: None,
            comment: None,
        }
    }

    #[test]
    fn month_window_includes_first_of_next_month_except_december() {
        assert_eq!(
            month_range(2024, 1),
            Some((date(2024, 1, 1), date(2024, 2, 1)))
        );
        assert_eq!(
            month_range(2024, 12),
            Some((date(2024, 12, 1), date(2024, 12, 31)))
        );
        assert_eq!(month_range(2024, 13), None);
    }

    #[tokio::test]
    async fn units_without_activity_are_absent() {
        let repos = Repositories::memory();
        repos
            .bookings
            .upsert(booking(1, "A", date(2024, 3, 10), 5000.0))
            .await
            .unwrap();
        let units = vec!["A".to_string(), "B".to_string()];
        let report = monthly_financials(&repos, 2024, 3, &units).await.unwrap();
        assert!(report.objects.contains_key("A"));
        assert!(!report.objects.contains_key("B"));
    }

    #[tokio::test]
    async fn duplicates_merge_and_general_expenses_stay_separate() {
        let repos = Repositories::memory();
        repos
            .bookings
            .upsert(booking(1, "004) 29Б", date(2024, 3, 10), 5000.0))
            .await
            .unwrap();
        repos
            .payments
            .create(payment("004) 29Б ДУБЛЬ", date(2024, 3, 12), 1500.0))
            .await
            .unwrap();
        repos
            .expenses
            .create(expense(Some("004) 29Б"), date(2024, 3, 15), 700.0))
            .await
            .unwrap();
        repos
            .expenses
            .create(expense(Some("  "), date(2024, 3, 20), 300.0))
            .await
            .unwrap();
        repos
            .expenses
            .create(expense(None, date(2024, 4, 1), 50.0))
            .await
            .unwrap();

        let units = vec!["004) 29Б".to_string(), "004) 29Б ДУБЛЬ".to_string()];
        let report = monthly_financials(&repos, 2024, 3, &units).await.unwrap();
        let object = &report.objects["29Б"];
        assert_eq!(object.apartments.len(), 2);
        assert_eq!(object.income, 6500.0);
        assert_eq!(object.expenses, 700.0);
        assert_eq!(object.profit, 5800.0);
        assert_eq!(report.total_expenses, 700.0);
        // April 1st sits inside the widened March window.
        assert_eq!(report.general_expenses, 350.0);
    }

    #[tokio::test]
    async fn yearly_totals_sum_months_and_keep_general_expenses_apart() {
        let repos = Repositories::memory();
        repos
            .bookings
            .upsert(booking(1, "A", date(2024, 1, 10), 1000.0))
            .await
            .unwrap();
        repos
            .bookings
            .upsert(booking(2, "A", date(2024, 6, 10), 2500.0))
            .await
            .unwrap();
        repos
            .expenses
            .create(expense(Some("A"), date(2024, 6, 11), 400.0))
            .await
            .unwrap();
        repos
            .expenses
            .create(expense(None, date(2024, 6, 12), 100.0))
            .await
            .unwrap();

        let report = annual_report(&repos, 2024, &["A".to_string()]).await;
        assert_eq!(report.months.len(), 12);
        let month_income: f64 = report.months.values().map(|m| m.total_income).sum();
        assert_eq!(report.yearly_totals.total_income, month_income);
        assert_eq!(report.yearly_totals.total_income, 3500.0);
        assert_eq!(report.yearly_totals.total_expenses, 400.0);
        assert_eq!(report.yearly_totals.total_general_expenses, 100.0);
        assert_eq!(report.yearly_totals.grand_total_expenses, 500.0);
        assert_eq!(report.apartment_summary["A"].total_profit, 3100.0);

        let recomputed = yearly_totals(report.months.values());
        assert_eq!(recomputed, report.yearly_totals);
    }

    #[tokio::test]
    async fn grouped_table_and_dashboard_share_one_unit_key() {
        let repos = Repositories::memory();
        let titles = ["Мира 3", "мира 3 дубль"];
        for (id, title) in (1..).zip(titles) {
            repos
                .bookings
                .upsert(booking(id, title, date(2024, 5, 10), 1000.0))
                .await
                .unwrap();
        }

        let bookings = titles
            .iter()
            .zip(1..)
            .map(|(title, id)| {
                Booking::from_upsert(booking(id, title, date(2024, 5, 10), 1000.0), Utc::now())
            })
            .collect::<Vec<_>>();
        let rows = group_bookings(&bookings, None);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.has_duplicate));

        let units = titles.iter().map(ToString::to_string).collect::<Vec<_>>();
        let report = monthly_financials(&repos, 2024, 5, &units).await.unwrap();
        assert_eq!(report.objects.len(), 1);
        let object = &report.objects["МИРА 3"];
        assert_eq!(object.apartments, units);
        assert_eq!(object.income, 2000.0);
    }

    #[tokio::test]
    async fn failing_unit_is_skipped_and_month_still_reported() {
        let memory = Repositories::memory();
        let repos = Repositories {
            expenses: Arc::new(BrokenUnitExpenses {
                inner: memory.expenses.clone(),
                broken_title: "B".to_string(),
            }),
            ..memory.clone()
        };
        for (id, title) in [(1, "A"), (2, "B")] {
            repos
                .bookings
                .upsert(booking(id, title, date(2024, 3, 10), 1000.0))
                .await
                .unwrap();
        }
        repos
            .expenses
            .create(expense(None, date(2024, 3, 20), 250.0))
            .await
            .unwrap();

        let units = vec!["A".to_string(), "B".to_string()];
        let report = monthly_financials(&repos, 2024, 3, &units).await.unwrap();
        assert!(report.objects.contains_key("A"));
        assert!(!report.objects.contains_key("B"));
        assert_eq!(report.total_income, 1000.0);
        assert_eq!(report.general_expenses, 250.0);

        let annual = annual_report(&repos, 2024, &units).await;
        assert_eq!(annual.months.len(), 12);
        assert_eq!(annual.yearly_totals.total_general_expenses, 250.0);
        assert!(!annual.apartment_summary.contains_key("B"));
    }
}
