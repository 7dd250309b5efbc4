use serde::Serialize;

use crate::{
    error::AppResult,
    models::{BookingFilter, MonthlyPlan, PaymentFilter},
    repository::Repositories,
    services::financials::round2,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanProgress {
    pub plan: MonthlyPlan,
    pub fact: f64,
    pub remaining: f64,
    pub completion_percent: f64,
}

/// Plan versus fact, where fact is booking amounts by begin date plus
/// payments by receipt date within the plan window.
pub async fn progress(repos: &Repositories, plan: MonthlyPlan) -> AppResult<PlanProgress> {
    let bookings = repos
        .bookings
        .list_active(&BookingFilter {
            begin_from: Some(plan.start_date),
            begin_to: Some(plan.end_date),
            ..BookingFilter::default()
        })
        .await?;
    let payments = repos
        .payments
        .list(&PaymentFilter {
            date_from: Some(plan.start_date),
            date_to: Some(plan.end_date),
            ..PaymentFilter::default()
        })
        .await?;

    let fact = round2(
        bookings.iter().filter_map(|booking| booking.amount).sum::<f64>()
            + payments.iter().map(|payment| payment.amount).sum::<f64>(),
    );
    let completion_percent = if plan.target_amount > 0.0 {
        round2(fact / plan.target_amount * 100.0)
    } else {
        0.0
    };

    Ok(PlanProgress {
        remaining: round2(plan.target_amount - fact),
        fact,
        completion_percent,
        plan,
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::progress;
    use crate::{
        models::{NewPayment, NewPlan},
        repository::Repositories,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn progress_counts_payments_in_window() {
        let repos = Repositories::memory();
        let plan = repos
            .plans
            .create(NewPlan {
                start_date: date(2024, 6, 1),
                end_date: date(2024, 6, 30),
                target_amount: 4000.0,
            })
            .await
            .unwrap();
        for (day, amount) in [(date(2024, 6, 10), 1000.0), (date(2024, 7, 1), 500.0)] {
            repos
                .payments
                .create(NewPayment {
                    booking_id: None,
                    booking_service_id: None,
                    apartment_title: Some("A".to_string()),
                    receipt_date: day,
                    receipt_time: None,
                    amount,
                    advance_for_future: None,
                    operation_type: None,
                    income_category: None,
                    comment: None,
                })
                .await
                .unwrap();
        }

        let result = progress(&repos, plan).await.unwrap();
        assert_eq!(result.fact, 1000.0);
        assert_eq!(result.remaining, 3000.0);
        assert_eq!(result.completion_percent, 25.0);
    }
}
