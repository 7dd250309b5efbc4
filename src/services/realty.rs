use std::collections::{BTreeSet, HashSet};

use crate::{
    error::{AppError, AppResult},
    models::{Booking, Realty},
    repository::Repositories,
};

/// Distinct non-blank unit titles across bookings, payments and expenses.
pub async fn known_titles(repos: &Repositories) -> AppResult<Vec<String>> {
    let mut titles = BTreeSet::new();
    titles.extend(repos.bookings.distinct_titles().await?);
    titles.extend(repos.payments.distinct_titles().await?);
    titles.extend(repos.expenses.distinct_titles().await?);
    Ok(titles.into_iter().collect())
}

/// Registers every title seen in the books that the registry lacks.
pub async fn sync_from_all_sources(repos: &Repositories) -> AppResult<u64> {
    let titles = known_titles(repos).await?;
    let added = repos.realty.insert_missing(&titles).await?;
    if added > 0 {
        tracing::info!(added, "Registered new realty entries");
    }
    Ok(added)
}

/// Renames a registry entry and every booking and payment carrying the old
/// title.
pub async fn rename(repos: &Repositories, id: i64, name: &str) -> AppResult<Realty> {
    let current = repos
        .realty
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Realty not found.".to_string()))?;
    if current.name == name {
        return Ok(current);
    }

    let renamed = repos
        .realty
        .rename(id, name)
        .await?
        .ok_or_else(|| AppError::NotFound("Realty not found.".to_string()))?;
    tracing::info!(
        realty_id = id,
        from = %current.name,
        to = %name,
        bookings = renamed.bookings,
        payments = renamed.payments,
        "Realty renamed"
    );
    Ok(renamed.realty)
}

/// Drops bookings whose unit is registered as inactive. Unregistered titles
/// pass through.
pub async fn retain_active(repos: &Repositories, bookings: Vec<Booking>) -> AppResult<Vec<Booking>> {
    let inactive = repos
        .realty
        .inactive_names()
        .await?
        .into_iter()
        .collect::<HashSet<_>>();
    if inactive.is_empty() {
        return Ok(bookings);
    }
    Ok(bookings
        .into_iter()
        .filter(|booking| !inactive.contains(booking.unit_label()))
        .collect())
}

/// Units reported on the dashboard: known titles minus inactive realty,
/// in lexical order, capped at `limit`.
pub async fn dashboard_units(repos: &Repositories, limit: usize) -> AppResult<Vec<String>> {
    let inactive = repos
        .realty
        .inactive_names()
        .await?
        .into_iter()
        .collect::<HashSet<_>>();
    let mut units = known_titles(repos)
        .await?
        .into_iter()
        .filter(|title| !inactive.contains(title))
        .collect::<Vec<_>>();
    units.truncate(limit);
    Ok(units)
}
