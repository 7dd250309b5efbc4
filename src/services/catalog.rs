use crate::{
    error::{AppError, AppResult},
    models::BookingServiceLine,
    repository::Repositories,
    services::financials::round2,
};

pub const DEFAULT_SERVICES: [&str; 9] = [
    "Баня",
    "Веники",
    "Доп часы",
    "Доп гости",
    "Игровая комната",
    "Спа зона",
    "Штраф",
    "Продление доп день",
    "Другие платежи",
];

/// Creates the default catalog entries that do not exist yet. Safe to run on
/// every start.
pub async fn seed_defaults(repos: &Repositories) -> AppResult<usize> {
    let mut created = 0;
    for name in DEFAULT_SERVICES {
        if repos.services.find_by_name(name).await?.is_some() {
            continue;
        }
        match repos.services.create(name).await {
            Ok(_) => created += 1,
            // Another instance seeded it first.
            Err(AppError::Conflict(_)) => {}
            Err(error) => return Err(error),
        }
    }
    if created > 0 {
        tracing::info!(created, "Seeded default services");
    }
    Ok(created)
}

pub fn services_total(lines: &[BookingServiceLine]) -> f64 {
    round2(lines.iter().map(|line| line.price).sum())
}

#[cfg(test)]
mod tests {
    use super::{seed_defaults, DEFAULT_SERVICES};
    use crate::repository::Repositories;

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let repos = Repositories::memory();
        assert_eq!(seed_defaults(&repos).await.unwrap(), DEFAULT_SERVICES.len());
        assert_eq!(seed_defaults(&repos).await.unwrap(), 0);
        assert_eq!(
            repos.services.list(true).await.unwrap().len(),
            DEFAULT_SERVICES.len()
        );
    }
}
