use std::env;

use chrono::NaiveDate;
use chrono_tz::Tz;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_name: String,
    pub environment: String,
    pub api_prefix: String,
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub database_url: Option<String>,
    pub db_pool_max_connections: u32,
    pub db_pool_min_connections: u32,
    pub db_pool_acquire_timeout_seconds: u64,
    pub db_pool_idle_timeout_seconds: u64,
    pub db_run_migrations: bool,
    pub admin_token: Option<String>,
    pub user_token: Option<String>,
    pub webhook_token: Option<String>,
    pub rate_limit_enabled: bool,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst_size: u32,
    pub request_timeout_seconds: u64,
    pub max_body_bytes: usize,
    pub timezone: Tz,
    pub dashboard_unit_limit: usize,
    pub dashboard_year_window: i32,
    pub seed_default_services: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. `from_env` is
    /// the process-environment flavour; tests pass a closure instead.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = Source { lookup };
        Self {
            app_name: source.or("APP_NAME", "Rental Back-office"),
            environment: source.or("ENVIRONMENT", "development"),
            api_prefix: normalize_prefix(&source.or("API_PREFIX", "/v1")),
            host: source.or("HOST", "0.0.0.0"),
            port: source.parse_or("PORT", 8000),
            cors_origins: parse_csv(&source.or("CORS_ORIGINS", "http://localhost:3000")),
            database_url: source.opt("DATABASE_URL"),
            db_pool_max_connections: source.parse_or("DB_POOL_MAX_CONNECTIONS", 5),
            db_pool_min_connections: source.parse_or("DB_POOL_MIN_CONNECTIONS", 1),
            db_pool_acquire_timeout_seconds: source.parse_or("DB_POOL_ACQUIRE_TIMEOUT_SECONDS", 5),
            db_pool_idle_timeout_seconds: source.parse_or("DB_POOL_IDLE_TIMEOUT_SECONDS", 600),
            db_run_migrations: source.parse_bool_or("DB_RUN_MIGRATIONS", true),
            admin_token: source.opt("ADMIN_TOKEN"),
            user_token: source.opt("USER_TOKEN"),
            webhook_token: source.opt("WEBHOOK_TOKEN"),
            rate_limit_enabled: source.parse_bool_or("RATE_LIMIT_ENABLED", true),
            rate_limit_per_second: source.parse_or("RATE_LIMIT_PER_SECOND", 10),
            rate_limit_burst_size: source.parse_or("RATE_LIMIT_BURST_SIZE", 100),
            request_timeout_seconds: source.parse_or("REQUEST_TIMEOUT_SECONDS", 30),
            max_body_bytes: source.parse_or("MAX_BODY_BYTES", 2 * 1024 * 1024),
            timezone: parse_timezone(source.opt("TIMEZONE").as_deref()),
            dashboard_unit_limit: source.parse_or("DASHBOARD_UNIT_LIMIT", 50),
            dashboard_year_window: source.parse_or("DASHBOARD_YEAR_WINDOW", 5),
            seed_default_services: source.parse_bool_or("SEED_DEFAULT_SERVICES", true),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.trim().eq_ignore_ascii_case("production")
    }

    pub fn auth_enabled(&self) -> bool {
        self.admin_token.is_some() || self.user_token.is_some()
    }

    /// Calendar date "now" in the configured business timezone.
    pub fn today(&self) -> NaiveDate {
        chrono::Utc::now().with_timezone(&self.timezone).date_naive()
    }
}

struct Source<F> {
    lookup: F,
}

impl<F> Source<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn opt(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.opt(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T>(&self, key: &str, default: T) -> T
    where
        T: std::str::FromStr + Copy,
    {
        self.opt(key)
            .and_then(|raw| raw.parse::<T>().ok())
            .unwrap_or(default)
    }

    fn parse_bool_or(&self, key: &str, default: bool) -> bool {
        match self.opt(key).as_deref().map(str::to_ascii_lowercase) {
            Some(value) if value == "1" || value == "true" || value == "yes" || value == "on" => {
                true
            }
            Some(value) if value == "0" || value == "false" || value == "no" || value == "off" => {
                false
            }
            Some(_) => default,
            None => default,
        }
    }
}

fn parse_timezone(raw: Option<&str>) -> Tz {
    let Some(name) = raw else {
        return chrono_tz::Europe::Moscow;
    };
    name.parse::<Tz>().unwrap_or_else(|_| {
        tracing::warn!(timezone = %name, "Unknown TIMEZONE, falling back to UTC");
        chrono_tz::UTC
    })
}

fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn normalize_prefix(raw: &str) -> String {
    let mut prefix = raw.trim().to_string();
    if prefix.is_empty() {
        return "/v1".to_string();
    }
    if !prefix.starts_with('/') {
        prefix.insert(0, '/');
    }
    while prefix.ends_with('/') && prefix.len() > 1 {
        prefix.pop();
    }
    if prefix == "/" {
        return "/v1".to_string();
    }
    prefix
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{normalize_prefix, AppConfig};

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        AppConfig::from_lookup(|key| values.get(key).cloned())
    }

    #[test]
    fn normalizes_prefix() {
        assert_eq!(normalize_prefix("v1"), "/v1");
        assert_eq!(normalize_prefix("/v1/"), "/v1");
        assert_eq!(normalize_prefix(""), "/v1");
        assert_eq!(normalize_prefix("/"), "/v1");
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = config_from(&[]);
        assert_eq!(config.port, 8000);
        assert_eq!(config.dashboard_unit_limit, 50);
        assert_eq!(config.dashboard_year_window, 5);
        assert_eq!(config.timezone, chrono_tz::Europe::Moscow);
        assert!(config.database_url.is_none());
        assert!(!config.auth_enabled());
        assert!(config.seed_default_services);
    }

    #[test]
    fn malformed_values_fall_back_to_defaults() {
        let config = config_from(&[
            ("PORT", "not-a-port"),
            ("DASHBOARD_UNIT_LIMIT", "-3"),
            ("RATE_LIMIT_ENABLED", "maybe"),
            ("TIMEZONE", "Mars/Olympus"),
        ]);
        assert_eq!(config.port, 8000);
        assert_eq!(config.dashboard_unit_limit, 50);
        assert!(config.rate_limit_enabled);
        assert_eq!(config.timezone, chrono_tz::UTC);
    }

    #[test]
    fn reads_tokens_and_trims_blank_values() {
        let config = config_from(&[("ADMIN_TOKEN", "  secret "), ("USER_TOKEN", "   ")]);
        assert_eq!(config.admin_token.as_deref(), Some("secret"));
        assert!(config.user_token.is_none());
        assert!(config.auth_enabled());
    }
}
