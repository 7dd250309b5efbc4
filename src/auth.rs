use axum::http::{header::AUTHORIZATION, HeaderMap};

use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    User,
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            value
                .strip_prefix("Bearer ")
                .or_else(|| value.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolves the caller's role. With no tokens configured every caller is
/// treated as an administrator.
pub fn require_user(state: &AppState, headers: &HeaderMap) -> AppResult<Role> {
    if !state.config.auth_enabled() {
        return Ok(Role::Admin);
    }
    let token = bearer_token(headers)
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token.".to_string()))?;

    if state.config.admin_token.as_deref() == Some(token) {
        return Ok(Role::Admin);
    }
    if state.config.user_token.as_deref() == Some(token) {
        return Ok(Role::User);
    }
    Err(AppError::Unauthorized("Invalid bearer token.".to_string()))
}

pub fn require_admin(state: &AppState, headers: &HeaderMap) -> AppResult<()> {
    match require_user(state, headers)? {
        Role::Admin => Ok(()),
        Role::User => Err(AppError::Forbidden(
            "Administrator access required.".to_string(),
        )),
    }
}

pub fn require_webhook(state: &AppState, headers: &HeaderMap) -> AppResult<()> {
    let Some(expected) = state.config.webhook_token.as_deref() else {
        return Ok(());
    };
    match bearer_token(headers) {
        Some(token) if token == expected => Ok(()),
        _ => Err(AppError::Unauthorized("Invalid webhook token.".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{header::AUTHORIZATION, HeaderMap, HeaderValue};

    use super::{require_admin, require_user, require_webhook, Role};
    use crate::{config::AppConfig, state::AppState};

    fn state(pairs: &[(&str, &str)]) -> AppState {
        let pairs = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<Vec<_>>();
        AppState::in_memory(AppConfig::from_lookup(|key| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        }))
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn open_when_no_tokens_configured() {
        let state = state(&[]);
        assert_eq!(require_user(&state, &HeaderMap::new()).unwrap(), Role::Admin);
        assert!(require_webhook(&state, &HeaderMap::new()).is_ok());
    }

    #[test]
    fn tokens_map_to_roles() {
        let state = state(&[("ADMIN_TOKEN", "a"), ("USER_TOKEN", "u")]);
        assert_eq!(require_user(&state, &bearer("a")).unwrap(), Role::Admin);
        assert_eq!(require_user(&state, &bearer("u")).unwrap(), Role::User);
        assert!(require_user(&state, &bearer("x")).is_err());
        assert!(require_user(&state, &HeaderMap::new()).is_err());
        assert!(require_admin(&state, &bearer("u")).is_err());
    }

    #[test]
    fn webhook_token_is_enforced_when_set() {
        let state = state(&[("WEBHOOK_TOKEN", "w")]);
        assert!(require_webhook(&state, &bearer("w")).is_ok());
        assert!(require_webhook(&state, &HeaderMap::new()).is_err());
    }
}
