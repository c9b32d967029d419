//! Password hashing, registration rules and the admin gate.

use axum::http::HeaderMap;

use merge_arcade_shared::api::RegisterRequest;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::store::NewUser;

pub const ADMIN_HEADER: &str = "x-admin-password";

pub const USERNAME_MIN_CHARS: usize = 3;
pub const USERNAME_MAX_CHARS: usize = 20;
pub const PASSWORD_MIN_CHARS: usize = 6;

/// bcrypt hash at `cost` rounds (4..=31).
pub fn hash_password(password: &str, cost: u32) -> Result<String, ApiError> {
    bcrypt::hash(password, cost)
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))
}

/// A malformed stored hash never verifies.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match bcrypt::verify(password, stored) {
        Ok(ok) => ok,
        Err(e) => {
            tracing::warn!("Stored password hash is unusable: {}", e);
            false
        }
    }
}

/// Same shape as `^[^\s@]+@[^\s@]+\.[^\s@]+$`.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// Check a registration request and hash its password. Blocking: bcrypt
/// is slow on purpose, so async callers run this off the runtime threads.
pub fn validate_registration(req: RegisterRequest, cost: u32) -> Result<NewUser, ApiError> {
    let (Some(email), Some(username), Some(password)) = (req.email, req.username, req.password)
    else {
        return Err(ApiError::BadRequest(
            "email, username and password are required".to_string(),
        ));
    };

    let email = email.trim().to_lowercase();
    let username = username.trim().to_string();
    if email.is_empty() || username.is_empty() || password.is_empty() {
        return Err(ApiError::BadRequest(
            "email, username and password are required".to_string(),
        ));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::BadRequest("invalid email address".to_string()));
    }
    let name_len = username.chars().count();
    if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&name_len) {
        return Err(ApiError::BadRequest(format!(
            "username must be {}-{} characters",
            USERNAME_MIN_CHARS, USERNAME_MAX_CHARS
        )));
    }
    if password.chars().count() < PASSWORD_MIN_CHARS {
        return Err(ApiError::BadRequest(format!(
            "password must be at least {} characters",
            PASSWORD_MIN_CHARS
        )));
    }

    Ok(NewUser {
        email,
        username,
        password_hash: hash_password(&password, cost)?,
        wants_newsletter: req.wants_newsletter.unwrap_or(false),
    })
}

/// Gate for the admin API. Disabled (403) when no password is configured.
pub fn require_admin(headers: &HeaderMap, config: &ServerConfig) -> Result<(), ApiError> {
    let Some(expected) = config.admin_password.as_deref() else {
        return Err(ApiError::Forbidden("admin API is disabled".to_string()));
    };
    let given = headers
        .get(ADMIN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if given == expected {
        Ok(())
    } else {
        tracing::warn!("Rejected admin request with a wrong password");
        Err(ApiError::Unauthorized("invalid admin password".to_string()))
    }
}
