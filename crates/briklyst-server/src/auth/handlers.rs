use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use briklyst_core::storefront::normalize_email;

use crate::{error::AppError, state::AppState};

use super::jwt::encode_jwt;
use super::middleware::{session_token, validate_token, SESSION_COOKIE};
use super::password::{hash_password, validate_password_strength, verify_password};

const LOGIN_RATE_LIMIT_RETRY_AFTER_SECONDS: u64 = 15 * 60;

// ---------------------------------------------------------------------------
// POST /api/auth/signup
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// `POST /api/auth/signup`: create a tenant account and start a session.
pub async fn auth_signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = normalize_email(&req.email)?;
    let name = req.name.trim();
    if name.is_empty() || name.chars().count() > 100 {
        return Err(AppError::Invalid {
            field: "name",
            message: "name must be 1-100 characters".to_string(),
        });
    }
    validate_password_strength(&req.password).map_err(|e| AppError::Invalid {
        field: "password",
        message: e.to_string(),
    })?;

    let hash =
        hash_password(&req.password, state.config.argon2_memory_kb).map_err(AppError::Internal)?;
    let user = state
        .db
        .create_user(&email, name, &hash)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::Conflict("An account with this email already exists".to_string()))?;

    let jwt_secret = state
        .db
        .ensure_jwt_secret()
        .await
        .map_err(AppError::Internal)?;
    let (token, expires_at) = encode_jwt(&jwt_secret, &user.id, state.config.session_days)
        .map_err(AppError::Internal)?;

    tracing::info!(user_id = %user.id, "User signed up");

    let cookie = build_session_cookie(&token, state.config.https, state.config.session_days);
    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(json!({
            "data": {
                "id": user.id,
                "email": user.email,
                "name": user.name,
                "token": token,
                "expires_at": expires_at,
            }
        })),
    ))
}

// ---------------------------------------------------------------------------
// POST /api/auth/login
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `POST /api/auth/login`: log in with email and password.
///
/// Rate limited: 5 failed attempts per 15 min per email.
pub async fn auth_login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = req.email.trim().to_ascii_lowercase();

    let allowed = state
        .db
        .check_login_rate_limit(&email)
        .await
        .map_err(AppError::Internal)?;
    if !allowed {
        return Err(AppError::RateLimitedWithRetry {
            retry_after_seconds: LOGIN_RATE_LIMIT_RETRY_AFTER_SECONDS,
        });
    }

    let credentials = state
        .db
        .find_credentials(&email)
        .await
        .map_err(AppError::Internal)?;

    let user = match credentials {
        Some(creds) if verify_password(&req.password, &creds.password_hash) => creds.user,
        _ => {
            state
                .db
                .record_login_attempt(&email, false)
                .await
                .map_err(AppError::Internal)?;
            return Err(AppError::Unauthorized);
        }
    };

    state
        .db
        .record_login_attempt(&email, true)
        .await
        .map_err(AppError::Internal)?;

    let jwt_secret = state
        .db
        .ensure_jwt_secret()
        .await
        .map_err(AppError::Internal)?;
    let (token, expires_at) = encode_jwt(&jwt_secret, &user.id, state.config.session_days)
        .map_err(AppError::Internal)?;

    let cookie = build_session_cookie(&token, state.config.https, state.config.session_days);
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "data": { "token": token, "expires_at": expires_at } })),
    ))
}

// ---------------------------------------------------------------------------
// POST /api/auth/logout
// ---------------------------------------------------------------------------

/// `POST /api/auth/logout`: clear session cookie. Always 200.
pub async fn auth_logout(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cookie = clear_session_cookie(state.config.https);
    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "data": { "ok": true } })),
    )
}

// ---------------------------------------------------------------------------
// GET /api/auth/session
// ---------------------------------------------------------------------------

/// `GET /api/auth/session`: the signed-in user, or 401.
pub async fn auth_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let token = session_token(&headers).ok_or(AppError::Unauthorized)?;
    let claims = validate_token(&state, &token)
        .await
        .ok_or(AppError::Unauthorized)?;
    let user = state
        .db
        .get_user(&claims.sub)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::Unauthorized)?;

    Ok(Json(json!({
        "data": {
            "id": user.id,
            "email": user.email,
            "name": user.name,
            "expires_at": chrono::DateTime::from_timestamp(claims.exp, 0)
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_default(),
        }
    })))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn build_session_cookie(token: &str, https: bool, session_days: u32) -> String {
    let secure = if https { "; Secure" } else { "" };
    format!(
        "{SESSION_COOKIE}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}{}",
        token,
        u64::from(session_days) * 86_400,
        secure,
    )
}

fn clear_session_cookie(https: bool) -> String {
    let secure = if https { "; Secure" } else { "" };
    format!("{SESSION_COOKIE}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0{secure}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_flags() {
        let cookie = build_session_cookie("tok", true, 7);
        assert!(cookie.starts_with("bk_session=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=604800"));
        assert!(cookie.ends_with("; Secure"));
        assert!(!build_session_cookie("tok", false, 7).contains("Secure"));
    }

    #[test]
    fn cleared_cookie_expires_immediately() {
        assert!(clear_session_cookie(false).contains("bk_session=;"));
        assert!(clear_session_cookie(false).contains("Max-Age=0"));
    }
}
