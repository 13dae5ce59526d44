use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::state::AppState;

use super::jwt::{decode_jwt, Claims};

pub const SESSION_COOKIE: &str = "bk_session";

/// Auth context injected into request extensions after successful auth.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
}

/// Require a valid session token from the `bk_session` cookie or an
/// `Authorization: Bearer` header. Rejects with 401 otherwise.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = session_token(request.headers()) else {
        return unauthorized_response();
    };

    match validate_token(&state, &token).await {
        Some(claims) => {
            request.extensions_mut().insert(AuthContext {
                user_id: claims.sub,
            });
            next.run(request).await
        }
        None => unauthorized_response(),
    }
}

/// Extract the raw session token. A Bearer header wins over the cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string());
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get(header::COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(|cookie_str| {
            cookie_str
                .split(';')
                .find_map(|c| c.trim().strip_prefix("bk_session="))
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        })
}

/// Decode `token` with the stored secret. `None` on any failure.
pub async fn validate_token(state: &AppState, token: &str) -> Option<Claims> {
    let jwt_secret = match state.db.get_setting("jwt_secret").await {
        Ok(secret) => secret?,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load JWT secret");
            return None;
        }
    };
    decode_jwt(token, &jwt_secret).ok()
}

fn unauthorized_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": {
                "code": "unauthorized",
                "message": "Not authenticated",
                "field": null
            }
        })),
    )
        .into_response()
}
