use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;

use crate::{auth::middleware::AuthContext, error::AppError, state::AppState};

pub async fn list_subscribers(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    let storefront = state.tenant_storefront(&auth.user_id).await?;
    let subscribers = state
        .db
        .list_subscribers(&storefront.id)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(json!({
        "data": subscribers,
        "total": subscribers.len(),
    })))
}

pub async fn delete_subscriber(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(subscriber_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let storefront = state.tenant_storefront(&auth.user_id).await?;
    let deleted = state
        .db
        .delete_subscriber(&storefront.id, &subscriber_id)
        .await
        .map_err(AppError::Internal)?;
    if !deleted {
        return Err(AppError::NotFound("Subscriber not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
