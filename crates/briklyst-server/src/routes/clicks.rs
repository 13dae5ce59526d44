use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;

use briklyst_core::visitor::{compute_visitor_hash, extract_referrer_domain};
use briklyst_duckdb::clicks::ClickRecord;

use crate::{error::AppError, state::AppState};

/// Click-throughs allowed per IP per minute.
const CLICKS_PER_MINUTE: usize = 120;

#[derive(Debug, Deserialize)]
pub struct ClickQuery {
    /// Campaign id carried by links in campaign emails.
    pub c: Option<String>,
}

/// First address in `X-Forwarded-For`, or `"unknown"`.
pub(crate) fn extract_client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// `GET /go/{product_id}`: record a click and redirect to the affiliate URL.
pub async fn track_click(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<String>,
    Query(query): Query<ClickQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let client_ip = extract_client_ip(&headers);
    if !state.check_rate_limit(&client_ip, CLICKS_PER_MINUTE).await {
        return Err(AppError::RateLimited);
    }

    let not_found = || AppError::NotFound("Product not found".to_string());
    let product = state
        .db
        .find_product(&product_id)
        .await
        .map_err(AppError::Internal)?
        .filter(|p| p.is_active)
        .ok_or_else(not_found)?;
    let storefront = state
        .db
        .get_storefront(&product.storefront_id)
        .await
        .map_err(AppError::Internal)?
        .filter(|sf| sf.published)
        .ok_or_else(not_found)?;

    // Only attribute to campaigns owned by the same storefront.
    let campaign_id = match query.c.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(c) => state
            .db
            .get_campaign(&storefront.id, c)
            .await
            .map_err(AppError::Internal)?
            .map(|campaign| campaign.id),
        None => None,
    };

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let referrer_domain = headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_referrer_domain);

    let location = HeaderValue::from_str(&product.affiliate_url)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("stored affiliate_url is not a valid header")))?;

    state
        .push_clicks(vec![ClickRecord {
            id: uuid::Uuid::new_v4().to_string(),
            product_id: product.id,
            storefront_id: storefront.id,
            campaign_id,
            visitor_hash: compute_visitor_hash(&client_ip, user_agent),
            referrer_domain,
            created_at: Utc::now(),
        }])
        .await;

    let mut response = StatusCode::FOUND.into_response();
    response.headers_mut().insert(header::LOCATION, location);
    Ok(response)
}
