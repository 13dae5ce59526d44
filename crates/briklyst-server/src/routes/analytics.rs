use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;

use briklyst_core::analytics::{analyze, AnalyticsResult, ClickSource, Interval};
use briklyst_core::range::DateRange;

use crate::{auth::middleware::AuthContext, error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub range: Option<String>,
    pub interval: Option<String>,
    #[serde(rename = "productId", alias = "product_id")]
    pub product_id: Option<String>,
}

/// Parse `range`, or fall back to the last `analytics_default_days` days.
pub(crate) fn resolve_range(state: &AppState, raw: Option<&str>) -> Result<DateRange, AppError> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        Some(raw) => Ok(DateRange::parse(raw)?),
        None => Ok(DateRange::last_days(
            chrono::Utc::now().date_naive(),
            state.config.analytics_default_days,
        )?),
    }
}

/// Fetch the storefront's products and the clicks in `range`, then aggregate.
pub async fn storefront_analytics(
    source: &dyn ClickSource,
    storefront_id: &str,
    range: DateRange,
    interval: Interval,
    product_filter: Option<&str>,
) -> anyhow::Result<AnalyticsResult> {
    let products = source.product_summaries(storefront_id).await?;
    let events = source
        .clicks_in_range(storefront_id, range.start, range.end)
        .await?;
    Ok(analyze(&events, &products, interval, product_filter))
}

/// `GET /api/analytics`: click analytics for the tenant's storefront.
#[tracing::instrument(skip(state, auth))]
pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let storefront = state.tenant_storefront(&auth.user_id).await?;
    let range = resolve_range(&state, query.range.as_deref())?;
    let interval = Interval::parse(query.interval.as_deref());
    let product_filter = query
        .product_id
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());

    let result = storefront_analytics(
        &*state.db,
        &storefront.id,
        range,
        interval,
        product_filter,
    )
    .await
    .map_err(AppError::Internal)?;

    Ok(Json(json!({ "data": result })))
}
