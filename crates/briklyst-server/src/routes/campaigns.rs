use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;

use briklyst_core::analytics::{aggregate, ClickSource, Interval};
use briklyst_duckdb::campaign::{CampaignOutcome, CreateCampaignParams, UpdateCampaignParams};

use crate::{auth::middleware::AuthContext, error::AppError, state::AppState};

fn validate_subject(subject: &str) -> Result<(), AppError> {
    if subject.trim().is_empty() || subject.chars().count() > 200 {
        return Err(AppError::Invalid {
            field: "subject",
            message: "subject must be 1-200 characters".to_string(),
        });
    }
    Ok(())
}

fn validate_body(body: &str) -> Result<(), AppError> {
    if body.chars().count() > 50_000 {
        return Err(AppError::Invalid {
            field: "body",
            message: "body must be 50000 characters or fewer".to_string(),
        });
    }
    Ok(())
}

fn not_found() -> AppError {
    AppError::NotFound("Campaign not found".to_string())
}

pub async fn list_campaigns(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    let storefront = state.tenant_storefront(&auth.user_id).await?;
    let campaigns = state
        .db
        .list_campaigns(&storefront.id)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(json!({ "data": campaigns })))
}

#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

pub async fn create_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateCampaignRequest>,
) -> Result<impl IntoResponse, AppError> {
    let storefront = state.tenant_storefront(&auth.user_id).await?;
    validate_subject(&req.subject)?;
    validate_body(&req.body)?;

    let campaign = state
        .db
        .create_campaign(
            &storefront.id,
            CreateCampaignParams {
                subject: req.subject.trim().to_string(),
                body: req.body,
            },
        )
        .await
        .map_err(AppError::Internal)?;
    Ok((StatusCode::CREATED, Json(json!({ "data": campaign }))))
}

pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let storefront = state.tenant_storefront(&auth.user_id).await?;
    let campaign = state
        .db
        .get_campaign(&storefront.id, &campaign_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(not_found)?;
    Ok(Json(json!({ "data": campaign })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateCampaignRequest {
    pub subject: Option<String>,
    pub body: Option<String>,
}

/// Only drafts may be edited.
pub async fn update_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<String>,
    Json(req): Json<UpdateCampaignRequest>,
) -> Result<impl IntoResponse, AppError> {
    let storefront = state.tenant_storefront(&auth.user_id).await?;
    if let Some(ref subject) = req.subject {
        validate_subject(subject)?;
    }
    if let Some(ref body) = req.body {
        validate_body(body)?;
    }

    let outcome = state
        .db
        .update_campaign(
            &storefront.id,
            &campaign_id,
            UpdateCampaignParams {
                subject: req.subject.map(|s| s.trim().to_string()),
                body: req.body,
            },
        )
        .await
        .map_err(AppError::Internal)?;

    match outcome {
        CampaignOutcome::Done(campaign) => Ok(Json(json!({ "data": campaign }))),
        CampaignOutcome::NotFound => Err(not_found()),
        CampaignOutcome::NotDraft => Err(AppError::Conflict(
            "Sent campaigns cannot be edited".to_string(),
        )),
    }
}

pub async fn delete_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let storefront = state.tenant_storefront(&auth.user_id).await?;
    let deleted = state
        .db
        .delete_campaign(&storefront.id, &campaign_id)
        .await
        .map_err(AppError::Internal)?;
    if !deleted {
        return Err(not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/campaigns/{id}/send`: mark a draft as sent.
///
/// Delivery itself is handled outside this service; the send is logged with
/// the recipient count so an external mailer can pick it up.
pub async fn send_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let storefront = state.tenant_storefront(&auth.user_id).await?;
    let outcome = state
        .db
        .mark_campaign_sent(&storefront.id, &campaign_id)
        .await
        .map_err(AppError::Internal)?;

    match outcome {
        CampaignOutcome::Done(campaign) => {
            tracing::info!(
                campaign_id = %campaign.id,
                storefront_id = %storefront.id,
                recipients = campaign.recipients,
                "Campaign sent"
            );
            Ok(Json(json!({ "data": campaign })))
        }
        CampaignOutcome::NotFound => Err(not_found()),
        CampaignOutcome::NotDraft => Err(AppError::Conflict(
            "Campaign has already been sent".to_string(),
        )),
    }
}

/// `GET /api/campaigns/{id}/stats`: clicks attributed to the campaign, per
/// product and per day.
pub async fn campaign_stats(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let storefront = state.tenant_storefront(&auth.user_id).await?;
    let campaign = state
        .db
        .get_campaign(&storefront.id, &campaign_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(not_found)?;

    let clicks = state
        .db
        .campaign_clicks(&storefront.id, &campaign.id)
        .await
        .map_err(AppError::Internal)?;
    let products = state
        .db
        .product_summaries(&storefront.id)
        .await
        .map_err(AppError::Internal)?;
    let agg = aggregate(&clicks, &products, Interval::Daily, None);

    Ok(Json(json!({
        "data": {
            "campaign_id": campaign.id,
            "recipients": campaign.recipients,
            "clicks": agg.total_clicks,
            "clicks_by_product": agg.clicks_by_product,
            "clicks_by_day": agg.clicks_by_interval,
        }
    })))
}
