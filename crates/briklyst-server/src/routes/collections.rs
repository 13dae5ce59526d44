use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;

use briklyst_duckdb::collection::{
    CreateCollectionParams, MembershipOutcome, UpdateCollectionParams,
};

use crate::{auth::middleware::AuthContext, error::AppError, state::AppState};

fn validate_collection_title(title: &str) -> Result<(), AppError> {
    if title.trim().is_empty() || title.chars().count() > 100 {
        return Err(AppError::Invalid {
            field: "title",
            message: "title must be 1-100 characters".to_string(),
        });
    }
    Ok(())
}

fn not_found() -> AppError {
    AppError::NotFound("Collection not found".to_string())
}

pub async fn list_collections(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    let storefront = state.tenant_storefront(&auth.user_id).await?;
    let collections = state
        .db
        .list_collections(&storefront.id)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(json!({ "data": collections })))
}

#[derive(Debug, Deserialize)]
pub struct CreateCollectionRequest {
    pub title: String,
    pub description: Option<String>,
}

pub async fn create_collection(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateCollectionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let storefront = state.tenant_storefront(&auth.user_id).await?;
    validate_collection_title(&req.title)?;

    let collection = state
        .db
        .create_collection(
            &storefront.id,
            CreateCollectionParams {
                title: req.title.trim().to_string(),
                description: req.description,
            },
        )
        .await
        .map_err(AppError::Internal)?;
    Ok((StatusCode::CREATED, Json(json!({ "data": collection }))))
}

pub async fn get_collection(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(collection_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let storefront = state.tenant_storefront(&auth.user_id).await?;
    let collection = state
        .db
        .get_collection(&storefront.id, &collection_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(not_found)?;
    Ok(Json(json!({ "data": collection })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateCollectionRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub position: Option<i64>,
}

pub async fn update_collection(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(collection_id): Path<String>,
    Json(req): Json<UpdateCollectionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let storefront = state.tenant_storefront(&auth.user_id).await?;
    if let Some(ref title) = req.title {
        validate_collection_title(title)?;
    }

    let collection = state
        .db
        .update_collection(
            &storefront.id,
            &collection_id,
            UpdateCollectionParams {
                title: req.title.map(|t| t.trim().to_string()),
                description: req.description,
                position: req.position,
            },
        )
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(not_found)?;
    Ok(Json(json!({ "data": collection })))
}

pub async fn delete_collection(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(collection_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let storefront = state.tenant_storefront(&auth.user_id).await?;
    let deleted = state
        .db
        .delete_collection(&storefront.id, &collection_id)
        .await
        .map_err(AppError::Internal)?;
    if !deleted {
        return Err(not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct SetMembersRequest {
    pub product_ids: Vec<String>,
}

/// `PUT /api/collections/{id}/products`: replace membership, in order.
pub async fn set_collection_products(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(collection_id): Path<String>,
    Json(req): Json<SetMembersRequest>,
) -> Result<impl IntoResponse, AppError> {
    let storefront = state.tenant_storefront(&auth.user_id).await?;
    let outcome = state
        .db
        .set_collection_products(&storefront.id, &collection_id, &req.product_ids)
        .await
        .map_err(AppError::Internal)?;

    match outcome {
        MembershipOutcome::Updated(collection) => Ok(Json(json!({ "data": collection }))),
        MembershipOutcome::NotFound => Err(not_found()),
        MembershipOutcome::UnknownProduct(id) => Err(AppError::Invalid {
            field: "product_ids",
            message: format!("unknown product: {id}"),
        }),
    }
}
