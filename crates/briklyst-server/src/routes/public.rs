use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use briklyst_core::storefront::normalize_email;
use briklyst_duckdb::storefront::Storefront;

use crate::{error::AppError, state::AppState};

async fn published_storefront(state: &AppState, slug: &str) -> Result<Storefront, AppError> {
    state
        .db
        .get_storefront_by_slug(slug)
        .await
        .map_err(AppError::Internal)?
        .filter(|sf| sf.published)
        .ok_or_else(|| AppError::NotFound("Storefront not found".to_string()))
}

/// `GET /api/public/storefronts/{slug}`: everything a renderer needs for the
/// public page.
///
/// Hidden sections and inactive products are left out; collection members
/// are limited to the active products.
pub async fn get_public_storefront(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let storefront = published_storefront(&state, &slug).await?;

    let products = state
        .db
        .list_products(&storefront.id, true)
        .await
        .map_err(AppError::Internal)?;
    let active: HashSet<&str> = products.iter().map(|p| p.id.as_str()).collect();

    let collections = state
        .db
        .list_collections(&storefront.id)
        .await
        .map_err(AppError::Internal)?;

    let public_url = &state.config.public_url;
    let products_json: Vec<Value> = products
        .iter()
        .map(|p| {
            json!({
                "id": p.id,
                "title": p.title,
                "description": p.description,
                "price": p.price,
                "image_url": p.image_url,
                "click_url": format!("{public_url}/go/{}", p.id),
            })
        })
        .collect();
    let collections_json: Vec<Value> = collections
        .iter()
        .map(|c| {
            let product_ids: Vec<&String> = c
                .product_ids
                .iter()
                .filter(|id| active.contains(id.as_str()))
                .collect();
            json!({
                "id": c.id,
                "title": c.title,
                "description": c.description,
                "product_ids": product_ids,
            })
        })
        .collect();
    let sections: Vec<_> = storefront.sections.iter().filter(|s| s.visible).collect();

    Ok(Json(json!({
        "data": {
            "slug": storefront.slug,
            "title": storefront.title,
            "bio": storefront.bio,
            "avatar_url": storefront.avatar_url,
            "theme": storefront.theme,
            "sections": sections,
            "products": products_json,
            "collections": collections_json,
        }
    })))
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub email: String,
}

/// `POST /api/public/storefronts/{slug}/subscribe`: join the newsletter.
///
/// 201 for a new subscriber, 200 if the address was already on the list.
pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Json(req): Json<SubscribeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let storefront = published_storefront(&state, &slug).await?;
    let email = normalize_email(&req.email)?;

    let (subscriber, created) = state
        .db
        .add_subscriber(&storefront.id, &email)
        .await
        .map_err(AppError::Internal)?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(json!({
            "data": {
                "id": subscriber.id,
                "email": subscriber.email,
                "subscribed": true,
            }
        })),
    ))
}
