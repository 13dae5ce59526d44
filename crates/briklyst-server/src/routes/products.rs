use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use briklyst_duckdb::product::{CreateProductParams, UpdateProductParams};

use crate::{auth::middleware::AuthContext, error::AppError, state::AppState};

const MAX_URL_BYTES: usize = 2048;

fn validate_product_title(title: &str) -> Result<(), AppError> {
    if title.trim().is_empty() {
        return Err(AppError::Invalid {
            field: "title",
            message: "title is required".to_string(),
        });
    }
    if title.chars().count() > 200 {
        return Err(AppError::Invalid {
            field: "title",
            message: "title must be 200 characters or fewer".to_string(),
        });
    }
    Ok(())
}

/// Accept only absolute http(s) URLs with a host and no embedded credentials.
pub(crate) fn parse_http_url(field: &'static str, raw: &str) -> Result<Url, AppError> {
    let invalid = |message: &str| AppError::Invalid {
        field,
        message: message.to_string(),
    };
    if raw.len() > MAX_URL_BYTES {
        return Err(invalid("URL is too long"));
    }
    let parsed = Url::parse(raw.trim()).map_err(|_| invalid("must be a valid URL"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("must use http:// or https://"));
    }
    if parsed.host_str().is_none() {
        return Err(invalid("must include a hostname"));
    }
    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err(invalid("cannot include credentials"));
    }
    Ok(parsed)
}

fn validate_optional_text(field: &'static str, value: &Option<String>, max: usize) -> Result<(), AppError> {
    if value.as_deref().is_some_and(|v| v.chars().count() > max) {
        return Err(AppError::Invalid {
            field,
            message: format!("{field} must be {max} characters or fewer"),
        });
    }
    Ok(())
}

pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    let storefront = state.tenant_storefront(&auth.user_id).await?;
    let products = state
        .db
        .list_products(&storefront.id, false)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(json!({ "data": products })))
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub title: String,
    pub affiliate_url: String,
    pub description: Option<String>,
    pub price: Option<String>,
    pub image_url: Option<String>,
}

pub async fn create_product(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, AppError> {
    let storefront = state.tenant_storefront(&auth.user_id).await?;

    validate_product_title(&req.title)?;
    let affiliate_url = parse_http_url("affiliate_url", &req.affiliate_url)?;
    if let Some(ref image_url) = req.image_url {
        parse_http_url("image_url", image_url)?;
    }
    validate_optional_text("description", &req.description, 2000)?;
    validate_optional_text("price", &req.price, 32)?;

    let product = state
        .db
        .create_product(
            &storefront.id,
            CreateProductParams {
                title: req.title.trim().to_string(),
                affiliate_url: affiliate_url.to_string(),
                description: req.description,
                price: req.price,
                image_url: req.image_url,
            },
        )
        .await
        .map_err(AppError::Internal)?;

    Ok((StatusCode::CREATED, Json(json!({ "data": product }))))
}

pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(product_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let storefront = state.tenant_storefront(&auth.user_id).await?;
    let product = state
        .db
        .get_product(&storefront.id, &product_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
    Ok(Json(json!({ "data": product })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub title: Option<String>,
    pub affiliate_url: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

pub async fn update_product(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(product_id): Path<String>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<impl IntoResponse, AppError> {
    let storefront = state.tenant_storefront(&auth.user_id).await?;

    if let Some(ref title) = req.title {
        validate_product_title(title)?;
    }
    let affiliate_url = match req.affiliate_url {
        Some(ref raw) => Some(parse_http_url("affiliate_url", raw)?.to_string()),
        None => None,
    };
    if let Some(ref image_url) = req.image_url {
        if !image_url.is_empty() {
            parse_http_url("image_url", image_url)?;
        }
    }
    validate_optional_text("description", &req.description, 2000)?;
    validate_optional_text("price", &req.price, 32)?;

    let product = state
        .db
        .update_product(
            &storefront.id,
            &product_id,
            UpdateProductParams {
                title: req.title.map(|t| t.trim().to_string()),
                affiliate_url,
                description: req.description,
                price: req.price,
                image_url: req.image_url,
                is_active: req.is_active,
            },
        )
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    Ok(Json(json!({ "data": product })))
}

pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(product_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let storefront = state.tenant_storefront(&auth.user_id).await?;
    let deleted = state
        .db
        .delete_product(&storefront.id, &product_id)
        .await
        .map_err(AppError::Internal)?;
    if !deleted {
        return Err(AppError::NotFound("Product not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub ids: Vec<String>,
}

/// `PUT /api/products/order`: `ids` must list every product exactly once.
pub async fn reorder_products(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<ReorderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let storefront = state.tenant_storefront(&auth.user_id).await?;
    let reordered = state
        .db
        .reorder_products(&storefront.id, &req.ids)
        .await
        .map_err(AppError::Internal)?;
    if !reordered {
        return Err(AppError::Invalid {
            field: "ids",
            message: "ids must list each of the storefront's products exactly once".to_string(),
        });
    }

    let products = state
        .db
        .list_products(&storefront.id, false)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(json!({ "data": products })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_scheme() {
        assert!(parse_http_url("affiliate_url", "javascript:alert(1)").is_err());
        assert!(parse_http_url("affiliate_url", "ftp://example.com/file").is_err());
    }

    #[test]
    fn rejects_credentials() {
        assert!(parse_http_url("affiliate_url", "https://user:pw@shop.example.com/").is_err());
    }

    #[test]
    fn accepts_plain_https() {
        let url = parse_http_url("affiliate_url", "https://shop.example.com/item?ref=me")
            .expect("url");
        assert_eq!(url.host_str(), Some("shop.example.com"));
    }

    #[test]
    fn title_limit_counts_characters() {
        assert!(validate_product_title(&"é".repeat(150)).is_ok());
        assert!(validate_product_title(&"茶".repeat(200)).is_ok());
        assert!(validate_product_title(&"茶".repeat(201)).is_err());
    }

    #[test]
    fn optional_text_limit_counts_characters() {
        let description = Some("ü".repeat(10));
        assert!(validate_optional_text("description", &description, 10).is_ok());
        assert!(validate_optional_text("description", &Some("ü".repeat(11)), 10).is_err());
    }
}
