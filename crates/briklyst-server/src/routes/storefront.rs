use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;

use briklyst_core::storefront::{
    default_sections, validate_sections, validate_slug, Section, Theme,
};
use briklyst_duckdb::storefront::{
    CreateStorefrontParams, SaveOutcome, Storefront, UpdateStorefrontParams,
};
use briklyst_duckdb::template::Template;

use crate::{auth::middleware::AuthContext, error::AppError, state::AppState};

fn validate_title(title: &str) -> Result<(), AppError> {
    if title.trim().is_empty() || title.chars().count() > 100 {
        return Err(AppError::Invalid {
            field: "title",
            message: "title must be 1-100 characters".to_string(),
        });
    }
    Ok(())
}

fn validate_bio(bio: &str) -> Result<(), AppError> {
    if bio.chars().count() > 500 {
        return Err(AppError::Invalid {
            field: "bio",
            message: "bio must be 500 characters or fewer".to_string(),
        });
    }
    Ok(())
}

fn saved(outcome: SaveOutcome<Storefront>) -> Result<Storefront, AppError> {
    match outcome {
        SaveOutcome::Saved(storefront) => Ok(storefront),
        SaveOutcome::NotFound => Err(AppError::NotFound("Storefront not found".to_string())),
        SaveOutcome::AlreadyExists => Err(AppError::Conflict(
            "This account already has a storefront".to_string(),
        )),
        SaveOutcome::SlugTaken => Err(AppError::Conflict("Slug is already taken".to_string())),
    }
}

async fn load_template(state: &AppState, template_id: &str) -> Result<Template, AppError> {
    state
        .db
        .get_template(template_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound("Template not found".to_string()))
}

// ---------------------------------------------------------------------------
// POST /api/storefront
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateStorefrontRequest {
    pub slug: String,
    pub title: String,
    pub bio: Option<String>,
    pub template_id: Option<String>,
}

pub async fn create_storefront(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateStorefrontRequest>,
) -> Result<impl IntoResponse, AppError> {
    let slug = req.slug.trim().to_string();
    validate_slug(&slug)?;
    validate_title(&req.title)?;
    if let Some(ref bio) = req.bio {
        validate_bio(bio)?;
    }

    let (theme, sections) = match req.template_id {
        Some(ref template_id) => {
            let template = load_template(&state, template_id).await?;
            (template.theme, template.sections)
        }
        None => (Theme::default(), default_sections()),
    };

    let outcome = state
        .db
        .create_storefront(CreateStorefrontParams {
            user_id: auth.user_id,
            slug,
            title: req.title.trim().to_string(),
            bio: req.bio,
            theme,
            sections,
            template_id: req.template_id,
        })
        .await
        .map_err(AppError::Internal)?;
    let storefront = saved(outcome)?;

    tracing::info!(storefront_id = %storefront.id, slug = %storefront.slug, "Storefront created");
    Ok((StatusCode::CREATED, Json(json!({ "data": storefront }))))
}

// ---------------------------------------------------------------------------
// GET /api/storefront
// ---------------------------------------------------------------------------

pub async fn get_storefront(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    let storefront = state.tenant_storefront(&auth.user_id).await?;
    Ok(Json(json!({ "data": storefront })))
}

// ---------------------------------------------------------------------------
// PUT /api/storefront
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct UpdateStorefrontRequest {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub theme: Option<Theme>,
    pub sections: Option<Vec<Section>>,
    pub published: Option<bool>,
}

pub async fn update_storefront(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<UpdateStorefrontRequest>,
) -> Result<impl IntoResponse, AppError> {
    let storefront = state.tenant_storefront(&auth.user_id).await?;

    let slug = req.slug.map(|s| s.trim().to_string());
    if let Some(ref slug) = slug {
        validate_slug(slug)?;
    }
    if let Some(ref title) = req.title {
        validate_title(title)?;
    }
    if let Some(ref bio) = req.bio {
        validate_bio(bio)?;
    }
    if let Some(ref avatar_url) = req.avatar_url {
        if !avatar_url.is_empty() {
            super::products::parse_http_url("avatar_url", avatar_url)?;
        }
    }
    if let Some(ref theme) = req.theme {
        theme.validate()?;
    }
    if let Some(ref sections) = req.sections {
        validate_sections(sections)?;
    }

    let outcome = state
        .db
        .update_storefront(
            &storefront.id,
            UpdateStorefrontParams {
                slug,
                title: req.title.map(|t| t.trim().to_string()),
                bio: req.bio,
                avatar_url: req.avatar_url,
                theme: req.theme,
                sections: req.sections,
                template_id: None,
                published: req.published,
            },
        )
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(json!({ "data": saved(outcome)? })))
}

// ---------------------------------------------------------------------------
// POST /api/storefront/template
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ApplyTemplateRequest {
    pub template_id: String,
}

/// Overwrite the storefront's theme and sections with a template's.
pub async fn apply_template(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<ApplyTemplateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let storefront = state.tenant_storefront(&auth.user_id).await?;
    let template = load_template(&state, &req.template_id).await?;

    let outcome = state
        .db
        .update_storefront(
            &storefront.id,
            UpdateStorefrontParams {
                theme: Some(template.theme),
                sections: Some(template.sections),
                template_id: Some(template.id),
                ..Default::default()
            },
        )
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(json!({ "data": saved(outcome)? })))
}

// ---------------------------------------------------------------------------
// GET /api/templates
// ---------------------------------------------------------------------------

pub async fn list_templates(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let templates = state.db.list_templates().await.map_err(AppError::Internal)?;
    Ok(Json(json!({ "data": templates })))
}
