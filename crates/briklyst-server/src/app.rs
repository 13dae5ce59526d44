use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    auth::{handlers as auth, middleware::require_auth},
    routes,
    state::AppState,
};

/// Construct the Axum [`Router`] with all routes and middleware attached.
///
/// Dashboard routes sit behind [`require_auth`]; storefront pages, the
/// click-through redirect and the auth endpoints are public.
pub fn build_app(state: Arc<AppState>) -> Router {
    let dashboard = Router::new()
        .route(
            "/api/storefront",
            get(routes::storefront::get_storefront)
                .post(routes::storefront::create_storefront)
                .put(routes::storefront::update_storefront),
        )
        .route(
            "/api/storefront/template",
            post(routes::storefront::apply_template),
        )
        .route("/api/templates", get(routes::storefront::list_templates))
        .route(
            "/api/products",
            get(routes::products::list_products).post(routes::products::create_product),
        )
        .route("/api/products/order", put(routes::products::reorder_products))
        .route(
            "/api/products/{id}",
            get(routes::products::get_product)
                .put(routes::products::update_product)
                .delete(routes::products::delete_product),
        )
        .route(
            "/api/collections",
            get(routes::collections::list_collections)
                .post(routes::collections::create_collection),
        )
        .route(
            "/api/collections/{id}",
            get(routes::collections::get_collection)
                .put(routes::collections::update_collection)
                .delete(routes::collections::delete_collection),
        )
        .route(
            "/api/collections/{id}/products",
            put(routes::collections::set_collection_products),
        )
        .route(
            "/api/campaigns",
            get(routes::campaigns::list_campaigns).post(routes::campaigns::create_campaign),
        )
        .route(
            "/api/campaigns/{id}",
            get(routes::campaigns::get_campaign)
                .put(routes::campaigns::update_campaign)
                .delete(routes::campaigns::delete_campaign),
        )
        .route("/api/campaigns/{id}/send", post(routes::campaigns::send_campaign))
        .route("/api/campaigns/{id}/stats", get(routes::campaigns::campaign_stats))
        .route("/api/subscribers", get(routes::subscribers::list_subscribers))
        .route(
            "/api/subscribers/{id}",
            axum::routing::delete(routes::subscribers::delete_subscriber),
        )
        .route("/api/analytics", get(routes::analytics::get_analytics))
        .route("/api/analytics/export", get(routes::export::export_clicks))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_auth,
        ));

    let public = Router::new()
        .route("/health", get(routes::health::health))
        .route("/api/auth/signup", post(auth::auth_signup))
        .route("/api/auth/login", post(auth::auth_login))
        .route("/api/auth/logout", post(auth::auth_logout))
        .route("/api/auth/session", get(auth::auth_session))
        .route(
            "/api/public/storefronts/{slug}",
            get(routes::public::get_public_storefront),
        )
        .route(
            "/api/public/storefronts/{slug}/subscribe",
            post(routes::public::subscribe),
        )
        .route("/go/{product_id}", get(routes::clicks::track_click));

    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .merge(dashboard)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Any origin when `origins` is empty; otherwise only the listed origins,
/// with credentials so the dashboard can send the session cookie.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
