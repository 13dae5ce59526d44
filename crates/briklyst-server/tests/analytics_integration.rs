use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use briklyst_core::config::Config;
use briklyst_duckdb::DuckDbBackend;
use briklyst_server::app::build_app;
use briklyst_server::state::AppState;

fn test_config() -> Config {
    Config {
        port: 0,
        data_dir: "/tmp/briklyst-test".to_string(),
        https: false,
        cors_origins: vec![],
        session_days: 7,
        argon2_memory_kb: 4096,
        public_url: "http://localhost:3000".to_string(),
        duckdb_memory_limit: "1GB".to_string(),
        analytics_default_days: 30,
        buffer_flush_interval_ms: 5000,
        buffer_max_size: 100,
    }
}

async fn setup() -> (Arc<AppState>, axum::Router) {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    let state = Arc::new(AppState::new(db, test_config()));
    let app = build_app(Arc::clone(&state));
    (state, app)
}

async fn json_body(response: axum::http::Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("parse JSON")
}

async fn text_body(response: axum::http::Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    cookie: &str,
    body: Option<Value>,
) -> axum::http::Response<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, cookie);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("build request");
    app.clone().oneshot(request).await.expect("request")
}

async fn signup(app: &axum::Router, email: &str) -> String {
    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/signup")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "email": email, "password": "strong_password_123", "name": "Tenant" })
                .to_string(),
        ))
        .expect("build request");
    let response = app.clone().oneshot(request).await.expect("request");
    assert_eq!(response.status(), StatusCode::CREATED);
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|c| c.split(';').next())
        .expect("set-cookie")
        .to_string()
}

/// Signed-up tenant with a published storefront and the given products.
/// Returns the session cookie and the product ids in creation order.
async fn published_tenant(
    app: &axum::Router,
    email: &str,
    slug: &str,
    titles: &[&str],
) -> (String, Vec<String>) {
    let cookie = signup(app, email).await;
    let response = send(
        app,
        "POST",
        "/api/storefront",
        &cookie,
        Some(json!({ "slug": slug, "title": "Picks" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let response = send(
        app,
        "PUT",
        "/api/storefront",
        &cookie,
        Some(json!({ "published": true })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut ids = Vec::new();
    for title in titles {
        let response = send(
            app,
            "POST",
            "/api/products",
            &cookie,
            Some(json!({
                "title": title,
                "affiliate_url": format!("https://shop.example.com/{}", title.to_lowercase()),
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = json_body(response).await;
        ids.push(json["data"]["id"].as_str().expect("product id").to_string());
    }
    (cookie, ids)
}

fn click_request(uri: &str, ip: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-forwarded-for", ip)
        .header(header::USER_AGENT, "Mozilla/5.0 (test)")
        .header(header::REFERER, "https://www.instagram.com/p/abc")
        .body(Body::empty())
        .expect("build request")
}

async fn click(app: &axum::Router, product_id: &str) -> axum::http::Response<Body> {
    app.clone()
        .oneshot(click_request(&format!("/go/{product_id}"), "203.0.113.7"))
        .await
        .expect("request")
}

fn today_range() -> String {
    let today = Utc::now().format("%Y-%m-%d");
    format!("{today}_to_{today}")
}

#[tokio::test]
async fn test_click_redirects_to_affiliate_url() {
    let (state, app) = setup().await;
    let (_cookie, ids) = published_tenant(&app, "ada@example.com", "ada-picks", &["Kettle"]).await;

    let response = click(&app, &ids[0]).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok()),
        Some("https://shop.example.com/kettle")
    );

    // Buffered until the next flush.
    assert_eq!(state.buffer.lock().await.len(), 1);
    state.flush_buffer().await;
    assert!(state.buffer.lock().await.is_empty());
}

#[tokio::test]
async fn test_click_unknown_or_inactive_product_is_not_found() {
    let (state, app) = setup().await;
    let (cookie, ids) = published_tenant(&app, "ada@example.com", "ada-picks", &["Kettle"]).await;

    let response = click(&app, "does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    send(
        &app,
        "PUT",
        &format!("/api/products/{}", ids[0]),
        &cookie,
        Some(json!({ "is_active": false })),
    )
    .await;
    let response = click(&app, &ids[0]).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert!(state.buffer.lock().await.is_empty());
}

#[tokio::test]
async fn test_click_on_unpublished_storefront_is_not_found() {
    let (_state, app) = setup().await;
    let (cookie, ids) = published_tenant(&app, "ada@example.com", "ada-picks", &["Kettle"]).await;

    send(
        &app,
        "PUT",
        "/api/storefront",
        &cookie,
        Some(json!({ "published": false })),
    )
    .await;
    let response = click(&app, &ids[0]).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_click_rate_limit_per_ip() {
    let (_state, app) = setup().await;
    let (_cookie, ids) = published_tenant(&app, "ada@example.com", "ada-picks", &["Kettle"]).await;
    let uri = format!("/go/{}", ids[0]);

    for _ in 0..120 {
        let response = app
            .clone()
            .oneshot(click_request(&uri, "198.51.100.1"))
            .await
            .expect("request");
        assert_eq!(response.status(), StatusCode::FOUND);
    }
    let response = app
        .clone()
        .oneshot(click_request(&uri, "198.51.100.1"))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // Other addresses are unaffected.
    let response = app
        .oneshot(click_request(&uri, "198.51.100.2"))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn test_analytics_counts_and_ranking() {
    let (state, app) = setup().await;
    let (cookie, ids) =
        published_tenant(&app, "ada@example.com", "ada-picks", &["Kettle", "Lamp", "Mug"]).await;
    let (kettle, lamp, mug) = (&ids[0], &ids[1], &ids[2]);

    for product in [lamp, lamp, lamp, kettle, mug, mug] {
        assert_eq!(click(&app, product).await.status(), StatusCode::FOUND);
    }
    state.flush_buffer().await;

    let uri = format!("/api/analytics?range={}&interval=daily", today_range());
    let response = send(&app, "GET", &uri, &cookie, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    let data = &json["data"];

    assert_eq!(data["totalClicks"], 6);
    assert_eq!(data["clicksByProduct"][lamp.as_str()], 3);
    assert_eq!(data["clicksByProduct"][mug.as_str()], 2);
    assert_eq!(data["clicksByProduct"][kettle.as_str()], 1);

    let today = Utc::now().format("%Y-%m-%d").to_string();
    assert_eq!(data["clicksByInterval"][today.as_str()], 6);

    let popular = data["mostPopular"].as_array().expect("mostPopular");
    assert_eq!(popular.len(), 3);
    assert_eq!(popular[0]["productId"], lamp.as_str());
    assert_eq!(popular[0]["title"], "Lamp");
    assert_eq!(popular[0]["count"], 3);
    assert_eq!(popular[1]["productId"], mug.as_str());
    assert_eq!(popular[2]["productId"], kettle.as_str());

    assert_eq!(data["productTitles"][kettle.as_str()], "Kettle");
}

#[tokio::test]
async fn test_analytics_product_filter_and_default_range() {
    let (state, app) = setup().await;
    let (cookie, ids) =
        published_tenant(&app, "ada@example.com", "ada-picks", &["Kettle", "Lamp"]).await;

    for product in [&ids[0], &ids[1], &ids[1]] {
        click(&app, product).await;
    }
    state.flush_buffer().await;

    // No range: the default window ending today.
    let uri = format!("/api/analytics?productId={}", ids[1]);
    let response = send(&app, "GET", &uri, &cookie, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["data"]["totalClicks"], 2);
    assert!(json["data"]["clicksByProduct"].get(ids[0].as_str()).is_none());
}

#[tokio::test]
async fn test_analytics_monthly_interval_key() {
    let (state, app) = setup().await;
    let (cookie, ids) = published_tenant(&app, "ada@example.com", "ada-picks", &["Kettle"]).await;

    click(&app, &ids[0]).await;
    state.flush_buffer().await;

    let uri = format!("/api/analytics?range={}&interval=monthly", today_range());
    let response = send(&app, "GET", &uri, &cookie, None).await;
    let json = json_body(response).await;
    let now = Utc::now();
    let key = format!("{}-{}", now.format("%Y"), now.format("%-m"));
    assert_eq!(json["data"]["clicksByInterval"][key.as_str()], 1);
}

#[tokio::test]
async fn test_analytics_empty_storefront() {
    let (_state, app) = setup().await;
    let (cookie, _ids) = published_tenant(&app, "ada@example.com", "ada-picks", &[]).await;

    let response = send(&app, "GET", "/api/analytics", &cookie, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["data"]["totalClicks"], 0);
    assert_eq!(json["data"]["mostPopular"], json!([]));
    assert_eq!(json["data"]["clicksByInterval"], json!({}));
}

#[tokio::test]
async fn test_analytics_rejects_bad_range() {
    let (_state, app) = setup().await;
    let (cookie, _ids) = published_tenant(&app, "ada@example.com", "ada-picks", &[]).await;

    for range in [
        "yesterday",
        "2024-02-10_to_2024-02-01",
        "2024-13-01_to_2024-13-02",
        // Last representable day: the exclusive end would overflow.
        "2024-01-01_to_%2B262142-12-31",
    ] {
        let uri = format!("/api/analytics?range={range}");
        let response = send(&app, "GET", &uri, &cookie, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "range {range:?}");
        let json = json_body(response).await;
        assert_eq!(json["error"]["field"], "range");
    }
}

#[tokio::test]
async fn test_analytics_is_tenant_scoped() {
    let (state, app) = setup().await;
    let (_ada, ada_ids) =
        published_tenant(&app, "ada@example.com", "ada-picks", &["Kettle"]).await;
    let (bob, _bob_ids) = published_tenant(&app, "bob@example.com", "bob-picks", &["Skates"]).await;

    click(&app, &ada_ids[0]).await;
    state.flush_buffer().await;

    let response = send(&app, "GET", "/api/analytics", &bob, None).await;
    let json = json_body(response).await;
    assert_eq!(json["data"]["totalClicks"], 0);
}

#[tokio::test]
async fn test_campaign_attribution_and_stats() {
    let (state, app) = setup().await;
    let (cookie, ids) =
        published_tenant(&app, "ada@example.com", "ada-picks", &["Kettle", "Lamp"]).await;
    let (_bob, bob_ids) = published_tenant(&app, "bob@example.com", "bob-picks", &["Skates"]).await;

    let response = send(
        &app,
        "POST",
        "/api/campaigns",
        &cookie,
        Some(json!({ "subject": "Spring picks", "body": "..." })),
    )
    .await;
    let campaign_id = json_body(response).await["data"]["id"]
        .as_str()
        .expect("campaign id")
        .to_string();

    for product in [&ids[0], &ids[1], &ids[1]] {
        let response = click(&app, &format!("{product}?c={campaign_id}")).await;
        assert_eq!(response.status(), StatusCode::FOUND);
    }
    // Not attributed: the campaign belongs to another storefront.
    click(&app, &format!("{}?c={campaign_id}", bob_ids[0])).await;
    // Not attributed: no campaign.
    click(&app, &ids[0]).await;
    state.flush_buffer().await;

    let uri = format!("/api/campaigns/{campaign_id}/stats");
    let response = send(&app, "GET", &uri, &cookie, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["data"]["clicks"], 3);
    assert_eq!(json["data"]["clicks_by_product"][ids[1].as_str()], 2);
    assert_eq!(json["data"]["clicks_by_product"][ids[0].as_str()], 1);
    let by_day = json["data"]["clicks_by_day"].as_object().expect("clicks_by_day");
    let today = Utc::now().format("%Y-%m-%d").to_string();
    assert_eq!(by_day.get(&today).and_then(Value::as_u64), Some(3));
}

#[tokio::test]
async fn test_export_csv() {
    let (state, app) = setup().await;
    let (cookie, ids) = published_tenant(&app, "ada@example.com", "ada-picks", &["Kettle"]).await;

    click(&app, &ids[0]).await;
    click(&app, &ids[0]).await;
    state.flush_buffer().await;

    let uri = format!("/api/analytics/export?range={}", today_range());
    let response = send(&app, "GET", &uri, &cookie, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("text/csv; charset=utf-8")
    );
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .expect("content-disposition")
        .to_string();
    assert!(disposition.contains("clicks-ada-picks-"));

    let body = text_body(response).await;
    let mut lines = body.lines();
    assert_eq!(
        lines.next(),
        Some("id,product_id,title,campaign_id,referrer_domain,created_at")
    );
    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.contains(ids[0].as_str())));
    assert!(rows.iter().all(|r| r.contains("Kettle")));
    assert!(rows.iter().all(|r| r.contains("instagram.com")));
}

#[tokio::test]
async fn test_export_rejects_oversized_range() {
    let (_state, app) = setup().await;
    let (cookie, _ids) = published_tenant(&app, "ada@example.com", "ada-picks", &[]).await;

    let response = send(
        &app,
        "GET",
        "/api/analytics/export?range=2023-01-01_to_2024-12-31",
        &cookie,
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"]["field"], "range");
}

#[tokio::test]
async fn test_buffer_flushes_early_at_max_size() {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    let mut config = test_config();
    config.buffer_max_size = 2;
    let state = Arc::new(AppState::new(db, config));
    let app = build_app(Arc::clone(&state));
    let (_cookie, ids) = published_tenant(&app, "ada@example.com", "ada-picks", &["Kettle"]).await;

    click(&app, &ids[0]).await;
    assert_eq!(state.buffer.lock().await.len(), 1);
    click(&app, &ids[0]).await;
    assert!(state.buffer.lock().await.is_empty());
}
