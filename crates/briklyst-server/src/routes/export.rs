use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, StatusCode},
    response::Response,
    Extension,
};
use serde::Deserialize;

use briklyst_duckdb::clicks::ClickExportRow;

use crate::{
    auth::middleware::AuthContext, error::AppError, routes::analytics::resolve_range,
    state::AppState,
};

/// Maximum date range allowed for export.
const MAX_EXPORT_DAYS: i64 = 366;

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub range: Option<String>,
}

/// `GET /api/analytics/export`: download the clicks in range as CSV.
#[tracing::instrument(skip(state, auth))]
pub async fn export_clicks(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(q): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let storefront = state.tenant_storefront(&auth.user_id).await?;
    let range = resolve_range(&state, q.range.as_deref())?;

    let range_days = range.num_days();
    if range_days > MAX_EXPORT_DAYS {
        return Err(AppError::Invalid {
            field: "range",
            message: format!("date range too large: {range_days} days (max {MAX_EXPORT_DAYS})"),
        });
    }

    let rows = state
        .db
        .export_clicks(&storefront.id, range.start, range.end)
        .await
        .map_err(AppError::Internal)?;

    let csv_bytes = Bytes::from(build_csv(&rows).map_err(AppError::Internal)?);
    let filename = format!("clicks-{}-{}.csv", storefront.slug, range.label());
    build_csv_response(&filename, csv_bytes)
}

/// Sanitize a CSV field value against formula injection.
///
/// Spreadsheet apps treat values starting with `=`, `+`, `-`, `@`, TAB or CR
/// as formulas. A leading single quote makes them literal.
fn sanitize_csv_field(val: &str) -> std::borrow::Cow<'_, str> {
    if val.starts_with(['=', '+', '-', '@', '\t', '\r']) {
        std::borrow::Cow::Owned(format!("'{val}"))
    } else {
        std::borrow::Cow::Borrowed(val)
    }
}

fn build_csv(rows: &[ClickExportRow]) -> anyhow::Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::with_capacity(rows.len().saturating_mul(128)));

    wtr.write_record([
        "id",
        "product_id",
        "title",
        "campaign_id",
        "referrer_domain",
        "created_at",
    ])
    .map_err(|e| anyhow::anyhow!("csv write_record failed: {e}"))?;

    for row in rows {
        let id = sanitize_csv_field(&row.id);
        let product_id = sanitize_csv_field(&row.product_id);
        let title = sanitize_csv_field(row.title.as_deref().unwrap_or(""));
        let campaign_id = sanitize_csv_field(row.campaign_id.as_deref().unwrap_or(""));
        let referrer_domain = sanitize_csv_field(row.referrer_domain.as_deref().unwrap_or(""));
        let created_at = sanitize_csv_field(&row.created_at);

        wtr.write_record([
            id.as_ref(),
            product_id.as_ref(),
            title.as_ref(),
            campaign_id.as_ref(),
            referrer_domain.as_ref(),
            created_at.as_ref(),
        ])
        .map_err(|e| anyhow::anyhow!("csv write_record failed: {e}"))?;
    }

    wtr.into_inner()
        .map_err(|e| anyhow::anyhow!("csv flush failed: {e}"))
}

fn build_csv_response(filename: &str, csv_bytes: Bytes) -> Result<Response, AppError> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/csv; charset=utf-8")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(axum::body::Body::from(csv_bytes))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("response build failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formula_prefixes_are_neutralised() {
        assert_eq!(sanitize_csv_field("=HYPERLINK(\"x\")"), "'=HYPERLINK(\"x\")");
        assert_eq!(sanitize_csv_field("@cmd"), "'@cmd");
        assert_eq!(sanitize_csv_field("Desk Lamp"), "Desk Lamp");
    }

    #[test]
    fn deleted_product_title_is_blank() {
        let rows = vec![ClickExportRow {
            id: "c1".to_string(),
            product_id: "prd_gone".to_string(),
            title: None,
            campaign_id: None,
            referrer_domain: Some("instagram.com".to_string()),
            created_at: "2024-01-05 10:00:00".to_string(),
        }];
        let csv = String::from_utf8(build_csv(&rows).expect("csv")).expect("utf8");
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("id,product_id,title,campaign_id,referrer_domain,created_at")
        );
        assert_eq!(
            lines.next(),
            Some("c1,prd_gone,,,instagram.com,2024-01-05 10:00:00")
        );
    }
}
