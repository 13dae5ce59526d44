use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use briklyst_core::analytics::ClickEvent;

use crate::backend::{format_ts, parse_ts};
use crate::DuckDbBackend;

/// A click as stored, with the recording context the aggregator ignores.
#[derive(Debug, Clone, Serialize)]
pub struct ClickRecord {
    pub id: String,
    pub product_id: String,
    pub storefront_id: String,
    pub campaign_id: Option<String>,
    pub visitor_hash: String,
    pub referrer_domain: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One row of the CSV export.
#[derive(Debug, Clone)]
pub struct ClickExportRow {
    pub id: String,
    pub product_id: String,
    /// `None` once the product has been deleted.
    pub title: Option<String>,
    pub campaign_id: Option<String>,
    pub referrer_domain: Option<String>,
    pub created_at: String,
}

impl DuckDbBackend {
    /// Insert a batch of clicks in a single transaction.
    ///
    /// Called by the click-buffer flush. Returns immediately if `clicks` is empty.
    pub async fn insert_clicks(&self, clicks: &[ClickRecord]) -> Result<()> {
        if clicks.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        for click in clicks {
            tx.execute(
                "INSERT INTO clicks (id, product_id, storefront_id, campaign_id, visitor_hash, \
                 referrer_domain, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, CAST(?7 AS TIMESTAMP))",
                duckdb::params![
                    click.id,
                    click.product_id,
                    click.storefront_id,
                    click.campaign_id,
                    click.visitor_hash,
                    click.referrer_domain,
                    format_ts(&click.created_at),
                ],
            )?;
        }
        tx.commit()?;
        tracing::info!("Inserted {} clicks into DuckDB", clicks.len());
        Ok(())
    }

    /// Clicks recorded through one campaign's tracking links.
    pub async fn campaign_clicks(
        &self,
        storefront_id: &str,
        campaign_id: &str,
    ) -> Result<Vec<ClickEvent>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, product_id, CAST(created_at AS VARCHAR) FROM clicks \
             WHERE storefront_id = ?1 AND campaign_id = ?2 ORDER BY created_at",
        )?;
        let rows = stmt.query_map(duckdb::params![storefront_id, campaign_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut clicks = Vec::new();
        for row in rows {
            let (id, product_id, created_at) = row?;
            clicks.push(ClickEvent {
                id,
                product_id,
                created_at: parse_ts(&created_at)?,
            });
        }
        Ok(clicks)
    }

    /// Clicks in `[start, end)` joined with the product title, oldest first.
    pub async fn export_clicks(
        &self,
        storefront_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ClickExportRow>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT c.id, c.product_id, p.title, c.campaign_id, c.referrer_domain, \
             CAST(c.created_at AS VARCHAR) \
             FROM clicks c LEFT JOIN products p ON p.id = c.product_id \
             WHERE c.storefront_id = ?1 \
               AND c.created_at >= CAST(?2 AS TIMESTAMP) \
               AND c.created_at < CAST(?3 AS TIMESTAMP) \
             ORDER BY c.created_at, c.id",
        )?;
        let rows = stmt.query_map(
            duckdb::params![storefront_id, format_ts(&start), format_ts(&end)],
            |row| {
                Ok(ClickExportRow {
                    id: row.get(0)?,
                    product_id: row.get(1)?,
                    title: row.get(2)?,
                    campaign_id: row.get(3)?,
                    referrer_domain: row.get(4)?,
                    created_at: row.get(5)?,
                })
            },
        )?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}
