use async_trait::async_trait;
use chrono::{DateTime, Utc};

use briklyst_core::analytics::{ClickEvent, ClickSource, ProductSummary};

use crate::backend::{format_ts, parse_ts};
use crate::DuckDbBackend;

#[async_trait]
impl ClickSource for DuckDbBackend {
    async fn product_summaries(&self, storefront_id: &str) -> anyhow::Result<Vec<ProductSummary>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, title FROM products WHERE storefront_id = ?1 ORDER BY position, id",
        )?;
        let rows = stmt.query_map(duckdb::params![storefront_id], |row| {
            Ok(ProductSummary {
                id: row.get(0)?,
                title: row.get(1)?,
            })
        })?;

        let mut products = Vec::new();
        for row in rows {
            products.push(row?);
        }
        Ok(products)
    }

    async fn clicks_in_range(
        &self,
        storefront_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<ClickEvent>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, product_id, CAST(created_at AS VARCHAR) FROM clicks \
             WHERE storefront_id = ?1 \
               AND created_at >= CAST(?2 AS TIMESTAMP) \
               AND created_at < CAST(?3 AS TIMESTAMP) \
             ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map(
            duckdb::params![storefront_id, format_ts(&start), format_ts(&end)],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )?;

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
}
