use anyhow::Result;
use serde::Serialize;

use crate::backend::generate_id;
use crate::DuckDbBackend;

#[derive(Debug, Clone, Serialize)]
pub struct Subscriber {
    pub id: String,
    pub storefront_id: String,
    pub email: String,
    pub created_at: String,
}

fn subscriber_from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Subscriber> {
    Ok(Subscriber {
        id: row.get(0)?,
        storefront_id: row.get(1)?,
        email: row.get(2)?,
        created_at: row.get(3)?,
    })
}

impl DuckDbBackend {
    /// Add `email` (already normalized) to a storefront's list.
    ///
    /// Returns the subscriber and whether it was newly created.
    pub async fn add_subscriber(&self, storefront_id: &str, email: &str) -> Result<(Subscriber, bool)> {
        let conn = self.conn.lock().await;
        let select = "SELECT id, storefront_id, email, CAST(created_at AS VARCHAR) \
                      FROM subscribers WHERE storefront_id = ?1 AND email = ?2";

        if let Ok(existing) = conn
            .prepare(select)?
            .query_row(duckdb::params![storefront_id, email], subscriber_from_row)
        {
            return Ok((existing, false));
        }

        let id = generate_id("sub");
        conn.execute(
            "INSERT INTO subscribers (id, storefront_id, email, created_at) \
             VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP)",
            duckdb::params![id, storefront_id, email],
        )?;
        let created = conn
            .prepare(select)?
            .query_row(duckdb::params![storefront_id, email], subscriber_from_row)?;
        Ok((created, true))
    }

    /// Subscribers, newest first.
    pub async fn list_subscribers(&self, storefront_id: &str) -> Result<Vec<Subscriber>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, storefront_id, email, CAST(created_at AS VARCHAR) \
             FROM subscribers WHERE storefront_id = ?1 ORDER BY created_at DESC, id",
        )?;
        let rows = stmt.query_map(duckdb::params![storefront_id], subscriber_from_row)?;

        let mut subscribers = Vec::new();
        for row in rows {
            subscribers.push(row?);
        }
        Ok(subscribers)
    }

    pub async fn delete_subscriber(&self, storefront_id: &str, id: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let deleted = conn.execute(
            "DELETE FROM subscribers WHERE id = ?1 AND storefront_id = ?2",
            duckdb::params![id, storefront_id],
        )?;
        Ok(deleted > 0)
    }
}
