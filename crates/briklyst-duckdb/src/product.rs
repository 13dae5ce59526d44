use std::collections::HashSet;

use anyhow::Result;
use duckdb::Connection;
use serde::Serialize;

use crate::backend::generate_id;
use crate::DuckDbBackend;

#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: String,
    pub storefront_id: String,
    pub title: String,
    pub description: Option<String>,
    pub price: Option<String>,
    pub image_url: Option<String>,
    pub affiliate_url: String,
    pub position: i64,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub struct CreateProductParams {
    pub title: String,
    pub affiliate_url: String,
    pub description: Option<String>,
    pub price: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Default)]
pub struct UpdateProductParams {
    pub title: Option<String>,
    pub affiliate_url: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

const PRODUCT_COLUMNS: &str = "id, storefront_id, title, description, price, image_url, \
     affiliate_url, position, is_active, CAST(created_at AS VARCHAR), CAST(updated_at AS VARCHAR)";

fn product_from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        storefront_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        price: row.get(4)?,
        image_url: row.get(5)?,
        affiliate_url: row.get(6)?,
        position: row.get(7)?,
        is_active: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn select_product(conn: &Connection, storefront_id: &str, id: &str) -> Result<Option<Product>> {
    let sql =
        format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1 AND storefront_id = ?2");
    let product = conn
        .prepare(&sql)?
        .query_row(duckdb::params![id, storefront_id], product_from_row)
        .ok();
    Ok(product)
}

impl DuckDbBackend {
    /// Create a product at the end of the storefront's ordering.
    pub async fn create_product(
        &self,
        storefront_id: &str,
        params: CreateProductParams,
    ) -> Result<Product> {
        let conn = self.conn.lock().await;
        let next_position: i64 = conn
            .prepare("SELECT COALESCE(MAX(position) + 1, 0) FROM products WHERE storefront_id = ?1")?
            .query_row(duckdb::params![storefront_id], |row| row.get(0))?;

        let id = generate_id("prd");
        conn.execute(
            "INSERT INTO products (id, storefront_id, title, description, price, image_url, \
             affiliate_url, position, is_active, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, true, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)",
            duckdb::params![
                id,
                storefront_id,
                params.title,
                params.description,
                params.price,
                params.image_url,
                params.affiliate_url,
                next_position,
            ],
        )?;

        select_product(&conn, storefront_id, &id)?
            .ok_or_else(|| anyhow::anyhow!("product {id} vanished after insert"))
    }

    /// List a storefront's products in display order.
    pub async fn list_products(&self, storefront_id: &str, only_active: bool) -> Result<Vec<Product>> {
        let conn = self.conn.lock().await;
        let sql = if only_active {
            format!(
                "SELECT {PRODUCT_COLUMNS} FROM products \
                 WHERE storefront_id = ?1 AND is_active ORDER BY position, id"
            )
        } else {
            format!(
                "SELECT {PRODUCT_COLUMNS} FROM products \
                 WHERE storefront_id = ?1 ORDER BY position, id"
            )
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(duckdb::params![storefront_id], product_from_row)?;

        let mut products = Vec::new();
        for row in rows {
            products.push(row?);
        }
        Ok(products)
    }

    pub async fn get_product(&self, storefront_id: &str, id: &str) -> Result<Option<Product>> {
        let conn = self.conn.lock().await;
        select_product(&conn, storefront_id, id)
    }

    /// Look up a product without tenant scoping. Used by the public click-through.
    pub async fn find_product(&self, id: &str) -> Result<Option<Product>> {
        let conn = self.conn.lock().await;
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = conn
            .prepare(&sql)?
            .query_row(duckdb::params![id], product_from_row)
            .ok();
        Ok(product)
    }

    pub async fn update_product(
        &self,
        storefront_id: &str,
        id: &str,
        params: UpdateProductParams,
    ) -> Result<Option<Product>> {
        let conn = self.conn.lock().await;
        if select_product(&conn, storefront_id, id)?.is_none() {
            return Ok(None);
        }

        if let Some(ref title) = params.title {
            conn.execute(
                "UPDATE products SET title = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                duckdb::params![title, id],
            )?;
        }
        if let Some(ref affiliate_url) = params.affiliate_url {
            conn.execute(
                "UPDATE products SET affiliate_url = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                duckdb::params![affiliate_url, id],
            )?;
        }
        if let Some(ref description) = params.description {
            conn.execute(
                "UPDATE products SET description = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                duckdb::params![description, id],
            )?;
        }
        if let Some(ref price) = params.price {
            conn.execute(
                "UPDATE products SET price = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                duckdb::params![price, id],
            )?;
        }
        if let Some(ref image_url) = params.image_url {
            conn.execute(
                "UPDATE products SET image_url = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                duckdb::params![image_url, id],
            )?;
        }
        if let Some(is_active) = params.is_active {
            conn.execute(
                "UPDATE products SET is_active = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                duckdb::params![is_active, id],
            )?;
        }

        select_product(&conn, storefront_id, id)
    }

    /// Delete a product and its collection memberships. Clicks are kept.
    pub async fn delete_product(&self, storefront_id: &str, id: &str) -> Result<bool> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let exists: i64 = tx
            .prepare("SELECT COUNT(*) FROM products WHERE id = ?1 AND storefront_id = ?2")?
            .query_row(duckdb::params![id, storefront_id], |row| row.get(0))?;
        if exists == 0 {
            return Ok(false);
        }

        tx.execute(
            "DELETE FROM collection_products WHERE product_id = ?1",
            duckdb::params![id],
        )?;
        tx.execute("DELETE FROM products WHERE id = ?1", duckdb::params![id])?;
        tx.commit()?;
        Ok(true)
    }

    /// Reassign positions `0..n` following `ids`.
    ///
    /// Returns `false` without changing anything unless `ids` is exactly the
    /// storefront's product set (no duplicates, nothing missing).
    pub async fn reorder_products(&self, storefront_id: &str, ids: &[String]) -> Result<bool> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let existing: HashSet<String> = {
            let mut stmt = tx.prepare("SELECT id FROM products WHERE storefront_id = ?1")?;
            let rows = stmt.query_map(duckdb::params![storefront_id], |row| row.get(0))?;
            let mut set = HashSet::new();
            for row in rows {
                set.insert(row?);
            }
            set
        };
        let requested: HashSet<&String> = ids.iter().collect();
        if requested.len() != ids.len()
            || ids.len() != existing.len()
            || !ids.iter().all(|id| existing.contains(id))
        {
            return Ok(false);
        }

        for (position, id) in ids.iter().enumerate() {
            tx.execute(
                "UPDATE products SET position = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                duckdb::params![position as i64, id],
            )?;
        }
        tx.commit()?;
        Ok(true)
    }
}
