use std::collections::HashSet;

use anyhow::Result;
use duckdb::Connection;
use serde::Serialize;

use crate::backend::generate_id;
use crate::DuckDbBackend;

#[derive(Debug, Clone, Serialize)]
pub struct Collection {
    pub id: String,
    pub storefront_id: String,
    pub title: String,
    pub description: Option<String>,
    pub position: i64,
    /// Member products in collection order.
    pub product_ids: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct CreateCollectionParams {
    pub title: String,
    pub description: Option<String>,
}

#[derive(Default)]
pub struct UpdateCollectionParams {
    pub title: Option<String>,
    pub description: Option<String>,
    pub position: Option<i64>,
}

#[derive(Debug)]
pub enum MembershipOutcome {
    Updated(Collection),
    NotFound,
    /// A product id that does not belong to the storefront.
    UnknownProduct(String),
}

const COLLECTION_COLUMNS: &str = "id, storefront_id, title, description, position, \
     CAST(created_at AS VARCHAR), CAST(updated_at AS VARCHAR)";

fn collection_from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Collection> {
    Ok(Collection {
        id: row.get(0)?,
        storefront_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        position: row.get(4)?,
        product_ids: Vec::new(),
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn member_ids(conn: &Connection, collection_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT product_id FROM collection_products WHERE collection_id = ?1 \
         ORDER BY position, product_id",
    )?;
    let rows = stmt.query_map(duckdb::params![collection_id], |row| row.get(0))?;
    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

fn select_collection(
    conn: &Connection,
    storefront_id: &str,
    id: &str,
) -> Result<Option<Collection>> {
    let sql = format!(
        "SELECT {COLLECTION_COLUMNS} FROM collections WHERE id = ?1 AND storefront_id = ?2"
    );
    let collection = conn
        .prepare(&sql)?
        .query_row(duckdb::params![id, storefront_id], collection_from_row)
        .ok();
    match collection {
        Some(mut collection) => {
            collection.product_ids = member_ids(conn, &collection.id)?;
            Ok(Some(collection))
        }
        None => Ok(None),
    }
}

impl DuckDbBackend {
    pub async fn create_collection(
        &self,
        storefront_id: &str,
        params: CreateCollectionParams,
    ) -> Result<Collection> {
        let conn = self.conn.lock().await;
        let next_position: i64 = conn
            .prepare(
                "SELECT COALESCE(MAX(position) + 1, 0) FROM collections WHERE storefront_id = ?1",
            )?
            .query_row(duckdb::params![storefront_id], |row| row.get(0))?;

        let id = generate_id("col");
        conn.execute(
            "INSERT INTO collections (id, storefront_id, title, description, position, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)",
            duckdb::params![id, storefront_id, params.title, params.description, next_position],
        )?;

        select_collection(&conn, storefront_id, &id)?
            .ok_or_else(|| anyhow::anyhow!("collection {id} vanished after insert"))
    }

    pub async fn list_collections(&self, storefront_id: &str) -> Result<Vec<Collection>> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {COLLECTION_COLUMNS} FROM collections WHERE storefront_id = ?1 \
             ORDER BY position, id"
        );
        let mut collections = Vec::new();
        {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(duckdb::params![storefront_id], collection_from_row)?;
            for row in rows {
                collections.push(row?);
            }
        }
        for collection in &mut collections {
            collection.product_ids = member_ids(&conn, &collection.id)?;
        }
        Ok(collections)
    }

    pub async fn get_collection(&self, storefront_id: &str, id: &str) -> Result<Option<Collection>> {
        let conn = self.conn.lock().await;
        select_collection(&conn, storefront_id, id)
    }

    pub async fn update_collection(
        &self,
        storefront_id: &str,
        id: &str,
        params: UpdateCollectionParams,
    ) -> Result<Option<Collection>> {
        let conn = self.conn.lock().await;
        if select_collection(&conn, storefront_id, id)?.is_none() {
            return Ok(None);
        }

        if let Some(ref title) = params.title {
            conn.execute(
                "UPDATE collections SET title = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                duckdb::params![title, id],
            )?;
        }
        if let Some(ref description) = params.description {
            conn.execute(
                "UPDATE collections SET description = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                duckdb::params![description, id],
            )?;
        }
        if let Some(position) = params.position {
            conn.execute(
                "UPDATE collections SET position = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                duckdb::params![position, id],
            )?;
        }

        select_collection(&conn, storefront_id, id)
    }

    /// Delete a collection and its membership rows. Products are untouched.
    pub async fn delete_collection(&self, storefront_id: &str, id: &str) -> Result<bool> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let exists: i64 = tx
            .prepare("SELECT COUNT(*) FROM collections WHERE id = ?1 AND storefront_id = ?2")?
            .query_row(duckdb::params![id, storefront_id], |row| row.get(0))?;
        if exists == 0 {
            return Ok(false);
        }

        tx.execute(
            "DELETE FROM collection_products WHERE collection_id = ?1",
            duckdb::params![id],
        )?;
        tx.execute("DELETE FROM collections WHERE id = ?1", duckdb::params![id])?;
        tx.commit()?;
        Ok(true)
    }

    /// Replace the collection's members with `product_ids`, in that order.
    /// Duplicate ids keep their first position.
    pub async fn set_collection_products(
        &self,
        storefront_id: &str,
        id: &str,
        product_ids: &[String],
    ) -> Result<MembershipOutcome> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let exists: i64 = tx
            .prepare("SELECT COUNT(*) FROM collections WHERE id = ?1 AND storefront_id = ?2")?
            .query_row(duckdb::params![id, storefront_id], |row| row.get(0))?;
        if exists == 0 {
            return Ok(MembershipOutcome::NotFound);
        }

        let owned: HashSet<String> = {
            let mut stmt = tx.prepare("SELECT id FROM products WHERE storefront_id = ?1")?;
            let rows = stmt.query_map(duckdb::params![storefront_id], |row| row.get(0))?;
            let mut set = HashSet::new();
            for row in rows {
                set.insert(row?);
            }
            set
        };
        if let Some(unknown) = product_ids.iter().find(|pid| !owned.contains(*pid)) {
            return Ok(MembershipOutcome::UnknownProduct(unknown.clone()));
        }

        tx.execute(
            "DELETE FROM collection_products WHERE collection_id = ?1",
            duckdb::params![id],
        )?;
        let mut seen = HashSet::new();
        for product_id in product_ids {
            if !seen.insert(product_id) {
                continue;
            }
            tx.execute(
                "INSERT INTO collection_products (collection_id, product_id, position) \
                 VALUES (?1, ?2, ?3)",
                duckdb::params![id, product_id, (seen.len() - 1) as i64],
            )?;
        }
        tx.execute(
            "UPDATE collections SET updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
            duckdb::params![id],
        )?;
        tx.commit()?;

        match select_collection(&conn, storefront_id, id)? {
            Some(collection) => Ok(MembershipOutcome::Updated(collection)),
            None => Ok(MembershipOutcome::NotFound),
        }
    }
}
