use anyhow::Result;
use duckdb::Connection;
use serde::Serialize;

use briklyst_core::storefront::{Section, Theme};

use crate::backend::generate_id;
use crate::DuckDbBackend;

#[derive(Debug, Clone, Serialize)]
pub struct Storefront {
    pub id: String,
    pub user_id: String,
    pub slug: String,
    pub title: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub theme: Theme,
    pub sections: Vec<Section>,
    pub template_id: Option<String>,
    pub published: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub struct CreateStorefrontParams {
    pub user_id: String,
    pub slug: String,
    pub title: String,
    pub bio: Option<String>,
    pub theme: Theme,
    pub sections: Vec<Section>,
    pub template_id: Option<String>,
}

#[derive(Default)]
pub struct UpdateStorefrontParams {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub theme: Option<Theme>,
    pub sections: Option<Vec<Section>>,
    pub template_id: Option<String>,
    pub published: Option<bool>,
}

/// Result of a storefront write that can hit a uniqueness rule.
#[derive(Debug)]
pub enum SaveOutcome<T> {
    Saved(T),
    NotFound,
    /// The user already owns a storefront.
    AlreadyExists,
    SlugTaken,
}

const STOREFRONT_COLUMNS: &str = "id, user_id, slug, title, bio, avatar_url, theme, sections, \
     template_id, published, CAST(created_at AS VARCHAR), CAST(updated_at AS VARCHAR)";

struct StorefrontRow {
    id: String,
    user_id: String,
    slug: String,
    title: String,
    bio: Option<String>,
    avatar_url: Option<String>,
    theme: String,
    sections: String,
    template_id: Option<String>,
    published: bool,
    created_at: String,
    updated_at: String,
}

impl StorefrontRow {
    fn from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            slug: row.get(2)?,
            title: row.get(3)?,
            bio: row.get(4)?,
            avatar_url: row.get(5)?,
            theme: row.get(6)?,
            sections: row.get(7)?,
            template_id: row.get(8)?,
            published: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    fn into_storefront(self) -> Result<Storefront> {
        Ok(Storefront {
            id: self.id,
            user_id: self.user_id,
            slug: self.slug,
            title: self.title,
            bio: self.bio,
            avatar_url: self.avatar_url,
            theme: serde_json::from_str(&self.theme)?,
            sections: serde_json::from_str(&self.sections)?,
            template_id: self.template_id,
            published: self.published,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn select_one(conn: &Connection, column: &str, value: &str) -> Result<Option<Storefront>> {
    let sql = format!("SELECT {STOREFRONT_COLUMNS} FROM storefronts WHERE {column} = ?1");
    let row = conn
        .prepare(&sql)?
        .query_row(duckdb::params![value], StorefrontRow::from_row)
        .ok();
    row.map(StorefrontRow::into_storefront).transpose()
}

fn slug_taken(conn: &Connection, slug: &str, except_id: Option<&str>) -> Result<bool> {
    let count: i64 = conn
        .prepare("SELECT COUNT(*) FROM storefronts WHERE slug = ?1 AND id <> ?2")?
        .query_row(duckdb::params![slug, except_id.unwrap_or("")], |row| {
            row.get(0)
        })?;
    Ok(count > 0)
}

impl DuckDbBackend {
    pub async fn create_storefront(
        &self,
        params: CreateStorefrontParams,
    ) -> Result<SaveOutcome<Storefront>> {
        let conn = self.conn.lock().await;

        let owned: i64 = conn
            .prepare("SELECT COUNT(*) FROM storefronts WHERE user_id = ?1")?
            .query_row(duckdb::params![params.user_id], |row| row.get(0))?;
        if owned > 0 {
            return Ok(SaveOutcome::AlreadyExists);
        }
        if slug_taken(&conn, &params.slug, None)? {
            return Ok(SaveOutcome::SlugTaken);
        }

        let id = generate_id("sf");
        conn.execute(
            "INSERT INTO storefronts (id, user_id, slug, title, bio, avatar_url, theme, sections, \
             template_id, published, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?7, ?8, true, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)",
            duckdb::params![
                id,
                params.user_id,
                params.slug,
                params.title,
                params.bio,
                serde_json::to_string(&params.theme)?,
                serde_json::to_string(&params.sections)?,
                params.template_id,
            ],
        )?;

        match select_one(&conn, "id", &id)? {
            Some(storefront) => Ok(SaveOutcome::Saved(storefront)),
            None => Ok(SaveOutcome::NotFound),
        }
    }

    pub async fn get_storefront(&self, id: &str) -> Result<Option<Storefront>> {
        let conn = self.conn.lock().await;
        select_one(&conn, "id", id)
    }

    /// The storefront owned by `user_id`, if the tenant has created one.
    pub async fn get_storefront_for_user(&self, user_id: &str) -> Result<Option<Storefront>> {
        let conn = self.conn.lock().await;
        select_one(&conn, "user_id", user_id)
    }

    pub async fn get_storefront_by_slug(&self, slug: &str) -> Result<Option<Storefront>> {
        let conn = self.conn.lock().await;
        select_one(&conn, "slug", slug)
    }

    pub async fn update_storefront(
        &self,
        id: &str,
        params: UpdateStorefrontParams,
    ) -> Result<SaveOutcome<Storefront>> {
        let conn = self.conn.lock().await;

        let exists: i64 = conn
            .prepare("SELECT COUNT(*) FROM storefronts WHERE id = ?1")?
            .query_row(duckdb::params![id], |row| row.get(0))?;
        if exists == 0 {
            return Ok(SaveOutcome::NotFound);
        }

        if let Some(ref slug) = params.slug {
            if slug_taken(&conn, slug, Some(id))? {
                return Ok(SaveOutcome::SlugTaken);
            }
            conn.execute(
                "UPDATE storefronts SET slug = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                duckdb::params![slug, id],
            )?;
        }
        if let Some(ref title) = params.title {
            conn.execute(
                "UPDATE storefronts SET title = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                duckdb::params![title, id],
            )?;
        }
        if let Some(ref bio) = params.bio {
            conn.execute(
                "UPDATE storefronts SET bio = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                duckdb::params![bio, id],
            )?;
        }
        if let Some(ref avatar_url) = params.avatar_url {
            conn.execute(
                "UPDATE storefronts SET avatar_url = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                duckdb::params![avatar_url, id],
            )?;
        }
        if let Some(ref theme) = params.theme {
            conn.execute(
                "UPDATE storefronts SET theme = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                duckdb::params![serde_json::to_string(theme)?, id],
            )?;
        }
        if let Some(ref sections) = params.sections {
            conn.execute(
                "UPDATE storefronts SET sections = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                duckdb::params![serde_json::to_string(sections)?, id],
            )?;
        }
        if let Some(ref template_id) = params.template_id {
            conn.execute(
                "UPDATE storefronts SET template_id = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                duckdb::params![template_id, id],
            )?;
        }
        if let Some(published) = params.published {
            conn.execute(
                "UPDATE storefronts SET published = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                duckdb::params![published, id],
            )?;
        }

        match select_one(&conn, "id", id)? {
            Some(storefront) => Ok(SaveOutcome::Saved(storefront)),
            None => Ok(SaveOutcome::NotFound),
        }
    }
}
