use anyhow::Result;
use serde::Serialize;

use crate::backend::{generate_id, rand_hex};
use crate::DuckDbBackend;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub created_at: String,
}

/// A user row together with its password hash, for login only.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

impl DuckDbBackend {
    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        let result = conn
            .prepare("SELECT value FROM settings WHERE key = ?1")?
            .query_row(duckdb::params![key], |row| row.get::<_, String>(0))
            .ok();
        Ok(result)
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
            duckdb::params![key, value],
        )?;
        Ok(())
    }

    /// Ensure a JWT secret exists in settings. If not, generate one.
    /// Returns the JWT secret.
    pub async fn ensure_jwt_secret(&self) -> Result<String> {
        if let Some(secret) = self.get_setting("jwt_secret").await? {
            return Ok(secret);
        }
        let secret = rand_hex(32);
        self.set_setting("jwt_secret", &secret).await?;
        Ok(secret)
    }

    /// Create a user. Returns `None` when the (already normalised) email is taken.
    pub async fn create_user(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
    ) -> Result<Option<User>> {
        let conn = self.conn.lock().await;

        let taken: i64 = conn
            .prepare("SELECT COUNT(*) FROM users WHERE email = ?1")?
            .query_row(duckdb::params![email], |row| row.get(0))?;
        if taken > 0 {
            return Ok(None);
        }

        let id = generate_id("usr");
        conn.execute(
            "INSERT INTO users (id, email, name, password_hash, created_at) \
             VALUES (?1, ?2, ?3, ?4, CURRENT_TIMESTAMP)",
            duckdb::params![id, email, name, password_hash],
        )?;

        let user = conn
            .prepare(
                "SELECT id, email, name, CAST(created_at AS VARCHAR) FROM users WHERE id = ?1",
            )?
            .query_row(duckdb::params![id], |row| {
                Ok(User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    name: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?;
        Ok(Some(user))
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().await;
        let user = conn
            .prepare(
                "SELECT id, email, name, CAST(created_at AS VARCHAR) FROM users WHERE id = ?1",
            )?
            .query_row(duckdb::params![id], |row| {
                Ok(User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    name: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })
            .ok();
        Ok(user)
    }

    pub async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>> {
        let conn = self.conn.lock().await;
        let creds = conn
            .prepare(
                "SELECT id, email, name, CAST(created_at AS VARCHAR), password_hash \
                 FROM users WHERE email = ?1",
            )?
            .query_row(duckdb::params![email], |row| {
                Ok(UserCredentials {
                    user: User {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        name: row.get(2)?,
                        created_at: row.get(3)?,
                    },
                    password_hash: row.get(4)?,
                })
            })
            .ok();
        Ok(creds)
    }

    /// Record a login attempt for rate limiting.
    pub async fn record_login_attempt(&self, email: &str, succeeded: bool) -> Result<()> {
        let id = rand_hex(5);
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO login_attempts (id, email, attempted_at, succeeded) \
             VALUES (?1, ?2, CURRENT_TIMESTAMP, ?3)",
            duckdb::params![id, email, succeeded],
        )?;
        Ok(())
    }

    /// Returns `true` if another attempt is allowed (fewer than 5 failures for
    /// this email in the last 15 minutes).
    pub async fn check_login_rate_limit(&self, email: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let count: i64 = conn
            .prepare(
                "SELECT COUNT(*) FROM login_attempts \
                 WHERE email = ?1 \
                 AND attempted_at > CAST(NOW() AS TIMESTAMP) - INTERVAL '15 minutes' \
                 AND succeeded = false",
            )?
            .query_row(duckdb::params![email], |row| row.get(0))?;
        Ok(count < 5)
    }
}
