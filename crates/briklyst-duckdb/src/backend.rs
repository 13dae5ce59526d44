use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::Connection;
use tokio::sync::Mutex;
use tracing::info;

use crate::schema::init_sql;
use crate::template::seed_templates_sync;

/// Generate a cryptographically random hex string of `n` bytes (2n hex chars).
pub(crate) fn rand_hex(n: usize) -> String {
    use rand::RngCore;
    let mut buf = vec![0u8; n];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Generate a row ID: `prefix` + "_" + 10 random lowercase alphanumeric chars.
pub(crate) fn generate_id(prefix: &str) -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let chars: String = (0..10)
        .map(|_| {
            let idx = rng.gen_range(0..36);
            if idx < 10 {
                (b'0' + idx) as char
            } else {
                (b'a' + idx - 10) as char
            }
        })
        .collect();
    format!("{prefix}_{chars}")
}

/// Format a UTC timestamp the way DuckDB parses a plain `TIMESTAMP` literal.
pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Parse the output of `CAST(<timestamp> AS VARCHAR)` back into UTC.
pub(crate) fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| anyhow!("unparseable timestamp '{raw}': {e}"))
}

/// The DuckDB backend for Briklyst.
///
/// DuckDB is single-writer, so the connection is wrapped in
/// `Arc<Mutex<_>>`: every query runs under the lock, which also makes
/// check-then-write sequences inside one method atomic.
///
/// Memory and thread limits are enforced by [`init_sql`] at open time.
pub struct DuckDbBackend {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl DuckDbBackend {
    /// Open (or create) a DuckDB database file at `path`.
    ///
    /// `memory_limit` is a DuckDB size string such as `"1GB"` or `"512MB"`.
    /// Creates all tables if missing, then seeds settings and the built-in
    /// storefront templates.
    pub fn open(path: &str, memory_limit: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(&conn, memory_limit)?;
        info!(
            "DuckDB opened at {} with memory_limit={}, threads=2",
            path, memory_limit
        );
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an **in-memory** DuckDB database.
    ///
    /// Intended for tests only; data is discarded when the struct is dropped.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn, "1GB")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init(conn: &Connection, memory_limit: &str) -> Result<()> {
        conn.execute_batch(&init_sql(memory_limit))?;
        conn.execute(
            "INSERT OR IGNORE INTO settings (key, value) VALUES ('version', ?1)",
            duckdb::params!["1"],
        )?;
        seed_templates_sync(conn)?;
        Ok(())
    }

    /// Execute `SELECT 1` as a lightweight liveness check for `/health`.
    pub async fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch("SELECT 1")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn generated_ids_carry_prefix() {
        let id = generate_id("prd");
        assert!(id.starts_with("prd_"));
        assert_eq!(id.len(), 14);
    }

    #[test]
    fn timestamp_format_round_trips() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 5, 10, 30, 0).unwrap();
        assert_eq!(parse_ts(&format_ts(&ts)).unwrap(), ts);
        assert_eq!(parse_ts("2024-01-05 10:30:00").unwrap(), ts);
    }
}
