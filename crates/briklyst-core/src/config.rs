#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: String,
    pub https: bool,
    pub cors_origins: Vec<String>,
    pub session_days: u32,
    pub argon2_memory_kb: u32,
    /// Base URL used to build public storefront and click-through links.
    pub public_url: String,
    /// DuckDB size string such as `"1GB"` or `"512MB"`.
    pub duckdb_memory_limit: String,
    /// Length of the analytics window used when a request omits `range`.
    pub analytics_default_days: u32,
    /// How often buffered clicks are written to DuckDB.
    pub buffer_flush_interval_ms: u64,
    /// Flush early once this many clicks are buffered.
    pub buffer_max_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            port: std::env::var("BRIKLYST_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|e| format!("invalid port: {e}"))?,
            data_dir: std::env::var("BRIKLYST_DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            https: std::env::var("BRIKLYST_HTTPS")
                .map(|v| v == "true")
                .unwrap_or(true),
            cors_origins: std::env::var("BRIKLYST_CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            session_days: std::env::var("BRIKLYST_SESSION_DAYS")
                .unwrap_or_else(|_| "7".to_string())
                .parse()
                .unwrap_or(7),
            argon2_memory_kb: std::env::var("BRIKLYST_ARGON2_MEMORY_KB")
                .unwrap_or_else(|_| "65536".to_string())
                .parse()
                .unwrap_or(65536),
            public_url: std::env::var("BRIKLYST_PUBLIC_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            duckdb_memory_limit: std::env::var("BRIKLYST_DUCKDB_MEMORY")
                .unwrap_or_else(|_| "1GB".to_string()),
            analytics_default_days: std::env::var("BRIKLYST_ANALYTICS_DEFAULT_DAYS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .ok()
                .filter(|d| *d > 0)
                .unwrap_or(30),
            buffer_flush_interval_ms: std::env::var("BRIKLYST_BUFFER_FLUSH_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .ok()
                .filter(|ms| *ms > 0)
                .unwrap_or(5000),
            buffer_max_size: std::env::var("BRIKLYST_BUFFER_MAX_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .unwrap_or(100),
        })
    }

    pub fn buffer_flush_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.buffer_flush_interval_ms)
    }
}

