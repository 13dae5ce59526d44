use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{error, info};

use briklyst_core::config::Config;
use briklyst_duckdb::clicks::ClickRecord;
use briklyst_duckdb::storefront::Storefront;
use briklyst_duckdb::DuckDbBackend;

use crate::error::AppError;

const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Tracked IPs above which idle windows are swept on the next check.
const RATE_LIMITER_SWEEP_THRESHOLD: usize = 10_000;

/// Consecutive failed flushes before the pending batch is dropped.
const MAX_FLUSH_ATTEMPTS: u32 = 3;

/// A requeued buffer keeps at most `buffer_max_size * REQUEUE_FACTOR` clicks.
const REQUEUE_FACTOR: usize = 10;

/// Shared application state injected into every Axum handler via
/// [`axum::extract::State`].
pub struct AppState {
    /// The DuckDB backend. Internally uses `Arc<tokio::sync::Mutex<Connection>>`.
    pub db: Arc<DuckDbBackend>,

    /// Parsed configuration, loaded once at startup from environment variables.
    pub config: Arc<Config>,

    /// Clicks recorded by `/go/{product_id}` that are not yet in DuckDB.
    ///
    /// Lock, drain, release, then write. The lock is held only long enough to
    /// `std::mem::take` the buffer so a slow insert does not block redirects.
    pub buffer: Arc<Mutex<Vec<ClickRecord>>>,

    /// Per-IP sliding-window rate limiter for the public click-through.
    ///
    /// Key: IP address string. Value: request timestamps within the last 60s.
    rate_limiter: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,

    /// Failed flushes in a row; reset by a successful write.
    flush_failures: AtomicU32,
}

impl AppState {
    pub fn new(db: DuckDbBackend, config: Config) -> Self {
        Self {
            db: Arc::new(db),
            config: Arc::new(config),
            buffer: Arc::new(Mutex::new(Vec::new())),
            rate_limiter: Arc::new(Mutex::new(HashMap::new())),
            flush_failures: AtomicU32::new(0),
        }
    }

    /// Check whether `ip` is within `max` requests per 60 seconds.
    ///
    /// Returns `true` if the request should proceed. Slides the window on
    /// every call.
    pub async fn check_rate_limit(&self, ip: &str, max: usize) -> bool {
        let mut map = self.rate_limiter.lock().await;
        let now = Instant::now();
        if map.len() >= RATE_LIMITER_SWEEP_THRESHOLD {
            sweep_idle_windows(&mut map, now);
        }
        let window = map.entry(ip.to_string()).or_default();
        while window
            .front()
            .is_some_and(|t| now.duration_since(*t) >= RATE_LIMIT_WINDOW)
        {
            window.pop_front();
        }
        if window.len() >= max {
            return false;
        }
        window.push_back(now);
        true
    }

    /// Forget IPs with no request inside the current window.
    pub async fn prune_rate_limiter(&self) {
        let mut map = self.rate_limiter.lock().await;
        sweep_idle_windows(&mut map, Instant::now());
    }

    /// Resolve the storefront owned by `user_id`.
    pub async fn tenant_storefront(&self, user_id: &str) -> Result<Storefront, AppError> {
        self.db
            .get_storefront_for_user(user_id)
            .await
            .map_err(AppError::Internal)?
            .ok_or_else(|| AppError::NotFound("Storefront not found".to_string()))
    }

    /// Append `clicks` to the in-memory buffer.
    ///
    /// Flushes immediately once the buffer holds `config.buffer_max_size`
    /// clicks instead of waiting for the next tick.
    pub async fn push_clicks(&self, clicks: Vec<ClickRecord>) {
        let should_flush = {
            let mut buf = self.buffer.lock().await;
            buf.extend(clicks);
            buf.len() >= self.config.buffer_max_size
        };

        if should_flush {
            self.flush_buffer().await;
        }
    }

    /// Drain the buffer and write all pending clicks to DuckDB.
    ///
    /// A failed batch is put back at the front of the buffer for the next
    /// flush, trimmed to `buffer_max_size * REQUEUE_FACTOR` clicks (oldest
    /// dropped first). After `MAX_FLUSH_ATTEMPTS` failures in a row the
    /// batch is dropped so a bad row cannot block later clicks forever.
    pub async fn flush_buffer(&self) {
        let batch: Vec<ClickRecord> = {
            let mut buf = self.buffer.lock().await;
            std::mem::take(&mut *buf)
        };

        if batch.is_empty() {
            return;
        }

        match self.db.insert_clicks(&batch).await {
            Ok(()) => {
                self.flush_failures.store(0, Ordering::Relaxed);
                info!(count = batch.len(), "Click buffer flushed to DuckDB");
            }
            Err(e) => {
                let attempts = self.flush_failures.fetch_add(1, Ordering::Relaxed) + 1;
                if attempts >= MAX_FLUSH_ATTEMPTS {
                    self.flush_failures.store(0, Ordering::Relaxed);
                    error!(
                        count = batch.len(),
                        attempts,
                        error = %e,
                        "Click buffer flush failed repeatedly, dropping batch"
                    );
                    return;
                }

                error!(count = batch.len(), attempts, error = %e, "Click buffer flush failed, requeueing");
                let cap = self.config.buffer_max_size.max(1).saturating_mul(REQUEUE_FACTOR);
                let mut buf = self.buffer.lock().await;
                let newer = std::mem::replace(&mut *buf, batch);
                buf.extend(newer);
                if buf.len() > cap {
                    let dropped = buf.len() - cap;
                    buf.drain(..dropped);
                    error!(dropped, cap, "Click buffer over capacity, dropped oldest clicks");
                }
            }
        }
    }

    /// Background loop: flush the buffer on a fixed interval and sweep idle
    /// rate-limiter entries.
    ///
    /// Spawned in `main.rs`; interval comes from `config.buffer_flush_interval_ms`.
    pub async fn run_buffer_flush_loop(self: Arc<Self>) {
        let interval = self.config.buffer_flush_interval();
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            self.flush_buffer().await;
            self.prune_rate_limiter().await;
        }
    }
}

fn sweep_idle_windows(map: &mut HashMap<String, VecDeque<Instant>>, now: Instant) {
    let before = map.len();
    map.retain(|_, window| {
        window
            .back()
            .is_some_and(|t| now.duration_since(*t) < RATE_LIMIT_WINDOW)
    });
    let removed = before - map.len();
    if removed > 0 {
        info!(removed, remaining = map.len(), "Swept idle rate-limit windows");
    }
}
