use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use briklyst_server::state::AppState;

/// `briklyst health`: liveness probe for container health checks.
///
/// Calls `GET http://localhost:$BRIKLYST_PORT/health`.
/// Exits 0 if the server responds with HTTP 200, exits 1 otherwise.
fn run_health_check() -> ! {
    let port = std::env::var("BRIKLYST_PORT").unwrap_or_else(|_| "3000".to_string());
    let url = format!("http://localhost:{}/health", port);
    match ureq::get(&url).call() {
        Ok(resp) if resp.status() == 200 => std::process::exit(0),
        _ => std::process::exit(1),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(|s| s.as_str()) == Some("health") {
        run_health_check();
    }

    // Structured JSON logging. Level controlled via RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("briklyst=info".parse()?),
        )
        .json()
        .init();

    let cfg = briklyst_core::config::Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    std::fs::create_dir_all(&cfg.data_dir)?;
    let db_path = format!("{}/briklyst.db", cfg.data_dir);

    // Creates tables and seeds settings and built-in templates.
    let db = briklyst_duckdb::DuckDbBackend::open(&db_path, &cfg.duckdb_memory_limit)?;

    match db.ensure_jwt_secret().await {
        Ok(_) => info!("JWT secret ready"),
        Err(e) => tracing::error!(error = %e, "Failed to ensure JWT secret"),
    }

    let state = Arc::new(AppState::new(db, cfg.clone()));

    {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            state.run_buffer_flush_loop().await;
        });
    }

    let addr = format!("0.0.0.0:{}", cfg.port);
    let app = briklyst_server::app::build_app(Arc::clone(&state));

    info!(port = cfg.port, public_url = %cfg.public_url, "Briklyst listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let state_for_shutdown = Arc::clone(&state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    // Write out clicks still sitting in the buffer.
    tokio::time::timeout(
        std::time::Duration::from_secs(5),
        state_for_shutdown.flush_buffer(),
    )
    .await
    .ok();

    Ok(())
}
