//! obs_exporter: serves OBS stats and stream status as Prometheus text on /metrics.

use std::env;
use std::process::ExitCode;

use anyhow::Context;
use obs_exporter::config::{parse_args, Config};
use obs_exporter::handler::router;
use obs_exporter::state::AppState;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = match parse_args(env::args()) {
        Ok(v) => v,
        Err((msg, help)) => {
            eprintln!("{msg}");
            return if help { ExitCode::SUCCESS } else { ExitCode::from(2) };
        }
    };

    // .env first so RUST_LOG can come from it; real env vars win.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "obs_exporter=info".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let config = match args.port {
        Some(port) => config.with_listen_port(port),
        None => config,
    };

    match serve(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = config.listen_addr;
    info!(obs = ?config.obs, "exporting OBS metrics at http://{addr}/metrics");

    let app = router(AppState::new(config));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app).await.context("http server")?;
    Ok(())
}
