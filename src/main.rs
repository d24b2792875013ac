//! Chat Relay - Main entry point
//!
//! This binary creates and runs the HTTP server with all configured routes and middleware.
//! Configuration is loaded once from the environment (and `.env`).

use anyhow::{Context, Result};
use chat_relay::{
    api::{build_router, create_http_client, AppState, OpenAiUpstream},
    core::{init_metrics, AppConfig},
};
use chrono::Local;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Load .env file if present (before reading any environment variables)
    dotenvy::dotenv().ok();

    // Detect optimal worker threads from environment or cgroup
    let worker_threads = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or_else(|| detect_cpu_limit().unwrap_or(1));

    println!("Tokio runtime: using {} worker threads", worker_threads);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

/// Custom time formatter that uses local timezone (respects TZ environment variable)
struct LocalTime;

impl tracing_subscriber::fmt::time::FormatTime for LocalTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%d %H:%M:%S"))
    }
}

fn init_tracing() {
    // NO_COLOR disables ANSI codes (for file logging)
    let no_color = std::env::var("NO_COLOR").is_ok();

    // Noise suppression is appended even when RUST_LOG is set, otherwise
    // RUST_LOG=trace floods the output with hyper/h2 frame logs.
    let base_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,chat_relay=debug".to_string());
    let filter = tracing_subscriber::EnvFilter::new(format!(
        "{},hyper=warn,hyper::proto=warn,h2=warn,reqwest=warn",
        base_filter
    ));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(LocalTime)
                .with_ansi(!no_color),
        )
        .init();
}

async fn async_main() -> Result<()> {
    init_tracing();
    init_metrics();

    let config = Arc::new(AppConfig::from_env().context("Failed to load configuration")?);
    log_environment(&config);

    let http_client =
        create_http_client(&config.upstream).context("Failed to build HTTP client")?;
    let upstream = Arc::new(OpenAiUpstream::new(
        http_client,
        config.upstream.base_url.clone(),
    ));

    let app = build_router(AppState::new(config.clone(), upstream));

    let listener = tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port))
        .await
        .with_context(|| {
            format!(
                "Failed to bind {}:{}",
                config.server.host, config.server.port
            )
        })?;

    tracing::info!("Starting chat relay on {}", listener.local_addr()?);
    tracing::info!("Chat endpoint: POST /api/chat");
    tracing::info!("Health endpoint: GET /api/health");
    tracing::info!("Metrics endpoint: /metrics");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Report what the relay will run with. The credential value is never logged.
fn log_environment(config: &AppConfig) {
    if config.upstream.credential().is_some() {
        tracing::info!("AI_GATEWAY_API_KEY: set");
    } else {
        tracing::warn!("AI_GATEWAY_API_KEY: missing, chat requests will fail with 500");
    }

    if config.has_custom_model() {
        tracing::info!("AI_MODEL: {}", config.models.default_model);
    } else {
        tracing::info!("AI_MODEL: not set, using default {}", config.models.default_model);
    }

    tracing::info!(
        base_url = %config.upstream.base_url,
        fallback_model = %config.models.fallback_model,
        deny_pattern = %config.models.deny_pattern,
        stream_protocol = ?config.stream_protocol,
        "Upstream configuration"
    );
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
}

/// Detect CPU limit from cgroup (for containerized environments)
fn detect_cpu_limit() -> Option<usize> {
    // cgroup v2
    if let Ok(max) = std::fs::read_to_string("/sys/fs/cgroup/cpu.max") {
        let parts: Vec<&str> = max.split_whitespace().collect();
        if parts.len() == 2 {
            if let (Ok(quota), Ok(period)) = (parts[0].parse::<i64>(), parts[1].parse::<i64>()) {
                if quota > 0 {
                    let cores = ((quota as f64 / period as f64).ceil() as usize).max(1);
                    println!("Detected CPU limit from cgroup v2: {} cores", cores);
                    return Some(cores);
                }
            }
        }
    }

    // cgroup v1
    let quota = std::fs::read_to_string("/sys/fs/cgroup/cpu/cpu.cfs_quota_us")
        .ok()?
        .trim()
        .parse::<i64>()
        .ok()?;

    let period = std::fs::read_to_string("/sys/fs/cgroup/cpu/cpu.cfs_period_us")
        .ok()?
        .trim()
        .parse::<i64>()
        .ok()?;

    if quota > 0 {
        let cores = ((quota as f64 / period as f64).ceil() as usize).max(1);
        println!("Detected CPU limit from cgroup v1: {} cores", cores);
        Some(cores)
    } else {
        None
    }
}
