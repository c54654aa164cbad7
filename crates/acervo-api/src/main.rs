//! acervo HTTP API server.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use acervo_api::{build_rate_limiter, build_router, AppState};
use acervo_core::defaults;
use acervo_db::{Database, PoolConfig};
use acervo_inference::GeminiBackend;
use acervo_ingest::{
    media_store_from_env, LinkIngestor, MediaAttacher, PandocExtractor, SubmissionProcessor,
};

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logging:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file, rotated daily
    //   LOG_ANSI    - "true"/"false" override ANSI colors
    //   RUST_LOG    - env filter (default: "acervo_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "acervo_api=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    let _file_guard = if let Some(ref path) = log_file {
        let path = std::path::Path::new(path);
        let file_dir = path.parent().unwrap_or(std::path::Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("acervo-api.log");
        let (writer, guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::daily(file_dir, file_name));

        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| defaults::DATABASE_URL.to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| defaults::SERVER_HOST.to_string());
    let port: u16 = env_or("PORT", defaults::SERVER_PORT);

    let rate_limit_requests: u64 = env_or("RATE_LIMIT_REQUESTS", defaults::RATE_LIMIT_REQUESTS);
    let rate_limit_period_secs: u64 =
        env_or("RATE_LIMIT_PERIOD_SECS", defaults::RATE_LIMIT_PERIOD_SECS);
    let rate_limit_enabled = std::env::var("RATE_LIMIT_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);
    info!(
        enabled = rate_limit_enabled,
        requests = rate_limit_requests,
        period_secs = rate_limit_period_secs,
        "Rate limiting configured"
    );
    let token_ttl_hours: i64 = env_or(defaults::ENV_TOKEN_TTL_HOURS, defaults::TOKEN_TTL_HOURS);

    info!("Connecting to database...");
    let db = Database::connect_with_config(&database_url, PoolConfig::from_env()).await?;
    info!("Running database migrations...");
    db.migrate().await?;
    db.ping().await?;
    info!("Database ready");

    // One client serves generation, image generation and the file API.
    let gemini = Arc::new(GeminiBackend::from_env()?);
    let store = media_store_from_env()?;
    let links = LinkIngestor::from_env(gemini.clone(), gemini.clone())?;
    info!(strategies = ?links.strategy_names(), "Link ingestion ready");
    let submissions = SubmissionProcessor::new(
        MediaAttacher::new(gemini.clone(), Arc::new(PandocExtractor::new())),
        gemini.clone(),
        store,
        gemini.clone(),
    );

    let rate_limiter = if rate_limit_enabled {
        build_rate_limiter(rate_limit_requests, rate_limit_period_secs)
    } else {
        None
    };
    let state = AppState::new(db, gemini, Arc::new(links), Arc::new(submissions))
        .with_rate_limiter(rate_limiter)
        .with_token_ttl(chrono::Duration::hours(token_ttl_hours));

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
