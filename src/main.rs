/*!
 * MediBrief Backend - Multi-Tenant Clinical SaaS API
 *
 * Main application entry point for the Axum-based REST API server.
 *
 * Tenant-isolated clinical data service, async AI summary pipeline with
 * server-sent progress streaming, and a deterministic clinical analytics
 * engine.
 */

// Module declarations
mod config;
mod db;
mod handlers;
mod middleware;
mod models;
mod routes;
mod services;
mod utils;

use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use axum_server::tls_rustls::RustlsConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use db::{create_pool, create_redis};
use handlers::auth::AppState;
use middleware::cors::cors_layer;
use middleware::rate_limit::RateLimitLayer;
use middleware::scheme::enforce_https;
use routes::create_routes;
use services::{
    spawn_ai_workers, AiJobQueue, AiWorkerContext, AuthService, JobEventBus, LlmService,
    QuotaService, StructuredInputService,
};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
    timestamp: String,
    database: String,
    redis: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for rustls 0.23+)
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug,axum::rejection=trace,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting MediBrief Backend API Server...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");
    tracing::info!("Environment: {}", config.server.environment);

    // Warn if debug/trace logging is enabled in production
    let log_level = std::env::var("RUST_LOG").unwrap_or_default();
    if config.server.is_production()
        && (log_level.contains("debug") || log_level.contains("trace"))
    {
        tracing::warn!(
            "RUST_LOG={} in production environment — consider setting to 'info' or 'warn' \
             to avoid exposing sensitive data in logs",
            log_level
        );
    }

    // Create database connection pool
    let pool = create_pool(&config.database).await?;
    tracing::info!("Database connection pool created successfully");

    // Connect to Redis (cache, job queue, event bus)
    let (redis_client, redis_conn) = create_redis(&config.redis).await?;
    tracing::info!("Redis connection established");

    // Assemble services
    let auth_service = AuthService::new(config.jwt.clone());
    let queue = AiJobQueue::new(redis_conn.clone());
    let event_bus = JobEventBus::new(redis_conn.clone());
    let structured_input =
        StructuredInputService::new(redis_conn.clone(), config.redis.structured_input_ttl);
    let llm = LlmService::new(&config.ai);
    let quota = QuotaService::new(&config.ai);
    tracing::info!("Services initialized");

    // Record server start time
    let start_time = std::time::SystemTime::now();

    // Create application state
    let app_state = AppState {
        pool: pool.clone(),
        auth_service,
        queue: queue.clone(),
        event_bus: event_bus.clone(),
        redis_client,
        structured_input: structured_input.clone(),
        llm: llm.clone(),
        quota,
        start_time,
        environment: config.server.environment.clone(),
    };

    // Spawn the AI worker pool
    spawn_ai_workers(
        AiWorkerContext {
            pool: pool.clone(),
            queue,
            events: event_bus,
            structured_input,
            llm,
        },
        config.ai.worker_concurrency,
    );
    tracing::info!(
        "AI worker pool started with concurrency {}",
        config.ai.worker_concurrency
    );

    // Build application router
    let app = create_app(app_state, &config, start_time);

    // Start the server (HTTP or HTTPS based on TLS configuration)
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .expect("Invalid server address");

    if config.tls.is_ready() {
        let cert_path = PathBuf::from(config.tls.cert_path.clone().unwrap_or_default());
        let key_path = PathBuf::from(config.tls.key_path.clone().unwrap_or_default());

        tracing::info!("TLS enabled - loading certificates...");
        tracing::info!("  Certificate: {}", cert_path.display());
        tracing::info!("  Private key: {}", key_path.display());

        let tls_config = RustlsConfig::from_pem_file(&cert_path, &key_path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to load TLS certificates: {}", e))?;

        tracing::info!("HTTPS server listening on https://{}", addr);

        axum_server::bind_rustls(addr, tls_config)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await?;
    } else {
        if config.tls.enabled {
            tracing::warn!(
                "TLS is enabled but certificate paths are not configured. Starting HTTP server instead."
            );
        }
        tracing::info!("HTTP server listening on http://{}", addr);

        let listener = TcpListener::bind(addr).await?;
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
    }

    Ok(())
}

/// Create the Axum application router
fn create_app(state: AppState, config: &Config, start_time: std::time::SystemTime) -> Router {
    let pool_for_health = state.pool.clone();
    let redis_for_health = state.redis_client.clone();

    let rate_limit = RateLimitLayer::new(config.rate_limit.clone());

    let mut app = Router::new()
        .route(
            "/health",
            get(move || {
                health_handler(pool_for_health.clone(), redis_for_health.clone(), start_time)
            }),
        )
        .merge(create_routes(state, rate_limit))
        .layer(cors_layer(&config.server))
        .layer(TraceLayer::new_for_http());

    if config.server.https_enforce {
        app = app.layer(axum::middleware::from_fn(enforce_https));
    }

    app
}

/// Health check handler
async fn health_handler(
    pool: sqlx::PgPool,
    redis_client: redis::Client,
    start_time: std::time::SystemTime,
) -> impl IntoResponse {
    let uptime = start_time.elapsed().unwrap_or_default().as_secs();

    let db_status = match sqlx::query("SELECT 1").execute(&pool).await {
        Ok(_) => "connected",
        Err(e) => {
            tracing::error!("Database health check failed: {:?}", e);
            "disconnected"
        }
    };

    let redis_status = match redis_client.get_multiplexed_async_connection().await {
        Ok(mut conn) => match redis::cmd("PING").query_async::<String>(&mut conn).await {
            Ok(_) => "connected",
            Err(_) => "disconnected",
        },
        Err(_) => "disconnected",
    };

    let healthy = db_status == "connected" && redis_status == "connected";

    let response = HealthResponse {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        timestamp: chrono::Utc::now().to_rfc3339(),
        database: db_status.to_string(),
        redis: redis_status.to_string(),
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
