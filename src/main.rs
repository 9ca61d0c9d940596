// src/main.rs
use axum::{extract::DefaultBodyLimit, extract::Extension, middleware, routing::get, Json, Router};
use dotenv::dotenv;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::PathBuf;
use std::{net::SocketAddr, str::FromStr, sync::Arc};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// MODULE IMPORTS
// ============================================================================

mod auth;
mod common;
mod logging_middleware;
mod resumes;
mod services;

// ============================================================================
// COMMON IMPORTS
// ============================================================================

use common::dev_mode::{apply_cli_override, print_dev_mode_status, DevModeConfig};
use common::{AppConfig, AppState};
use resumes::extractor::OpenAiResumeExtractor;
use resumes::pipeline::UploadPipeline;
use resumes::repository::SqliteResumeRepository;
use resumes::storage::{ArtifactStore, LocalArtifactStore, S3ArtifactStore};
use services::{AWSService, OpenAIService, SettingsService};

/// Multipart framing and text fields on top of the file itself
const BODY_LIMIT_HEADROOM: usize = 1024 * 1024;

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================================
// MAIN APPLICATION ENTRY POINT
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // ========================================================================
    // ENVIRONMENT CONFIGURATION
    // ========================================================================

    let config = AppConfig::from_env();
    info!(
        port = config.port,
        upload_limit_bytes = config.upload_limit_bytes,
        member_tokens = config.member_jwt_secret.is_some(),
        "Configuration loaded"
    );

    let dev_mode = apply_cli_override(DevModeConfig::from_env());
    print_dev_mode_status(&dev_mode);

    tokio::fs::create_dir_all(&config.resumes_dir).await?;

    // ========================================================================
    // DATABASE SETUP
    // ========================================================================

    if let Some(path_part) = config.database_url.strip_prefix("sqlite://") {
        let path_without_params = path_part.split('?').next().unwrap_or("");
        if !path_without_params.is_empty() && !path_without_params.starts_with(':') {
            let db_path = PathBuf::from(path_without_params);
            if let Some(parent) = db_path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }
    }

    let connect_options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .connect_with(connect_options)
        .await?;

    common::migrations::run_migrations(&pool).await?;

    // ========================================================================
    // SERVICE INITIALIZATION
    // ========================================================================

    let settings_service = Arc::new(SettingsService::new(pool.clone()));
    info!("SettingsService initialized");

    let openai_service = Arc::new(OpenAIService::new(settings_service.clone()));
    info!("OpenAIService initialized");

    let aws_service = Arc::new(AWSService::new(settings_service.clone()));
    info!("AWSService initialized");

    let storage_type = settings_service
        .get_setting("storage_type")
        .await?
        .unwrap_or_else(|| "local".to_string());

    let artifact_store: Arc<dyn ArtifactStore> = if storage_type.starts_with("s3") {
        info!(storage_type = %storage_type, "Resume artifacts stored in S3");
        Arc::new(S3ArtifactStore::new(aws_service))
    } else {
        info!(dir = %config.resumes_dir.display(), "Resume artifacts stored on local disk");
        Arc::new(LocalArtifactStore::new(
            config.resumes_dir.clone(),
            config.public_base_url.clone(),
        ))
    };

    let upload_pipeline = Arc::new(UploadPipeline::new(
        Arc::new(OpenAiResumeExtractor::new(openai_service)),
        artifact_store.clone(),
        Arc::new(SqliteResumeRepository::new(pool.clone())),
        config.upload_limit_bytes,
    ));
    info!("UploadPipeline initialized");

    // ========================================================================
    // APPLICATION STATE
    // ========================================================================

    let app_state = AppState {
        db: pool,
        jwt_secret: config.jwt_secret.clone(),
        admin_password: config.admin_password.clone(),
        member_jwt_secret: config.member_jwt_secret.clone(),
        dev_mode,
        resumes_dir: config.resumes_dir.clone(),
        settings_service,
        artifact_store,
        upload_pipeline,
    };

    let shared = Arc::new(RwLock::new(app_state));

    // ========================================================================
    // ROUTER COMPOSITION
    // ========================================================================

    let origins: Vec<axum::http::HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .allow_credentials(true);

    let app = Router::new()
        .route("/health", get(health))
        .merge(auth::auth_routes())
        .merge(resumes::resumes_routes())
        .layer(DefaultBodyLimit::max(
            config.upload_limit_bytes + BODY_LIMIT_HEADROOM,
        ))
        .layer(middleware::from_fn(logging_middleware::log_request_response))
        .layer(Extension(shared))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // ========================================================================
    // SERVER STARTUP
    // ========================================================================

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
