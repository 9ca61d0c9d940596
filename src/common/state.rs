// Application state shared across all modules

use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;

use crate::common::dev_mode::DevModeConfig;
use crate::resumes::pipeline::UploadPipeline;
use crate::resumes::storage::ArtifactStore;
use crate::services::SettingsService;

/// Application state containing database pool, services, and configuration
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub jwt_secret: String,
    pub admin_password: String,
    pub member_jwt_secret: Option<String>,
    pub dev_mode: DevModeConfig,
    /// Directory served by `/api/files/resumes` when artifacts are stored locally
    pub resumes_dir: PathBuf,
    pub settings_service: Arc<SettingsService>,
    pub artifact_store: Arc<dyn ArtifactStore>,
    pub upload_pipeline: Arc<UploadPipeline>,
}
