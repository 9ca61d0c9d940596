// src/resumes/handlers.rs

use super::models::{
    CreateTagRequest, DownloadLink, SearchQuery, UpdateResumeRequest, UploadOverrides,
    UploadResponseData,
};
use super::normalizer::NameCaseRules;
use super::pipeline::{UploadFailure, UploadRequest, PDF_CONTENT_TYPE};
use super::repository::TagKind;
use super::services::{ResumesService, DOWNLOAD_URL_TTL};
use super::storage::LocalArtifactStore;
use super::validators::UploadValidationError;
use crate::auth::{AdminUser, Viewer};
use crate::common::{ApiError, AppState};
use axum::{
    extract::{multipart::MultipartError, Extension, Multipart, Path, Query},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

fn resumes_service(state: &AppState) -> ResumesService {
    ResumesService::new(state.db.clone(), state.artifact_store.clone())
}

fn multipart_error(e: MultipartError, limit_bytes: usize) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return UploadFailure::Validation(UploadValidationError::OversizedInput {
            limit_mb: limit_bytes / (1024 * 1024),
        })
        .into();
    }
    warn!(error = %e, "Malformed multipart upload");
    ApiError::BadRequest(format!("Invalid upload body: {}", e.body_text()))
}

/// POST /api/resumes - Upload a resume PDF with optional field overrides
pub async fn upload_resume(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    admin: AdminUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    let limit = state.upload_pipeline.max_upload_bytes();

    info!(uploaded_by = %admin.id, "Admin uploading resume");

    let mut data: Option<Bytes> = None;
    let mut filename = None;
    let mut overrides = UploadOverrides::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let Some(field_name) = field.name().map(str::to_string) else {
            continue;
        };

        match field_name.as_str() {
            "file" => {
                filename = field.file_name().map(str::to_string);
                data = Some(field.bytes().await.map_err(|e| multipart_error(e, limit))?);
            }
            "name" | "major" | "graduationYear" | "companies" | "keywords" => {
                let value = field.text().await.map_err(|e| multipart_error(e, limit))?;
                let slot = match field_name.as_str() {
                    "name" => &mut overrides.name,
                    "major" => &mut overrides.major,
                    "graduationYear" => &mut overrides.graduation_year,
                    "companies" => &mut overrides.companies,
                    _ => &mut overrides.keywords,
                };
                *slot = Some(value);
            }
            other => debug!(field = %other, "Ignoring unknown upload field"),
        }
    }

    let data = data.ok_or(UploadFailure::Validation(UploadValidationError::EmptyInput))?;

    let rules = NameCaseRules::from_settings(&state.settings_service).await;
    let outcome = state
        .upload_pipeline
        .run(
            UploadRequest {
                data,
                filename,
                overrides,
                uploaded_by: admin.id,
            },
            &rules,
        )
        .await?;

    let body = UploadResponseData {
        id: outcome.resume_id,
        name: outcome.name,
        major: outcome.major,
        graduation_year: outcome.graduation_year,
        pdf_url: outcome.pdf_url,
        parsing_warning: outcome.parsing_warning,
        warnings: outcome.warnings,
        companies: outcome.companies,
        keywords: outcome.keywords,
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "error": false,
            "message": "Resume uploaded successfully.",
            "data": body
        })),
    ))
}

/// GET /api/resumes/search
pub async fn search_resumes(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    _viewer: Viewer,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await;
    let resumes = resumes_service(&state).search(&query).await?;

    Ok(Json(json!({
        "error": false,
        "count": resumes.len(),
        "data": resumes
    })))
}

/// GET /api/resumes/filters
pub async fn get_filters(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    _viewer: Viewer,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await;
    let filters = resumes_service(&state).filters().await?;

    Ok(Json(json!({ "error": false, "data": filters })))
}

/// GET /api/resumes/:id
pub async fn get_resume(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    _viewer: Viewer,
    Path(resume_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await;
    let resume = resumes_service(&state).get_by_id(&resume_id).await?;

    Ok(Json(json!({ "error": false, "data": resume })))
}

/// GET /api/resumes/:id/download - Time-limited link to the PDF
pub async fn download_resume(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    _viewer: Viewer,
    Path(resume_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await;
    let url = resumes_service(&state).download_url(&resume_id).await?;
    let link = DownloadLink {
        url,
        expires_in_seconds: DOWNLOAD_URL_TTL.as_secs(),
    };

    Ok(Json(json!({ "error": false, "data": link })))
}

/// PUT /api/resumes/:id
pub async fn update_resume(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    admin: AdminUser,
    Path(resume_id): Path<String>,
    Json(request): Json<UpdateResumeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await;
    let rules = NameCaseRules::from_settings(&state.settings_service).await;

    let (resume, warnings) = resumes_service(&state)
        .update(&resume_id, request, &rules)
        .await?;

    info!(resume_id = %resume_id, updated_by = %admin.id, "Resume updated by admin");

    let mut body = json!({
        "error": false,
        "message": "Resume updated successfully.",
        "data": resume
    });
    if !warnings.is_empty() {
        body["warnings"] = json!(warnings);
    }

    Ok(Json(body))
}

/// DELETE /api/resumes/:id
pub async fn delete_resume(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    admin: AdminUser,
    Path(resume_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await;
    resumes_service(&state).delete(&resume_id).await?;

    info!(resume_id = %resume_id, deleted_by = %admin.id, "Resume deleted by admin");

    Ok(Json(json!({
        "error": false,
        "message": "Resume deleted successfully."
    })))
}

/// DELETE /api/resumes/all/delete
pub async fn delete_all_resumes(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    admin: AdminUser,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await;
    let count = resumes_service(&state).delete_all().await?;

    info!(count = count, deleted_by = %admin.id, "Bulk resume delete");

    Ok(Json(json!({
        "error": false,
        "message": format!("{} resumes deleted successfully.", count),
        "count": count
    })))
}

async fn list_tags(
    state_lock: &RwLock<AppState>,
    kind: TagKind,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await;
    let names = resumes_service(&state).list_tags(kind).await?;

    Ok(Json(json!({ "error": false, "data": names })))
}

async fn create_tag(
    state_lock: &RwLock<AppState>,
    kind: TagKind,
    request: CreateTagRequest,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await;
    let rules = NameCaseRules::from_settings(&state.settings_service).await;
    let tag = resumes_service(&state)
        .create_tag(kind, &request.name, &rules)
        .await?;

    Ok(Json(json!({ "error": false, "data": tag })))
}

/// GET /api/companies
pub async fn list_companies(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    _viewer: Viewer,
) -> Result<impl IntoResponse, ApiError> {
    list_tags(&state_lock, TagKind::Company).await
}

/// POST /api/companies
pub async fn create_company(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    _admin: AdminUser,
    Json(request): Json<CreateTagRequest>,
) -> Result<impl IntoResponse, ApiError> {
    create_tag(&state_lock, TagKind::Company, request).await
}

/// GET /api/keywords
pub async fn list_keywords(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    _viewer: Viewer,
) -> Result<impl IntoResponse, ApiError> {
    list_tags(&state_lock, TagKind::Keyword).await
}

/// POST /api/keywords
pub async fn create_keyword(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    _admin: AdminUser,
    Json(request): Json<CreateTagRequest>,
) -> Result<impl IntoResponse, ApiError> {
    create_tag(&state_lock, TagKind::Keyword, request).await
}

/// GET /api/files/resumes/:filename - PDFs written by the local artifact store
pub async fn serve_resume_file(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    _viewer: Viewer,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let file_name = LocalArtifactStore::file_name(&filename)
        .map_err(|_| ApiError::BadRequest("Invalid file name".to_string()))?
        .to_string();

    let path = {
        let state = state_lock.read().await;
        state.resumes_dir.join(&file_name)
    };

    let content = match tokio::fs::read(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound("Resume file not found".to_string()))
        }
        Err(e) => {
            warn!(error = %e, file = %file_name, "Failed to read resume file");
            return Err(ApiError::InternalServer("Failed to read resume".to_string()));
        }
    };

    let disposition = format!("inline; filename=\"{}\"", file_name);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, PDF_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        content,
    ))
}
