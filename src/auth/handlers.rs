//! Authentication handlers

use axum::extract::{Extension, Json};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use super::extractors::{AdminUser, Viewer};
use super::models::{AdminLoginRequest, Claims, ADMIN_ROLE};
use crate::common::{ApiError, AppState};

const ADMIN_TOKEN_HOURS: i64 = 24;

/// Signs a 24-hour admin token
pub fn issue_admin_token(jwt_secret: &str, admin_id: &str) -> Result<String, ApiError> {
    let exp = (Utc::now() + Duration::hours(ADMIN_TOKEN_HOURS)).timestamp() as usize;
    let claims = Claims {
        sub: admin_id.to_string(),
        role: ADMIN_ROLE.to_string(),
        exp,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(|e| {
        error!(error = %e, "JWT encoding error during admin login");
        ApiError::InternalServer("jwt error".to_string())
    })
}

/// Compares without short-circuiting on the first differing byte
fn passwords_match(candidate: &str, expected: &str) -> bool {
    let (a, b) = (candidate.as_bytes(), expected.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// POST /api/auth/admin/login
///
/// # Request Body
/// ```json
/// { "password": "<shared admin password>" }
/// ```
pub async fn admin_login(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<AdminLoginRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await;

    if !passwords_match(&payload.password, &state.admin_password) {
        warn!("Admin login failed: invalid password");
        return Err(ApiError::Unauthorized("Invalid admin password.".to_string()));
    }

    let token = issue_admin_token(&state.jwt_secret, ADMIN_ROLE)?;

    info!("Admin login successful");

    Ok(Json(json!({
        "error": false,
        "message": "Admin login successful.",
        "data": {
            "role": ADMIN_ROLE,
            "token": token
        }
    })))
}

/// GET /api/auth/me
pub async fn me_handler(viewer: Viewer) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(json!({
        "error": false,
        "data": {
            "role": viewer.role,
            "id": viewer.id
        }
    })))
}

/// GET /api/auth/admin/profile
pub async fn admin_profile(admin: AdminUser) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(json!({
        "error": false,
        "data": {
            "role": ADMIN_ROLE,
            "id": admin.id
        }
    })))
}
