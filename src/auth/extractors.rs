//! Authentication extractors for Axum

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::models::{Claims, MemberClaims, ADMIN_ROLE, MEMBER_AUDIENCE};
use crate::common::{safe_token_log, ApiError, AppState};

/// Administrator authenticated with an admin JWT (or dev mode)
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewerRole {
    Admin,
    Member,
    /// No token required because member verification is not configured
    Public,
}

/// Caller allowed on read paths
#[derive(Debug, Clone)]
pub struct Viewer {
    pub id: Option<String>,
    pub role: ViewerRole,
}

/// Returns the token from `Authorization`, with or without a `Bearer ` prefix
fn bearer_token(parts: &Parts) -> Option<String> {
    let raw = parts.headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
    (!token.is_empty()).then(|| token.to_string())
}

async fn app_state<S: Send + Sync>(parts: &mut Parts, state: &S) -> Result<AppState, ApiError> {
    let Extension(state_lock): Extension<Arc<RwLock<AppState>>> =
        Extension::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::InternalServer("missing app state".to_string()))?;

    let app_state = state_lock.read().await.clone();
    Ok(app_state)
}

fn decode_admin(token: &str, jwt_secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
}

fn decode_member(
    token: &str,
    member_secret: &str,
) -> Result<MemberClaims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[MEMBER_AUDIENCE]);

    decode::<MemberClaims>(
        token,
        &DecodingKey::from_secret(member_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
}

/// Admin check on an already extracted token
pub fn authorize_admin(token: Option<&str>, jwt_secret: &str) -> Result<AdminUser, ApiError> {
    let token = token.ok_or_else(|| {
        warn!("Authentication failed: missing Authorization header");
        ApiError::Unauthorized("Access denied. No token provided.".into())
    })?;

    let claims = decode_admin(token, jwt_secret).map_err(|e| {
        warn!(error = %e, token = %safe_token_log(token), "Admin token validation failed");
        ApiError::Unauthorized("Invalid token.".into())
    })?;

    if claims.role != ADMIN_ROLE {
        warn!(sub = %claims.sub, role = %claims.role, "Non-admin token on admin route");
        return Err(ApiError::Forbidden(
            "Access denied. Admin privileges required.".into(),
        ));
    }

    Ok(AdminUser { id: claims.sub })
}

/// Read-path check: admin token, member token, or public when members are not verified
pub fn authorize_viewer(
    token: Option<&str>,
    jwt_secret: &str,
    member_secret: Option<&str>,
) -> Result<Viewer, ApiError> {
    if let Some(token) = token {
        if let Ok(claims) = decode_admin(token, jwt_secret) {
            if claims.role == ADMIN_ROLE {
                return Ok(Viewer {
                    id: Some(claims.sub),
                    role: ViewerRole::Admin,
                });
            }
        }

        if let Some(secret) = member_secret {
            return match decode_member(token, secret) {
                Ok(claims) => {
                    debug!(sub = %claims.sub, "Member token accepted");
                    Ok(Viewer {
                        id: Some(claims.sub),
                        role: ViewerRole::Member,
                    })
                }
                Err(e) => {
                    warn!(error = %e, token = %safe_token_log(token), "Member token validation failed");
                    Err(ApiError::Unauthorized("Invalid token.".into()))
                }
            };
        }
    }

    match member_secret {
        None => Ok(Viewer {
            id: None,
            role: ViewerRole::Public,
        }),
        Some(_) => Err(ApiError::Unauthorized(
            "Access denied. No token provided.".into(),
        )),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = app_state(parts, state).await?;

        if app_state.dev_mode.is_enabled() {
            debug!(admin_id = %app_state.dev_mode.admin_id, "DEV MODE: Authentication bypassed");
            return Ok(AdminUser {
                id: app_state.dev_mode.admin_id.clone(),
            });
        }

        authorize_admin(bearer_token(parts).as_deref(), &app_state.jwt_secret)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = app_state(parts, state).await?;

        if app_state.dev_mode.is_enabled() {
            return Ok(Viewer {
                id: Some(app_state.dev_mode.admin_id.clone()),
                role: ViewerRole::Admin,
            });
        }

        authorize_viewer(
            bearer_token(parts).as_deref(),
            &app_state.jwt_secret,
            app_state.member_jwt_secret.as_deref(),
        )
    }
}
