//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `POST /api/auth/admin/login` - Shared-password admin login (alias `/api/auth/login`)
/// - `GET /api/auth/me` - Role of the current caller
/// - `GET /api/auth/admin/profile` - Admin identity
pub fn auth_routes() -> Router {
    Router::new()
        .route("/api/auth/admin/login", post(handlers::admin_login))
        .route("/api/auth/login", post(handlers::admin_login))
        .route("/api/auth/me", get(handlers::me_handler))
        .route("/api/auth/admin/profile", get(handlers::admin_profile))
}
