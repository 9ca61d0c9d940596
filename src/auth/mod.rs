//! # Auth Module
//!
//! Shared-password admin login issuing HS256 JWTs, plus the extractors that
//! guard admin routes (`AdminUser`) and read routes (`Viewer`). Read routes
//! also accept member access tokens from the external identity provider.

pub mod extractors;
pub mod handlers;
pub mod models;
pub mod routes;


pub use extractors::{AdminUser, Viewer};
pub use routes::auth_routes;
