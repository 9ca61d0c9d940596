//! Authentication data models

use serde::{Deserialize, Serialize};

pub const ADMIN_ROLE: &str = "admin";

/// Audience carried by member access tokens from the identity provider
pub const MEMBER_AUDIENCE: &str = "authenticated";

/// Claims of the admin JWT issued by this service
#[derive(Serialize, Deserialize, Debug)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

/// Claims of a member access token; only the fields we read
#[derive(Serialize, Deserialize, Debug)]
pub struct MemberClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: usize,
}

#[derive(Deserialize)]
pub struct AdminLoginRequest {
    pub password: String,
}
