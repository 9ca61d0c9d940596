// Process configuration loaded from the environment at startup
//
// Runtime-adjustable values (AWS credentials, OpenAI model, storage type,
// company-name casing lists) live in `system_settings` instead and are read
// through `SettingsService`.

use std::env;
use std::path::PathBuf;

/// Default upload cap in MiB
pub const DEFAULT_UPLOAD_LIMIT_MB: usize = 10;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub admin_password: String,
    /// HS256 secret of the member identity provider; `None` leaves read paths public
    pub member_jwt_secret: Option<String>,
    pub upload_limit_bytes: usize,
    pub resumes_dir: PathBuf,
    /// Base URL used to build links to locally stored artifacts
    pub public_base_url: String,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://resume_repo.db".to_string());

        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(8080);

        let jwt_secret =
            env::var("JWT_SECRET").unwrap_or_else(|_| "replace_with_strong_secret".to_string());

        let admin_password =
            env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "change_me_admin".to_string());

        let member_jwt_secret = env::var("MEMBER_JWT_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let upload_limit_bytes = parse_upload_limit(env::var("UPLOAD_LIMIT_MB").ok().as_deref());

        let resumes_dir = PathBuf::from(
            env::var("RESUMES_DIR").unwrap_or_else(|_| "./uploads/resumes".to_string()),
        );

        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://localhost:3001".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            database_url,
            port,
            jwt_secret,
            admin_password,
            member_jwt_secret,
            upload_limit_bytes,
            resumes_dir,
            public_base_url,
            cors_origins,
        }
    }
}

/// Parses `UPLOAD_LIMIT_MB`; invalid or zero values fall back to the default
pub fn parse_upload_limit(raw: Option<&str>) -> usize {
    let mb = raw
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|mb| *mb > 0)
        .unwrap_or(DEFAULT_UPLOAD_LIMIT_MB);
    mb * 1024 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_limit_defaults_to_ten_mib() {
        assert_eq!(parse_upload_limit(None), 10 * 1024 * 1024);
        assert_eq!(parse_upload_limit(Some("abc")), 10 * 1024 * 1024);
        assert_eq!(parse_upload_limit(Some("0")), 10 * 1024 * 1024);
    }

    #[test]
    fn test_upload_limit_from_value() {
        assert_eq!(parse_upload_limit(Some(" 25 ")), 25 * 1024 * 1024);
    }
}
