// src/common/dev_mode.rs
//! Development mode configuration and utilities
//! Allows bypassing admin authentication for local testing

use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct DevModeConfig {
    pub enabled: bool,
    /// Identity recorded as `uploaded_by` for uploads made in dev mode
    pub admin_id: String,
}

impl DevModeConfig {
    pub fn from_env() -> Self {
        let enabled = env::var("DEV_MODE")
            .unwrap_or_else(|_| "false".to_string())
            .to_lowercase()
            == "true";

        let admin_id = env::var("DEV_ADMIN_ID").unwrap_or_else(|_| "admin".to_string());

        Self { enabled, admin_id }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            admin_id: "admin".to_string(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Print dev mode status on startup
pub fn print_dev_mode_status(config: &DevModeConfig) {
    if config.enabled {
        warn!(admin_id = %config.admin_id, "DEV MODE ENABLED: admin authentication bypassed, do not use in production");
    } else {
        tracing::info!("Production mode - authentication required");
    }
}

/// CLI argument parsing for dev mode
fn parse_dev_mode_args<I>(args: I) -> Option<bool>
where
    I: IntoIterator<Item = String>,
{
    for arg in args {
        match arg.as_str() {
            "--dev" | "--dev-mode" => return Some(true),
            "--no-dev" | "--prod" | "--production" => return Some(false),
            _ => {}
        }
    }

    None
}

/// Override dev mode from CLI args
pub fn apply_cli_override(mut config: DevModeConfig) -> DevModeConfig {
    if let Some(cli_dev_mode) = parse_dev_mode_args(env::args()) {
        warn!(dev_mode = cli_dev_mode, "CLI override for DEV_MODE");
        config.enabled = cli_dev_mode;
    }

    config
}
