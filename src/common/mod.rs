// Common module - shared types and utilities across all modules

pub mod config;
pub mod dev_mode;
pub mod error;
pub mod helpers;
pub mod id_generator;
pub mod migrations;
pub mod state;
pub mod validation;

// Re-export commonly used types for convenience
pub use config::AppConfig;
pub use error::ApiError;
pub use helpers::{non_blank, safe_token_log, split_comma_list, truncate_with_ellipsis};
pub use id_generator::*;
pub use state::AppState;
pub use validation::{ValidationResult, Validator};
