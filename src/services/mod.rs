// src/services/mod.rs
//
// Shared services used by the domain modules

pub mod aws;
pub mod openai;
pub mod settings;

pub use aws::AWSService;
pub use openai::OpenAIService;
pub use settings::SettingsService;
