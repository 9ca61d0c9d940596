//! # Resumes Module
//!
//! Resume upload pipeline plus the read and maintenance surface around it:
//! - PDF validation, metadata extraction and normalization
//! - Artifact storage (S3 or local disk) with compensating deletes
//! - Search, filters, update and soft delete
//! - Company and keyword tag vocabularies

pub mod extractor;
pub mod handlers;
pub mod models;
pub mod normalizer;
pub mod pipeline;
pub mod repository;
pub mod routes;
pub mod services;
pub mod storage;
pub mod validators;

#[cfg(test)]
mod tests;

pub use routes::resumes_routes;
