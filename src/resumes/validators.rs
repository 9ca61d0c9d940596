use super::models::UpdateResumeRequest;
use super::normalizer::MAX_FIELD_CHARS;
use crate::common::{ValidationResult, Validator};
use thiserror::Error;

const PDF_MAGIC: &[u8; 4] = b"%PDF";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadValidationError {
    #[error("No PDF file uploaded")]
    EmptyInput,

    #[error("File exceeds the {limit_mb} MB upload limit")]
    OversizedInput { limit_mb: usize },

    #[error("Uploaded file is not a PDF")]
    InvalidFormat,
}

/// Checks presence, then size, then the `%PDF` magic bytes
pub fn validate_pdf_upload(data: &[u8], max_bytes: usize) -> Result<(), UploadValidationError> {
    if data.is_empty() {
        return Err(UploadValidationError::EmptyInput);
    }

    if data.len() > max_bytes {
        return Err(UploadValidationError::OversizedInput {
            limit_mb: max_bytes / (1024 * 1024),
        });
    }

    if !data.starts_with(PDF_MAGIC) {
        return Err(UploadValidationError::InvalidFormat);
    }

    Ok(())
}

impl Validator<UpdateResumeRequest> for UpdateResumeRequest {
    fn validate(&self, data: &UpdateResumeRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Some(year) = &data.graduation_year {
            if year.trim().chars().count() > MAX_FIELD_CHARS {
                result.add_error(
                    "graduationYear",
                    "Graduation year must not exceed 255 characters",
                );
            }
        }

        result
    }
}

/// Validates a company or keyword name submitted on its own
pub fn validate_tag_name(name: &str) -> ValidationResult {
    let mut result = ValidationResult::new();

    if name.trim().is_empty() {
        result.add_error("name", "Name is required");
    } else if name.trim().chars().count() > MAX_FIELD_CHARS {
        result.add_error("name", "Name must not exceed 255 characters");
    }

    result
}
