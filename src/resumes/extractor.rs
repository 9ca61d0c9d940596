use super::models::ExtractedMetadata;
use super::normalizer::UNSPECIFIED;
use crate::services::openai::OpenAIError;
use crate::services::OpenAIService;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Upper bound on resume text sent to the model
const MAX_PROMPT_TEXT_CHARS: usize = 12_000;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("PDF text extraction failed: {0}")]
    Text(String),

    #[error("PDF contains no extractable text")]
    EmptyText,

    #[error("Text generation failed: {0}")]
    Service(#[from] OpenAIError),

    #[error("Malformed extraction response: {0}")]
    MalformedResponse(String),
}

/// Pulls best-effort structured fields out of a resume binary
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn extract(
        &self,
        data: &[u8],
        fallback_label: &str,
    ) -> Result<ExtractedMetadata, ExtractionError>;
}

/// Extraction result with an advisory warning set when the extractor failed
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub metadata: ExtractedMetadata,
    pub warning: Option<String>,
}

/// Runs the extractor and substitutes placeholder fields on any failure
pub async fn extract_with_fallback(
    extractor: &dyn MetadataExtractor,
    data: &[u8],
    fallback_label: &str,
) -> ExtractionOutcome {
    match extractor.extract(data, fallback_label).await {
        Ok(metadata) => ExtractionOutcome {
            metadata,
            warning: None,
        },
        Err(e) => {
            warn!(error = %e, fallback_label = %fallback_label, "Resume parsing failed, using placeholder values");
            ExtractionOutcome {
                metadata: ExtractedMetadata {
                    name: Some(fallback_label.to_string()),
                    major: Some(UNSPECIFIED.to_string()),
                    graduation_year: Some(UNSPECIFIED.to_string()),
                    companies: Vec::new(),
                    keywords: Vec::new(),
                },
                warning: Some(format!(
                    "Automatic parsing failed ({}); placeholder values were used",
                    e
                )),
            }
        }
    }
}

/// Original filename without its extension, or `resume_<millis>`
pub fn fallback_label(filename: Option<&str>, now_millis: i64) -> String {
    let stem = filename
        .map(str::trim)
        .map(|name| match name.rsplit_once('.') {
            Some((stem, _ext)) if !stem.trim().is_empty() => stem.trim(),
            _ => name,
        })
        .filter(|stem| !stem.is_empty());

    match stem {
        Some(stem) => stem.to_string(),
        None => format!("resume_{}", now_millis),
    }
}

/// Parses the model answer, tolerating markdown fences and surrounding prose
pub fn parse_metadata_response(response: &str) -> Result<ExtractedMetadata, ExtractionError> {
    serde_json::from_str::<ExtractedMetadata>(response.trim()).or_else(|_| {
        let start = response.find('{');
        let end = response.rfind('}');
        match (start, end) {
            (Some(start), Some(end)) if start < end => {
                serde_json::from_str::<ExtractedMetadata>(&response[start..=end])
                    .map_err(|e| ExtractionError::MalformedResponse(e.to_string()))
            }
            _ => Err(ExtractionError::MalformedResponse(
                "No JSON object found in response".to_string(),
            )),
        }
    })
}

fn build_prompt(text: &str) -> String {
    let text: String = text.chars().take(MAX_PROMPT_TEXT_CHARS).collect();
    format!(
        r#"Read the resume below and return a JSON object with exactly these fields:
{{
    "name": "Full name of the candidate, or null",
    "major": "Field of study / major, or null",
    "graduationYear": "Expected or actual graduation year (YYYY), or null",
    "companies": ["Employers and organisations the candidate worked for"],
    "keywords": ["Technical skills, tools and domain keywords"]
}}

Resume text:
{}"#,
        text
    )
}

/// Extracts PDF text locally and asks the configured model for the fields
pub struct OpenAiResumeExtractor {
    openai_service: Arc<OpenAIService>,
}

impl OpenAiResumeExtractor {
    pub fn new(openai_service: Arc<OpenAIService>) -> Self {
        Self { openai_service }
    }
}

#[async_trait]
impl MetadataExtractor for OpenAiResumeExtractor {
    async fn extract(
        &self,
        data: &[u8],
        fallback_label: &str,
    ) -> Result<ExtractedMetadata, ExtractionError> {
        let owned = data.to_vec();
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&owned))
            .await
            .map_err(|e| ExtractionError::Text(e.to_string()))?
            .map_err(|e| ExtractionError::Text(e.to_string()))?;

        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyText);
        }

        debug!(
            fallback_label = %fallback_label,
            text_chars = text.chars().count(),
            "Extracted resume text"
        );

        let response = self
            .openai_service
            .parse_resume(&build_prompt(&text))
            .await?;

        parse_metadata_response(&response)
    }
}
