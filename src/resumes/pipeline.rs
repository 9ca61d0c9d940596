//! Resume upload orchestration.
//!
//! validation -> parsing -> normalization -> storage_put -> db_create ->
//! associate_companies -> associate_keywords -> commit
//!
//! The step being executed is tracked explicitly and handed to the failure
//! handler. Each step's policy decides whether a failure aborts the upload
//! or only records a warning. On abort the stored artifact is deleted when
//! the failing step comes after `storage_put`, and the transaction is rolled
//! back when one is open.

use super::extractor::{extract_with_fallback, fallback_label, MetadataExtractor};
use super::models::UploadOverrides;
use super::normalizer::{normalize, NameCaseRules};
use super::repository::{NewResume, RepositoryError, ResumeRepository, ResumeTransaction};
use super::storage::{storage_key, ArtifactStore, StorageError};
use super::validators::{validate_pdf_upload, UploadValidationError};
use crate::common::generate_resume_id;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UploadStep {
    Validation,
    Parsing,
    Normalization,
    StoragePut,
    DbCreate,
    AssociateCompanies,
    AssociateKeywords,
    Commit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    Abort,
    Continue,
}

impl UploadStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStep::Validation => "validation",
            UploadStep::Parsing => "parsing",
            UploadStep::Normalization => "normalization",
            UploadStep::StoragePut => "storage_put",
            UploadStep::DbCreate => "db_create",
            UploadStep::AssociateCompanies => "associate_companies",
            UploadStep::AssociateKeywords => "associate_keywords",
            UploadStep::Commit => "commit",
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        match self {
            UploadStep::AssociateCompanies | UploadStep::AssociateKeywords => {
                FailurePolicy::Continue
            }
            _ => FailurePolicy::Abort,
        }
    }

    /// True once `storage_put` has completed
    pub fn artifact_stored(&self) -> bool {
        *self > UploadStep::StoragePut
    }
}

impl fmt::Display for UploadStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum UploadFailure {
    #[error("{0}")]
    Validation(UploadValidationError),

    #[error("storage failed: {source}")]
    Storage { source: StorageError },

    #[error("persistence failed at {step}: {source}")]
    Persistence {
        step: UploadStep,
        source: RepositoryError,
    },
}

impl UploadFailure {
    pub fn step(&self) -> UploadStep {
        match self {
            UploadFailure::Validation(_) => UploadStep::Validation,
            UploadFailure::Storage { .. } => UploadStep::StoragePut,
            UploadFailure::Persistence { step, .. } => *step,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            UploadFailure::Validation(_) => "VALIDATION_ERROR",
            UploadFailure::Storage { .. } => "STORAGE_ERROR",
            UploadFailure::Persistence { .. } => "PERSISTENCE_ERROR",
        }
    }

    /// Step-qualified message without backend internals
    pub fn user_message(&self) -> String {
        let summary = match self {
            UploadFailure::Validation(e) => e.to_string(),
            UploadFailure::Storage { .. } => "Failed to store the resume file".to_string(),
            UploadFailure::Persistence { .. } => "Failed to save the resume record".to_string(),
        };
        format!("{} during step: {}", summary, self.step())
    }
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub data: Bytes,
    pub filename: Option<String>,
    pub overrides: UploadOverrides,
    pub uploaded_by: String,
}

#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub resume_id: String,
    pub name: String,
    pub major: String,
    pub graduation_year: String,
    pub pdf_url: String,
    pub storage_key: String,
    pub companies: Vec<String>,
    pub keywords: Vec<String>,
    pub parsing_warning: Option<String>,
    pub warnings: Vec<String>,
}

pub struct UploadPipeline {
    extractor: Arc<dyn MetadataExtractor>,
    store: Arc<dyn ArtifactStore>,
    repository: Arc<dyn ResumeRepository>,
    max_upload_bytes: usize,
}

impl UploadPipeline {
    pub fn new(
        extractor: Arc<dyn MetadataExtractor>,
        store: Arc<dyn ArtifactStore>,
        repository: Arc<dyn ResumeRepository>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            extractor,
            store,
            repository,
            max_upload_bytes,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub async fn run(
        &self,
        request: UploadRequest,
        rules: &NameCaseRules,
    ) -> Result<UploadOutcome, UploadFailure> {
        let now_millis = chrono::Utc::now().timestamp_millis();

        let step = UploadStep::Validation;
        validate_pdf_upload(&request.data, self.max_upload_bytes).map_err(|e| {
            warn!(step = %step, error = %e, "Resume upload rejected");
            UploadFailure::Validation(e)
        })?;

        let step = UploadStep::Parsing;
        let label = fallback_label(request.filename.as_deref(), now_millis);
        let extraction = extract_with_fallback(self.extractor.as_ref(), &request.data, &label).await;
        debug!(step = %step, fallback_label = %label, fallback_used = extraction.warning.is_some(), "Resume parsed");

        let step = UploadStep::Normalization;
        let mut normalized = normalize(&request.overrides, &extraction.metadata, rules, now_millis);
        let mut warnings = std::mem::take(&mut normalized.warnings);
        debug!(step = %step, name = %normalized.name, warnings = warnings.len(), "Resume metadata normalized");

        let step = UploadStep::StoragePut;
        let key = storage_key(&normalized.name, now_millis);
        let pdf_url = match self
            .store
            .put(request.data.clone(), &key, PDF_CONTENT_TYPE)
            .await
        {
            Ok(url) => url,
            Err(source) => {
                return Err(self
                    .abort(step, None, &key, UploadFailure::Storage { source })
                    .await)
            }
        };

        let step = UploadStep::DbCreate;
        let mut tx = match self.repository.begin().await {
            Ok(tx) => tx,
            Err(source) => {
                return Err(self
                    .abort(step, None, &key, UploadFailure::Persistence { step, source })
                    .await)
            }
        };

        let resume_id = generate_resume_id();
        let record = NewResume {
            id: resume_id.clone(),
            name: normalized.name.clone(),
            major: normalized.major.clone(),
            graduation_year: normalized.graduation_year.clone(),
            pdf_url: pdf_url.clone(),
            s3_key: key.clone(),
            uploaded_by: request.uploaded_by.clone(),
        };

        if let Err(source) = tx.create_resume(&record).await {
            return Err(self
                .abort(step, Some(tx), &key, UploadFailure::Persistence { step, source })
                .await);
        }

        let step = UploadStep::AssociateCompanies;
        let result = tx.associate_companies(&resume_id, &normalized.companies).await;
        let companies = match result {
            Ok(linked) => linked,
            Err(source) => match step.policy() {
                FailurePolicy::Continue => {
                    warn!(step = %step, resume_id = %resume_id, error = %source, "Company tags skipped");
                    warnings.push("Company tags could not be saved".to_string());
                    Vec::new()
                }
                FailurePolicy::Abort => {
                    return Err(self
                        .abort(step, Some(tx), &key, UploadFailure::Persistence { step, source })
                        .await)
                }
            },
        };

        let step = UploadStep::AssociateKeywords;
        let result = tx.associate_keywords(&resume_id, &normalized.keywords).await;
        let keywords = match result {
            Ok(linked) => linked,
            Err(source) => match step.policy() {
                FailurePolicy::Continue => {
                    warn!(step = %step, resume_id = %resume_id, error = %source, "Keyword tags skipped");
                    warnings.push("Keyword tags could not be saved".to_string());
                    Vec::new()
                }
                FailurePolicy::Abort => {
                    return Err(self
                        .abort(step, Some(tx), &key, UploadFailure::Persistence { step, source })
                        .await)
                }
            },
        };

        let step = UploadStep::Commit;
        if let Err(source) = tx.commit().await {
            return Err(self
                .abort(step, None, &key, UploadFailure::Persistence { step, source })
                .await);
        }

        info!(
            resume_id = %resume_id,
            storage_key = %key,
            uploaded_by = %request.uploaded_by,
            companies = companies.len(),
            keywords = keywords.len(),
            parsing_warning = extraction.warning.is_some(),
            "Resume uploaded successfully"
        );

        Ok(UploadOutcome {
            resume_id,
            name: normalized.name,
            major: normalized.major,
            graduation_year: normalized.graduation_year,
            pdf_url,
            storage_key: key,
            companies,
            keywords,
            parsing_warning: extraction.warning,
            warnings,
        })
    }

    /// Logs the failure and runs compensations; compensation errors are only logged
    async fn abort(
        &self,
        step: UploadStep,
        tx: Option<Box<dyn ResumeTransaction>>,
        key: &str,
        failure: UploadFailure,
    ) -> UploadFailure {
        error!(step = %step, storage_key = %key, error = %failure, "Resume upload failed");

        if let Some(tx) = tx {
            if let Err(e) = tx.rollback().await {
                error!(step = %step, error = %e, "Failed to roll back resume transaction");
            }
        }

        if step.artifact_stored() {
            match self.store.delete(key).await {
                Ok(()) => info!(storage_key = %key, "Removed orphaned resume artifact"),
                Err(e) => {
                    error!(step = %step, storage_key = %key, error = %e, "Failed to remove orphaned resume artifact")
                }
            }
        }

        failure
    }
}
