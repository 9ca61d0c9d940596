//! Tests for resumes module
//!
//! These tests verify:
//! - Upload validation and metadata normalization
//! - Step ordering and failure policies of the upload pipeline
//! - Compensation (artifact delete, rollback) on failed uploads
//! - Search, update and soft delete against an in-memory database

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::common::{Validator, ApiError};
    use async_trait::async_trait;
    use bytes::Bytes;
    use extractor::{
        extract_with_fallback, fallback_label, parse_metadata_response, ExtractionError,
        MetadataExtractor,
    };
    use models::{ExtractedMetadata, SearchQuery, TagListInput, UpdateResumeRequest, UploadOverrides};
    use normalizer::{normalize, NameCaseRules, UNSPECIFIED};
    use pipeline::{FailurePolicy, UploadFailure, UploadPipeline, UploadRequest, UploadStep};
    use repository::{
        NewResume, RepositoryError, ResumeRepository, ResumeTransaction, SqliteResumeRepository,
        TagKind,
    };
    use services::ResumesService;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use storage::{storage_key, ArtifactStore, LocalArtifactStore, StorageError, MAX_KEY_NAME_CHARS};
    use validators::{validate_pdf_upload, validate_tag_name, UploadValidationError};

    const MB: usize = 1024 * 1024;

    // ------------------------------------------------------------------
    // Test doubles
    // ------------------------------------------------------------------

    struct FakeExtractor {
        result: Option<ExtractedMetadata>,
    }

    impl FakeExtractor {
        fn returning(metadata: ExtractedMetadata) -> Arc<Self> {
            Arc::new(Self {
                result: Some(metadata),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self { result: None })
        }
    }

    #[async_trait]
    impl MetadataExtractor for FakeExtractor {
        async fn extract(
            &self,
            _data: &[u8],
            _fallback_label: &str,
        ) -> Result<ExtractedMetadata, ExtractionError> {
            self.result
                .clone()
                .ok_or_else(|| ExtractionError::MalformedResponse("model timed out".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        fail_put: bool,
        puts: Mutex<Vec<String>>,
        deletes: Mutex<Vec<String>>,
    }

    impl RecordingStore {
        fn failing_put() -> Arc<Self> {
            Arc::new(Self {
                fail_put: true,
                ..Default::default()
            })
        }

        fn puts(&self) -> Vec<String> {
            self.puts.lock().unwrap().clone()
        }

        fn deletes(&self) -> Vec<String> {
            self.deletes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ArtifactStore for RecordingStore {
        async fn put(&self, _data: Bytes, key: &str, _content_type: &str) -> Result<String, StorageError> {
            self.puts.lock().unwrap().push(key.to_string());
            if self.fail_put {
                return Err(StorageError::InvalidKey(key.to_string()));
            }
            Ok(format!("https://files.test/{}", key))
        }

        async fn delete(&self, key: &str) -> Result<(), StorageError> {
            self.deletes.lock().unwrap().push(key.to_string());
            Ok(())
        }

        async fn signed_url(&self, key: &str, _ttl: Duration) -> Result<String, StorageError> {
            Ok(format!("https://files.test/{}?signed", key))
        }
    }

    /// Real SQLite repository that fails at one chosen step
    struct FaultyRepository {
        inner: SqliteResumeRepository,
        fault: UploadStep,
        begun: Mutex<usize>,
    }

    impl FaultyRepository {
        fn new(pool: SqlitePool, fault: UploadStep) -> Arc<Self> {
            Arc::new(Self {
                inner: SqliteResumeRepository::new(pool),
                fault,
                begun: Mutex::new(0),
            })
        }

        fn begun(&self) -> usize {
            *self.begun.lock().unwrap()
        }
    }

    #[async_trait]
    impl ResumeRepository for FaultyRepository {
        async fn begin(&self) -> Result<Box<dyn ResumeTransaction>, RepositoryError> {
            *self.begun.lock().unwrap() += 1;
            let inner = self.inner.begin().await?;
            Ok(Box::new(FaultyTransaction {
                inner,
                fault: self.fault,
            }))
        }
    }

    struct FaultyTransaction {
        inner: Box<dyn ResumeTransaction>,
        fault: UploadStep,
    }

    fn injected() -> RepositoryError {
        RepositoryError::Database(sqlx::Error::Protocol("injected fault".to_string()))
    }

    #[async_trait]
    impl ResumeTransaction for FaultyTransaction {
        async fn create_resume(&mut self, resume: &NewResume) -> Result<(), RepositoryError> {
            if self.fault == UploadStep::DbCreate {
                return Err(injected());
            }
            self.inner.create_resume(resume).await
        }

        async fn associate_companies(
            &mut self,
            resume_id: &str,
            names: &[String],
        ) -> Result<Vec<String>, RepositoryError> {
            if self.fault == UploadStep::AssociateCompanies {
                return Err(injected());
            }
            self.inner.associate_companies(resume_id, names).await
        }

        async fn associate_keywords(
            &mut self,
            resume_id: &str,
            names: &[String],
        ) -> Result<Vec<String>, RepositoryError> {
            if self.fault == UploadStep::AssociateKeywords {
                return Err(injected());
            }
            self.inner.associate_keywords(resume_id, names).await
        }

        async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
            if self.fault == UploadStep::Commit {
                // Inner transaction is dropped uncommitted
                return Err(injected());
            }
            self.inner.commit().await
        }

        async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
            self.inner.rollback().await
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory database");
        crate::common::migrations::create_schema(&pool)
            .await
            .expect("Failed to create schema");
        pool
    }

    fn pdf_bytes(len: usize) -> Bytes {
        let mut data = b"%PDF-1.4\n".to_vec();
        data.resize(len.max(data.len()), b'x');
        Bytes::from(data)
    }

    fn jane_doe() -> ExtractedMetadata {
        ExtractedMetadata {
            name: Some("Jane Doe".to_string()),
            major: Some("CS".to_string()),
            graduation_year: Some("2024".to_string()),
            companies: vec!["Google".to_string(), "google".to_string()],
            keywords: vec!["Python".to_string()],
        }
    }

    fn request(data: Bytes) -> UploadRequest {
        UploadRequest {
            data,
            filename: Some("jane_doe_resume.pdf".to_string()),
            overrides: UploadOverrides::default(),
            uploaded_by: "admin".to_string(),
        }
    }

    fn pipeline(
        extractor: Arc<dyn MetadataExtractor>,
        store: Arc<dyn ArtifactStore>,
        repository: Arc<dyn ResumeRepository>,
    ) -> UploadPipeline {
        UploadPipeline::new(extractor, store, repository, 10 * MB)
    }

    async fn count(pool: &SqlitePool, sql: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(sql)
            .fetch_one(pool)
            .await
            .expect("count query failed")
    }

    async fn insert_resume(pool: &SqlitePool, id: &str, name: &str, major: &str, year: &str, created_at: &str) {
        sqlx::query(
            r#"
            INSERT INTO resumes (id, name, major, graduation_year, pdf_url, s3_key, uploaded_by, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, 'admin', 1, ?, ?)
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(major)
        .bind(year)
        .bind(format!("https://files.test/resumes/{}.pdf", id))
        .bind(format!("resumes/{}.pdf", id))
        .bind(created_at)
        .bind(created_at)
        .execute(pool)
        .await
        .expect("insert failed");
    }

    async fn link(pool: &SqlitePool, kind: TagKind, resume_id: &str, names: &[&str]) {
        let mut conn = pool.acquire().await.unwrap();
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        repository::link_tags(&mut conn, kind, resume_id, &names)
            .await
            .expect("link failed");
    }

    /// Three resumes: r1 (oldest) .. r3 (newest)
    async fn seeded_service(store: Arc<dyn ArtifactStore>) -> (SqlitePool, ResumesService) {
        let pool = test_pool().await;

        insert_resume(&pool, "r1", "Alice Smith", "CS", "2023", "2024-01-01T00:00:00.000Z").await;
        insert_resume(&pool, "r2", "Bob Jones", "Math", "2024", "2024-02-01T00:00:00.000Z").await;
        insert_resume(&pool, "r3", "Carol White", "CS", "2024", "2024-03-01T00:00:00.000Z").await;

        link(&pool, TagKind::Company, "r1", &["Google", "Stripe"]).await;
        link(&pool, TagKind::Company, "r3", &["Acme Corp"]).await;
        link(&pool, TagKind::Keyword, "r2", &["Python"]).await;
        link(&pool, TagKind::Keyword, "r3", &["Rust", "Python"]).await;

        let service = ResumesService::new(pool.clone(), store);
        (pool, service)
    }

    fn ids(summaries: &[models::ResumeSummary]) -> Vec<&str> {
        summaries.iter().map(|s| s.id.as_str()).collect()
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    #[test]
    fn test_empty_upload_rejected() {
        assert_eq!(
            validate_pdf_upload(&[], MB),
            Err(UploadValidationError::EmptyInput)
        );
    }

    #[test]
    fn test_oversized_upload_rejected_before_format_check() {
        // Not a PDF either, but size is reported first
        let data = vec![b'x'; 2 * MB + 1];
        assert_eq!(
            validate_pdf_upload(&data, 2 * MB),
            Err(UploadValidationError::OversizedInput { limit_mb: 2 })
        );
    }

    #[test]
    fn test_non_pdf_upload_rejected() {
        assert_eq!(
            validate_pdf_upload(b"PK\x03\x04 zip file", MB),
            Err(UploadValidationError::InvalidFormat)
        );
    }

    #[test]
    fn test_pdf_at_exact_limit_accepted() {
        let data = pdf_bytes(MB);
        assert!(validate_pdf_upload(&data, MB).is_ok());
    }

    #[test]
    fn test_update_request_rejects_long_graduation_year() {
        let request = UpdateResumeRequest {
            graduation_year: Some("9".repeat(256)),
            ..Default::default()
        };
        let result = request.validate(&request);
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "graduationYear"));
    }

    #[test]
    fn test_tag_name_validation() {
        assert!(validate_tag_name("Acme").is_valid());
        let blank = validate_tag_name("   ");
        assert!(blank.errors.iter().any(|e| e.field == "name"));
        assert!(!validate_tag_name(&"a".repeat(256)).is_valid());
    }

    // ------------------------------------------------------------------
    // Normalization
    // ------------------------------------------------------------------

    #[test]
    fn test_override_companies_deduplicated_case_insensitively() {
        let overrides = UploadOverrides {
            companies: Some("Acme Corp, acme corp, Other Inc".to_string()),
            ..Default::default()
        };

        let normalized = normalize(
            &overrides,
            &ExtractedMetadata::default(),
            &NameCaseRules::default(),
            1,
        );

        assert_eq!(normalized.companies, vec!["Acme Corp", "Other Inc"]);
    }

    #[test]
    fn test_long_name_truncated_to_255_chars() {
        let overrides = UploadOverrides {
            name: Some("N".repeat(400)),
            ..Default::default()
        };

        let normalized = normalize(
            &overrides,
            &ExtractedMetadata::default(),
            &NameCaseRules::default(),
            1,
        );

        assert_eq!(normalized.name.chars().count(), 255);
        assert!(normalized.name.ends_with("..."));
    }

    #[test]
    fn test_overrides_take_precedence_over_extracted_values() {
        let overrides = UploadOverrides {
            name: Some("  Janet D.  ".to_string()),
            major: Some("   ".to_string()),
            keywords: Some("Go, SQL".to_string()),
            ..Default::default()
        };

        let normalized = normalize(&overrides, &jane_doe(), &NameCaseRules::default(), 1);

        assert_eq!(normalized.name, "Janet D.");
        // Blank override falls through to the extracted value
        assert_eq!(normalized.major, "CS");
        assert_eq!(normalized.graduation_year, "2024");
        assert_eq!(normalized.companies, vec!["Google"]);
        assert_eq!(normalized.keywords, vec!["Go", "SQL"]);
    }

    #[test]
    fn test_missing_fields_get_sentinels() {
        let normalized = normalize(
            &UploadOverrides::default(),
            &ExtractedMetadata::default(),
            &NameCaseRules::default(),
            1700000000000,
        );

        assert_eq!(normalized.name, "Unknown_Resume_1700000000000");
        assert_eq!(normalized.major, UNSPECIFIED);
        assert_eq!(normalized.graduation_year, UNSPECIFIED);
        assert!(normalized.companies.is_empty());
        assert!(normalized.warnings.is_empty());
    }

    #[test]
    fn test_overlong_graduation_year_becomes_unspecified() {
        let extracted = ExtractedMetadata {
            graduation_year: Some("2".repeat(300)),
            ..Default::default()
        };

        let normalized = normalize(
            &UploadOverrides::default(),
            &extracted,
            &NameCaseRules::default(),
            1,
        );

        assert_eq!(normalized.graduation_year, UNSPECIFIED);
    }

    #[test]
    fn test_company_title_case_rules() {
        let rules = NameCaseRules::default();
        assert_eq!(rules.title_case("bank OF america"), "Bank of America");
        assert_eq!(rules.title_case("ibm research"), "IBM Research");
        assert_eq!(rules.title_case("the  home depot"), "The Home Depot");
        assert_eq!(rules.title_case("aws"), "AWS");
    }

    #[test]
    fn test_custom_case_rules_replace_defaults() {
        let rules = NameCaseRules::from_lists(["acme"], ["de"]);
        assert_eq!(rules.title_case("acme de mexico"), "ACME de Mexico");
        assert_eq!(rules.title_case("ibm"), "Ibm");
    }

    #[test]
    fn test_tag_lists_capped_with_warning() {
        let extracted = ExtractedMetadata {
            keywords: (0..150).map(|i| format!("skill{}", i)).collect(),
            ..Default::default()
        };

        let normalized = normalize(
            &UploadOverrides::default(),
            &extracted,
            &NameCaseRules::default(),
            1,
        );

        assert_eq!(normalized.keywords.len(), 100);
        assert_eq!(normalized.keywords[0], "skill0");
        assert_eq!(normalized.warnings.len(), 1);
        assert!(normalized.warnings[0].contains("keywords"));
    }

    // ------------------------------------------------------------------
    // Extraction helpers
    // ------------------------------------------------------------------

    #[test]
    fn test_fallback_label_from_filename() {
        assert_eq!(fallback_label(Some("jane_doe.pdf"), 5), "jane_doe");
        assert_eq!(fallback_label(Some("archive.v2.pdf"), 5), "archive.v2");
        assert_eq!(fallback_label(Some("   "), 5), "resume_5");
        assert_eq!(fallback_label(None, 42), "resume_42");
    }

    #[test]
    fn test_parse_metadata_response_with_fences_and_numbers() {
        let response = "Here you go:\n```json\n{\"name\": \"Jane Doe\", \"major\": null, \"graduationYear\": 2024, \"companies\": [\"Google\", 7], \"skills\": [\"Python\"]}\n```";

        let metadata = parse_metadata_response(response).unwrap();

        assert_eq!(metadata.name.as_deref(), Some("Jane Doe"));
        assert_eq!(metadata.major, None);
        assert_eq!(metadata.graduation_year.as_deref(), Some("2024"));
        assert_eq!(metadata.companies, vec!["Google"]);
        assert_eq!(metadata.keywords, vec!["Python"]);
    }

    #[test]
    fn test_parse_metadata_response_without_json() {
        assert!(matches!(
            parse_metadata_response("I could not read this resume."),
            Err(ExtractionError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_extractor_failure_uses_placeholders() {
        let extractor = FakeExtractor::failing();

        let outcome = extract_with_fallback(extractor.as_ref(), b"%PDF", "jane_doe").await;

        assert_eq!(outcome.metadata.name.as_deref(), Some("jane_doe"));
        assert_eq!(outcome.metadata.major.as_deref(), Some(UNSPECIFIED));
        assert!(outcome.warning.unwrap().contains("model timed out"));
    }

    // ------------------------------------------------------------------
    // Steps and storage keys
    // ------------------------------------------------------------------

    #[test]
    fn test_step_order_and_policy() {
        assert!(UploadStep::Validation < UploadStep::StoragePut);
        assert!(UploadStep::DbCreate < UploadStep::Commit);

        assert_eq!(UploadStep::AssociateCompanies.policy(), FailurePolicy::Continue);
        assert_eq!(UploadStep::AssociateKeywords.policy(), FailurePolicy::Continue);
        assert_eq!(UploadStep::DbCreate.policy(), FailurePolicy::Abort);
        assert_eq!(UploadStep::Commit.policy(), FailurePolicy::Abort);

        assert!(!UploadStep::StoragePut.artifact_stored());
        assert!(UploadStep::DbCreate.artifact_stored());
        assert_eq!(UploadStep::AssociateKeywords.to_string(), "associate_keywords");
    }

    #[test]
    fn test_storage_key_is_sanitized() {
        assert_eq!(
            storage_key("Jane O'Doe", 1700000000000),
            "resumes/jane_o_doe_1700000000000.pdf"
        );
        assert_eq!(storage_key("李雷", 7), "resumes/resume_7.pdf");
    }

    #[test]
    fn test_storage_key_caps_long_names() {
        let key = storage_key(&"A".repeat(300), 1700000000000);
        let file_name = LocalArtifactStore::file_name(&key).unwrap();

        assert_eq!(
            file_name,
            format!("{}_1700000000000.pdf", "a".repeat(MAX_KEY_NAME_CHARS))
        );
        assert!(file_name.len() < 255);
    }

    #[test]
    fn test_failure_message_names_step() {
        let failure = UploadFailure::Persistence {
            step: UploadStep::DbCreate,
            source: injected(),
        };

        assert_eq!(failure.step(), UploadStep::DbCreate);
        assert_eq!(failure.code(), "PERSISTENCE_ERROR");
        assert!(failure.user_message().ends_with("during step: db_create"));
        assert!(!failure.user_message().contains("injected"));
    }

    // ------------------------------------------------------------------
    // Upload pipeline
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_upload_end_to_end() {
        let pool = test_pool().await;
        let store = Arc::new(RecordingStore::default());
        let pipeline = pipeline(
            FakeExtractor::returning(jane_doe()),
            store.clone(),
            Arc::new(SqliteResumeRepository::new(pool.clone())),
        );

        let outcome = pipeline
            .run(request(pdf_bytes(5 * 1024)), &NameCaseRules::default())
            .await
            .expect("upload should succeed");

        assert_eq!(outcome.name, "Jane Doe");
        assert_eq!(outcome.major, "CS");
        assert_eq!(outcome.graduation_year, "2024");
        assert_eq!(outcome.companies, vec!["Google"]);
        assert_eq!(outcome.keywords, vec!["Python"]);
        assert!(outcome.parsing_warning.is_none());
        assert!(outcome.storage_key.starts_with("resumes/jane_doe_"));
        assert_eq!(store.puts(), vec![outcome.storage_key.clone()]);
        assert!(store.deletes().is_empty());

        let service = ResumesService::new(pool.clone(), store.clone());
        let detail = service.get_by_id(&outcome.resume_id).await.unwrap();
        assert_eq!(detail.summary.name, "Jane Doe");
        assert_eq!(detail.summary.companies, vec!["Google"]);
        assert_eq!(detail.summary.keywords, vec!["Python"]);
        assert_eq!(detail.uploaded_by, "admin");
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM companies").await, 1);
    }

    #[tokio::test]
    async fn test_invalid_upload_touches_nothing() {
        let pool = test_pool().await;
        let store = Arc::new(RecordingStore::default());
        let repository = FaultyRepository::new(pool.clone(), UploadStep::Commit);
        let pipeline = UploadPipeline::new(
            FakeExtractor::returning(jane_doe()),
            store.clone(),
            repository.clone(),
            MB,
        );

        for data in [Bytes::new(), Bytes::from_static(b"hello"), pdf_bytes(MB + 1)] {
            let err = pipeline
                .run(request(data), &NameCaseRules::default())
                .await
                .unwrap_err();
            assert_eq!(err.step(), UploadStep::Validation);
        }

        assert!(store.puts().is_empty());
        assert!(store.deletes().is_empty());
        assert_eq!(repository.begun(), 0);
    }

    #[tokio::test]
    async fn test_oversized_upload_fails_validation() {
        let pool = test_pool().await;
        let store = Arc::new(RecordingStore::default());
        let pipeline = UploadPipeline::new(
            FakeExtractor::returning(jane_doe()),
            store.clone(),
            Arc::new(SqliteResumeRepository::new(pool.clone())),
            MB,
        );

        let err = pipeline
            .run(request(pdf_bytes(MB + 1)), &NameCaseRules::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            UploadFailure::Validation(UploadValidationError::OversizedInput { .. })
        ));
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM resumes").await, 0);
    }

    #[tokio::test]
    async fn test_extractor_failure_still_uploads() {
        let pool = test_pool().await;
        let store = Arc::new(RecordingStore::default());
        let pipeline = pipeline(
            FakeExtractor::failing(),
            store.clone(),
            Arc::new(SqliteResumeRepository::new(pool.clone())),
        );

        let outcome = pipeline
            .run(request(pdf_bytes(2048)), &NameCaseRules::default())
            .await
            .unwrap();

        assert_eq!(outcome.name, "jane_doe_resume");
        assert_eq!(outcome.major, UNSPECIFIED);
        assert_eq!(outcome.graduation_year, UNSPECIFIED);
        assert!(!outcome.parsing_warning.unwrap_or_default().is_empty());
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM resumes WHERE is_active = 1").await, 1);
    }

    #[tokio::test]
    async fn test_storage_failure_creates_no_row_and_no_delete() {
        let pool = test_pool().await;
        let store = RecordingStore::failing_put();
        let repository = FaultyRepository::new(pool.clone(), UploadStep::Validation);
        let pipeline = pipeline(
            FakeExtractor::returning(jane_doe()),
            store.clone(),
            repository.clone(),
        );

        let err = pipeline
            .run(request(pdf_bytes(2048)), &NameCaseRules::default())
            .await
            .unwrap_err();

        assert!(matches!(err, UploadFailure::Storage { .. }));
        assert_eq!(err.step(), UploadStep::StoragePut);
        assert_eq!(store.puts().len(), 1);
        assert!(store.deletes().is_empty());
        assert_eq!(repository.begun(), 0);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM resumes").await, 0);
    }

    #[tokio::test]
    async fn test_db_create_failure_deletes_artifact_once() {
        let pool = test_pool().await;
        let store = Arc::new(RecordingStore::default());
        let pipeline = pipeline(
            FakeExtractor::returning(jane_doe()),
            store.clone(),
            FaultyRepository::new(pool.clone(), UploadStep::DbCreate),
        );

        let err = pipeline
            .run(request(pdf_bytes(2048)), &NameCaseRules::default())
            .await
            .unwrap_err();

        assert_eq!(err.step(), UploadStep::DbCreate);
        assert_eq!(store.deletes(), store.puts());
        assert_eq!(store.deletes().len(), 1);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM resumes").await, 0);
    }

    #[tokio::test]
    async fn test_company_association_failure_is_not_fatal() {
        let pool = test_pool().await;
        let store = Arc::new(RecordingStore::default());
        let pipeline = pipeline(
            FakeExtractor::returning(jane_doe()),
            store.clone(),
            FaultyRepository::new(pool.clone(), UploadStep::AssociateCompanies),
        );

        let outcome = pipeline
            .run(request(pdf_bytes(2048)), &NameCaseRules::default())
            .await
            .expect("association failures do not abort the upload");

        assert!(outcome.companies.is_empty());
        assert_eq!(outcome.keywords, vec!["Python"]);
        assert_eq!(outcome.warnings, vec!["Company tags could not be saved"]);
        assert!(store.deletes().is_empty());

        assert_eq!(count(&pool, "SELECT COUNT(*) FROM resumes WHERE is_active = 1").await, 1);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM resume_companies").await, 0);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM resume_keywords").await, 1);
    }

    #[tokio::test]
    async fn test_failed_company_link_rolls_back_only_its_savepoint() {
        let pool = test_pool().await;
        sqlx::query(
            r#"
            CREATE TRIGGER reject_boom BEFORE INSERT ON resume_companies
            WHEN (SELECT name FROM companies WHERE id = NEW.company_id) = 'Boom'
            BEGIN
                SELECT RAISE(ABORT, 'boom');
            END
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        let store = Arc::new(RecordingStore::default());
        let metadata = ExtractedMetadata {
            companies: vec!["Google".to_string(), "Boom".to_string()],
            ..jane_doe()
        };
        let pipeline = pipeline(
            FakeExtractor::returning(metadata),
            store.clone(),
            Arc::new(SqliteResumeRepository::new(pool.clone())),
        );

        let outcome = pipeline
            .run(request(pdf_bytes(2048)), &NameCaseRules::default())
            .await
            .expect("a failed company link does not abort the upload");

        assert!(outcome.companies.is_empty());
        assert_eq!(outcome.keywords, vec!["Python"]);
        assert_eq!(outcome.warnings, vec!["Company tags could not be saved"]);
        assert!(store.deletes().is_empty());

        // "Google" was written before the trigger fired and must be gone too
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM companies").await, 0);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM resume_companies").await, 0);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM resume_keywords").await, 1);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM resumes WHERE is_active = 1").await, 1);
    }

    #[tokio::test]
    async fn test_long_name_upload_to_local_store() {
        let pool = test_pool().await;
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalArtifactStore::new(dir.path(), "http://localhost:8080"));
        let metadata = ExtractedMetadata {
            name: Some("A".repeat(300)),
            ..jane_doe()
        };
        let pipeline = pipeline(
            FakeExtractor::returning(metadata),
            store.clone(),
            Arc::new(SqliteResumeRepository::new(pool.clone())),
        );

        let outcome = pipeline
            .run(request(pdf_bytes(2048)), &NameCaseRules::default())
            .await
            .expect("long names are truncated, not refused");

        let file_name = LocalArtifactStore::file_name(&outcome.storage_key).unwrap();
        assert!(dir.path().join(&file_name).exists());

        let stored: String = sqlx::query_scalar("SELECT name FROM resumes WHERE id = ?")
            .bind(&outcome.resume_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(stored.chars().count(), 255);
        assert!(stored.ends_with("..."));
        assert_eq!(stored, outcome.name);
    }

    #[tokio::test]
    async fn test_commit_failure_deletes_artifact_and_leaves_no_row() {
        let pool = test_pool().await;
        let store = Arc::new(RecordingStore::default());
        let pipeline = pipeline(
            FakeExtractor::returning(jane_doe()),
            store.clone(),
            FaultyRepository::new(pool.clone(), UploadStep::Commit),
        );

        let err = pipeline
            .run(request(pdf_bytes(2048)), &NameCaseRules::default())
            .await
            .unwrap_err();

        assert_eq!(err.step(), UploadStep::Commit);
        assert_eq!(store.deletes(), store.puts());
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM resumes").await, 0);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM companies").await, 0);
    }

    // ------------------------------------------------------------------
    // Resume service
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_search_without_filters_returns_newest_first() {
        let (_pool, service) = seeded_service(Arc::new(RecordingStore::default())).await;

        let results = service.search(&SearchQuery::default()).await.unwrap();

        assert_eq!(ids(&results), vec!["r3", "r2", "r1"]);
        assert_eq!(results[2].companies, vec!["Google", "Stripe"]);
        assert_eq!(results[0].keywords, vec!["Rust", "Python"]);
    }

    #[tokio::test]
    async fn test_search_filters_combine() {
        let (_pool, service) = seeded_service(Arc::new(RecordingStore::default())).await;

        let by_major = service
            .search(&SearchQuery {
                major: Some("CS".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(ids(&by_major), vec!["r3", "r1"]);

        let by_major_and_year = service
            .search(&SearchQuery {
                major: Some("CS".to_string()),
                graduation_year: Some("2024".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(ids(&by_major_and_year), vec!["r3"]);

        let by_company = service
            .search(&SearchQuery {
                company: Some("google".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(ids(&by_company), vec!["r1"]);
    }

    #[tokio::test]
    async fn test_search_text_matches_name_and_tags() {
        let (_pool, service) = seeded_service(Arc::new(RecordingStore::default())).await;

        let by_keyword = service
            .search(&SearchQuery {
                query: Some("pyth".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(ids(&by_keyword), vec!["r3", "r2"]);

        let by_name = service
            .search(&SearchQuery {
                query: Some("alice".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(ids(&by_name), vec!["r1"]);

        // LIKE wildcards are matched literally
        let wildcard = service
            .search(&SearchQuery {
                query: Some("%".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(wildcard.is_empty());
    }

    #[tokio::test]
    async fn test_filters_list_distinct_active_values() {
        let (_pool, service) = seeded_service(Arc::new(RecordingStore::default())).await;
        service.delete("r2").await.unwrap();

        let filters = service.filters().await.unwrap();

        assert_eq!(filters.majors, vec!["CS"]);
        assert_eq!(filters.graduation_years, vec!["2023", "2024"]);
        assert_eq!(filters.companies, vec!["Acme Corp", "Google", "Stripe"]);
    }

    #[tokio::test]
    async fn test_update_replaces_tags_and_keeps_blank_fields() {
        let (pool, service) = seeded_service(Arc::new(RecordingStore::default())).await;

        let request = UpdateResumeRequest {
            name: Some("  ".to_string()),
            major: Some("Physics".to_string()),
            companies: Some(TagListInput::Csv("meta, META, openai".to_string())),
            keywords: Some(TagListInput::List(vec![])),
            ..Default::default()
        };

        let (summary, warnings) = service
            .update("r1", request, &NameCaseRules::default())
            .await
            .unwrap();

        assert_eq!(summary.name, "Alice Smith");
        assert_eq!(summary.major, "Physics");
        assert_eq!(summary.graduation_year, "2023");
        assert_eq!(summary.companies, vec!["Meta", "Openai"]);
        assert!(summary.keywords.is_empty());
        assert!(warnings.is_empty());

        // Tag vocabulary is only ever extended
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM companies").await, 5);
    }

    #[tokio::test]
    async fn test_update_missing_resume_is_not_found() {
        let (_pool, service) = seeded_service(Arc::new(RecordingStore::default())).await;

        let err = service
            .update("nope", UpdateResumeRequest::default(), &NameCaseRules::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_hides_resume_and_removes_artifact() {
        let store = Arc::new(RecordingStore::default());
        let (pool, service) = seeded_service(store.clone()).await;

        service.delete("r1").await.unwrap();

        assert!(matches!(service.get_by_id("r1").await, Err(ApiError::NotFound(_))));
        assert!(matches!(service.delete("r1").await, Err(ApiError::NotFound(_))));
        assert_eq!(store.deletes(), vec!["resumes/r1.pdf"]);

        let results = service.search(&SearchQuery::default()).await.unwrap();
        assert_eq!(ids(&results), vec!["r3", "r2"]);
        // Soft delete keeps the row
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM resumes").await, 3);
    }

    #[tokio::test]
    async fn test_delete_all_deactivates_everything() {
        let store = Arc::new(RecordingStore::default());
        let (_pool, service) = seeded_service(store.clone()).await;

        assert_eq!(service.delete_all().await.unwrap(), 3);
        assert_eq!(store.deletes().len(), 3);
        assert!(service.search(&SearchQuery::default()).await.unwrap().is_empty());
        assert_eq!(service.delete_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_download_url_uses_store() {
        let (_pool, service) = seeded_service(Arc::new(RecordingStore::default())).await;

        let url = service.download_url("r2").await.unwrap();

        assert_eq!(url, "https://files.test/resumes/r2.pdf?signed");
    }

    #[tokio::test]
    async fn test_create_tag_reuses_existing_name() {
        let (_pool, service) = seeded_service(Arc::new(RecordingStore::default())).await;
        let rules = NameCaseRules::default();

        let existing = service
            .create_tag(TagKind::Company, "  google ", &rules)
            .await
            .unwrap();
        assert_eq!(existing.name, "Google");

        let created = service
            .create_tag(TagKind::Keyword, "Kubernetes", &rules)
            .await
            .unwrap();
        assert!(!created.id.is_empty());

        let keywords = service.list_tags(TagKind::Keyword).await.unwrap();
        assert_eq!(keywords, vec!["Kubernetes", "Python", "Rust"]);

        assert!(matches!(
            service.create_tag(TagKind::Company, " ", &rules).await,
            Err(ApiError::ValidationError(_))
        ));
    }

    // ------------------------------------------------------------------
    // Local artifact store
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_local_store_put_url_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path(), "http://localhost:8080/");

        let url = store
            .put(pdf_bytes(64), "resumes/jane_1.pdf", "application/pdf")
            .await
            .unwrap();

        assert_eq!(url, "http://localhost:8080/api/files/resumes/jane_1.pdf");
        assert!(dir.path().join("jane_1.pdf").exists());

        store.delete("resumes/jane_1.pdf").await.unwrap();
        assert!(!dir.path().join("jane_1.pdf").exists());
        // Deleting again is not an error
        store.delete("resumes/jane_1.pdf").await.unwrap();
    }

    async fn file_route_state(dir: &std::path::Path, member_jwt_secret: Option<&str>) -> Arc<tokio::sync::RwLock<crate::common::AppState>> {
        let pool = test_pool().await;
        let store: Arc<dyn ArtifactStore> = Arc::new(LocalArtifactStore::new(dir, "http://localhost:8080"));
        let upload_pipeline = Arc::new(pipeline(
            FakeExtractor::returning(jane_doe()),
            store.clone(),
            Arc::new(SqliteResumeRepository::new(pool.clone())),
        ));

        Arc::new(tokio::sync::RwLock::new(crate::common::AppState {
            db: pool.clone(),
            jwt_secret: "test_secret_key".to_string(),
            admin_password: "password".to_string(),
            member_jwt_secret: member_jwt_secret.map(str::to_string),
            dev_mode: crate::common::dev_mode::DevModeConfig::disabled(),
            resumes_dir: dir.to_path_buf(),
            settings_service: Arc::new(crate::services::SettingsService::new(pool)),
            artifact_store: store,
            upload_pipeline,
        }))
    }

    async fn get_file(state: Arc<tokio::sync::RwLock<crate::common::AppState>>, token: Option<&str>) -> axum::http::StatusCode {
        use tower::ServiceExt;

        let app = routes::resumes_routes().layer(axum::Extension(state));
        let mut builder = axum::http::Request::builder().uri("/api/files/resumes/jane_1.pdf");
        if let Some(token) = token {
            builder = builder.header(axum::http::header::AUTHORIZATION, format!("Bearer {}", token));
        }

        app.oneshot(builder.body(axum::body::Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_local_files_follow_read_access() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("jane_1.pdf"), pdf_bytes(64)).unwrap();

        let public = file_route_state(dir.path(), None).await;
        assert_eq!(get_file(public, None).await, axum::http::StatusCode::OK);

        let verified = file_route_state(dir.path(), Some("member_secret_key")).await;
        assert_eq!(
            get_file(verified.clone(), None).await,
            axum::http::StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_file(verified.clone(), Some("not-a-token")).await,
            axum::http::StatusCode::UNAUTHORIZED
        );

        let admin = crate::auth::handlers::issue_admin_token("test_secret_key", "admin").unwrap();
        assert_eq!(get_file(verified, Some(&admin)).await, axum::http::StatusCode::OK);
    }

    #[test]
    fn test_local_store_rejects_escaping_keys() {
        assert!(LocalArtifactStore::file_name("resumes/..").is_err());
        assert!(LocalArtifactStore::file_name("resumes/").is_err());
        assert!(LocalArtifactStore::file_name("..\\secret").is_err());
        assert_eq!(LocalArtifactStore::file_name("resumes/a.pdf").unwrap(), "a.pdf");
    }
}
