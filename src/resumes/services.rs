use super::models::{
    FiltersResponse, Resume, ResumeDetail, ResumeSummary, SearchQuery, Tag, UpdateResumeRequest,
};
use super::normalizer::{normalize_companies, normalize_keywords, normalize_text, NameCaseRules};
use super::repository::{ensure_tag, replace_tags, tag_names_for, TagKind};
use super::storage::ArtifactStore;
use super::validators::validate_tag_name;
use crate::common::{non_blank, ApiError, Validator};
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub const DOWNLOAD_URL_TTL: Duration = Duration::from_secs(15 * 60);

const RESUME_COLUMNS: &str = "id, name, major, graduation_year, pdf_url, s3_key, uploaded_by, \
                              is_active, created_at, updated_at";

/// `%value%` with LIKE wildcards in `value` escaped by `\`
fn like_pattern(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('%');
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

pub struct ResumesService {
    db: SqlitePool,
    store: Arc<dyn ArtifactStore>,
}

impl ResumesService {
    pub fn new(db: SqlitePool, store: Arc<dyn ArtifactStore>) -> Self {
        Self { db, store }
    }

    async fn summarize(
        conn: &mut SqliteConnection,
        resume: &Resume,
    ) -> Result<ResumeSummary, ApiError> {
        let companies = tag_names_for(conn, TagKind::Company, &resume.id).await?;
        let keywords = tag_names_for(conn, TagKind::Keyword, &resume.id).await?;

        Ok(ResumeSummary {
            id: resume.id.clone(),
            name: resume.name.clone(),
            major: resume.major.clone(),
            graduation_year: resume.graduation_year.clone(),
            pdf_url: resume.pdf_url.clone(),
            companies,
            keywords,
        })
    }

    async fn find_active(
        conn: &mut SqliteConnection,
        resume_id: &str,
    ) -> Result<Resume, ApiError> {
        sqlx::query_as::<_, Resume>(&format!(
            "SELECT {} FROM resumes WHERE id = ? AND is_active = 1",
            RESUME_COLUMNS
        ))
        .bind(resume_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ApiError::NotFound("Resume not found".to_string()))
    }

    /// Active resumes matching every supplied filter, newest first
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<ResumeSummary>, ApiError> {
        let text = non_blank(query.query.as_deref()).map(like_pattern);
        let major = non_blank(query.major.as_deref());
        let graduation_year = non_blank(query.graduation_year.as_deref());
        let company = non_blank(query.company.as_deref());

        let mut conn = self.db.acquire().await?;

        let resumes = sqlx::query_as::<_, Resume>(&format!(
            r#"
            SELECT {} FROM resumes r
            WHERE r.is_active = 1
              AND (?1 IS NULL OR r.major = ?1)
              AND (?2 IS NULL OR r.graduation_year = ?2)
              AND (?3 IS NULL OR EXISTS (
                    SELECT 1 FROM resume_companies rc
                    JOIN companies c ON c.id = rc.company_id
                    WHERE rc.resume_id = r.id AND c.name = ?3))
              AND (?4 IS NULL
                   OR r.name LIKE ?4 ESCAPE '\'
                   OR EXISTS (
                    SELECT 1 FROM resume_companies rc
                    JOIN companies c ON c.id = rc.company_id
                    WHERE rc.resume_id = r.id AND c.name LIKE ?4 ESCAPE '\')
                   OR EXISTS (
                    SELECT 1 FROM resume_keywords rk
                    JOIN keywords k ON k.id = rk.keyword_id
                    WHERE rk.resume_id = r.id AND k.name LIKE ?4 ESCAPE '\'))
            ORDER BY r.created_at DESC, r.rowid DESC
            "#,
            RESUME_COLUMNS
        ))
        .bind(major)
        .bind(graduation_year)
        .bind(company)
        .bind(text.as_deref())
        .fetch_all(&mut *conn)
        .await?;

        let mut summaries = Vec::with_capacity(resumes.len());
        for resume in &resumes {
            summaries.push(Self::summarize(&mut conn, resume).await?);
        }

        Ok(summaries)
    }

    pub async fn filters(&self) -> Result<FiltersResponse, ApiError> {
        let majors = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT major FROM resumes WHERE is_active = 1 ORDER BY major",
        )
        .fetch_all(&self.db)
        .await?;

        let graduation_years = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT graduation_year FROM resumes WHERE is_active = 1 ORDER BY graduation_year",
        )
        .fetch_all(&self.db)
        .await?;

        let companies = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT c.name FROM companies c
            JOIN resume_companies rc ON rc.company_id = c.id
            JOIN resumes r ON r.id = rc.resume_id
            WHERE r.is_active = 1
            ORDER BY c.name
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(FiltersResponse {
            majors,
            graduation_years,
            companies,
        })
    }

    pub async fn get_by_id(&self, resume_id: &str) -> Result<ResumeDetail, ApiError> {
        let mut conn = self.db.acquire().await?;
        let resume = Self::find_active(&mut conn, resume_id).await?;
        let summary = Self::summarize(&mut conn, &resume).await?;

        Ok(ResumeDetail {
            summary,
            uploaded_by: resume.uploaded_by,
            created_at: resume.created_at,
            updated_at: resume.updated_at,
        })
    }

    /// Applies non-blank fields; supplied tag lists replace the current links
    pub async fn update(
        &self,
        resume_id: &str,
        request: UpdateResumeRequest,
        rules: &NameCaseRules,
    ) -> Result<(ResumeSummary, Vec<String>), ApiError> {
        request.validate(&request).into_result()?;

        let mut tx = self.db.begin().await?;
        let current = Self::find_active(&mut tx, resume_id).await?;

        let name = normalize_text(request.name.as_deref()).unwrap_or(current.name);
        let major = normalize_text(request.major.as_deref()).unwrap_or(current.major);
        let graduation_year = non_blank(request.graduation_year.as_deref())
            .map(str::to_string)
            .unwrap_or(current.graduation_year);
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

        sqlx::query(
            "UPDATE resumes SET name = ?, major = ?, graduation_year = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&name)
        .bind(&major)
        .bind(&graduation_year)
        .bind(&now)
        .bind(resume_id)
        .execute(&mut *tx)
        .await?;

        let mut warnings = Vec::new();

        if let Some(companies) = request.companies {
            let names = normalize_companies(companies.into_entries(), rules, &mut warnings);
            replace_tags(&mut tx, TagKind::Company, resume_id, &names).await?;
        }

        if let Some(keywords) = request.keywords {
            let names = normalize_keywords(keywords.into_entries(), &mut warnings);
            replace_tags(&mut tx, TagKind::Keyword, resume_id, &names).await?;
        }

        let updated = Self::find_active(&mut tx, resume_id).await?;
        let summary = Self::summarize(&mut tx, &updated).await?;

        tx.commit().await?;

        info!(resume_id = %resume_id, "Resume updated");
        Ok((summary, warnings))
    }

    /// Soft-deletes the resume, then removes its artifact on a best-effort basis
    pub async fn delete(&self, resume_id: &str) -> Result<(), ApiError> {
        let mut conn = self.db.acquire().await?;
        let resume = Self::find_active(&mut conn, resume_id).await?;

        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        sqlx::query("UPDATE resumes SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(resume_id)
            .execute(&mut *conn)
            .await?;

        self.remove_artifact(&resume).await;

        info!(resume_id = %resume_id, "Resume deleted");
        Ok(())
    }

    /// Soft-deletes every active resume. Returns how many were deactivated.
    pub async fn delete_all(&self) -> Result<u64, ApiError> {
        let mut tx = self.db.begin().await?;

        let resumes = sqlx::query_as::<_, Resume>(&format!(
            "SELECT {} FROM resumes WHERE is_active = 1",
            RESUME_COLUMNS
        ))
        .fetch_all(&mut *tx)
        .await?;

        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let result = sqlx::query("UPDATE resumes SET is_active = 0, updated_at = ? WHERE is_active = 1")
            .bind(&now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        for resume in &resumes {
            self.remove_artifact(resume).await;
        }

        warn!(count = result.rows_affected(), "All resumes deleted");
        Ok(result.rows_affected())
    }

    async fn remove_artifact(&self, resume: &Resume) {
        if let Err(e) = self.store.delete(&resume.s3_key).await {
            error!(resume_id = %resume.id, storage_key = %resume.s3_key, error = %e, "Failed to delete resume artifact");
        }
    }

    pub async fn download_url(&self, resume_id: &str) -> Result<String, ApiError> {
        let mut conn = self.db.acquire().await?;
        let resume = Self::find_active(&mut conn, resume_id).await?;

        self.store
            .signed_url(&resume.s3_key, DOWNLOAD_URL_TTL)
            .await
            .map_err(|e| {
                error!(resume_id = %resume_id, error = %e, "Failed to create download link");
                ApiError::StorageError("Failed to create download link".to_string())
            })
    }

    pub async fn list_tags(&self, kind: TagKind) -> Result<Vec<String>, ApiError> {
        let names = sqlx::query_scalar::<_, String>(&format!(
            "SELECT name FROM {} ORDER BY name COLLATE NOCASE",
            kind.table()
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(names)
    }

    /// Looks up or creates a single tag after normalizing its name
    pub async fn create_tag(
        &self,
        kind: TagKind,
        name: &str,
        rules: &NameCaseRules,
    ) -> Result<Tag, ApiError> {
        validate_tag_name(name).into_result()?;

        let mut ignored = Vec::new();
        let normalized = match kind {
            TagKind::Company => normalize_companies(vec![name.to_string()], rules, &mut ignored),
            TagKind::Keyword => normalize_keywords(vec![name.to_string()], &mut ignored),
        };
        let name = normalized
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::ValidationError("name: Name is required".to_string()))?;

        let mut conn = self.db.acquire().await?;
        let (id, name) = ensure_tag(&mut conn, kind, &name).await?;

        info!(tag_id = %id, table = kind.table(), "Tag ensured");
        Ok(Tag { id, name })
    }
}
