//! Transactional persistence for resumes and their company/keyword tags.

use crate::common::{generate_company_id, generate_keyword_id};
use async_trait::async_trait;
use sqlx::{Connection, Sqlite, SqliteConnection, SqlitePool, Transaction};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct NewResume {
    pub id: String,
    pub name: String,
    pub major: String,
    pub graduation_year: String,
    pub pdf_url: String,
    pub s3_key: String,
    pub uploaded_by: String,
}

#[async_trait]
pub trait ResumeRepository: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn ResumeTransaction>, RepositoryError>;
}

/// One open unit of work. Dropping it without `commit` rolls back.
#[async_trait]
pub trait ResumeTransaction: Send {
    async fn create_resume(&mut self, resume: &NewResume) -> Result<(), RepositoryError>;

    /// Links the named companies, creating missing tags. Returns stored names.
    async fn associate_companies(
        &mut self,
        resume_id: &str,
        names: &[String],
    ) -> Result<Vec<String>, RepositoryError>;

    async fn associate_keywords(
        &mut self,
        resume_id: &str,
        names: &[String],
    ) -> Result<Vec<String>, RepositoryError>;

    /// A failed commit leaves nothing applied
    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Company,
    Keyword,
}

impl TagKind {
    pub fn table(&self) -> &'static str {
        match self {
            TagKind::Company => "companies",
            TagKind::Keyword => "keywords",
        }
    }

    fn join_table(&self) -> &'static str {
        match self {
            TagKind::Company => "resume_companies",
            TagKind::Keyword => "resume_keywords",
        }
    }

    fn join_column(&self) -> &'static str {
        match self {
            TagKind::Company => "company_id",
            TagKind::Keyword => "keyword_id",
        }
    }

    fn generate_id(&self) -> String {
        match self {
            TagKind::Company => generate_company_id(),
            TagKind::Keyword => generate_keyword_id(),
        }
    }
}

/// Looks up a tag by name (case-insensitive), creating it when absent
pub async fn ensure_tag(
    conn: &mut SqliteConnection,
    kind: TagKind,
    name: &str,
) -> Result<(String, String), sqlx::Error> {
    sqlx::query(&format!(
        "INSERT INTO {} (id, name) VALUES (?, ?) ON CONFLICT(name) DO NOTHING",
        kind.table()
    ))
    .bind(kind.generate_id())
    .bind(name)
    .execute(&mut *conn)
    .await?;

    sqlx::query_as::<_, (String, String)>(&format!(
        "SELECT id, name FROM {} WHERE name = ?",
        kind.table()
    ))
    .bind(name)
    .fetch_one(&mut *conn)
    .await
}

/// Adds join rows for `names`; existing links are kept
pub async fn link_tags(
    conn: &mut SqliteConnection,
    kind: TagKind,
    resume_id: &str,
    names: &[String],
) -> Result<Vec<String>, sqlx::Error> {
    let mut linked = Vec::with_capacity(names.len());

    for name in names {
        let (tag_id, stored_name) = ensure_tag(conn, kind, name).await?;

        sqlx::query(&format!(
            "INSERT OR IGNORE INTO {} (resume_id, {}) VALUES (?, ?)",
            kind.join_table(),
            kind.join_column()
        ))
        .bind(resume_id)
        .bind(&tag_id)
        .execute(&mut *conn)
        .await?;

        linked.push(stored_name);
    }

    Ok(linked)
}

/// Replaces every link of `kind` on the resume with `names`
pub async fn replace_tags(
    conn: &mut SqliteConnection,
    kind: TagKind,
    resume_id: &str,
    names: &[String],
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query(&format!(
        "DELETE FROM {} WHERE resume_id = ?",
        kind.join_table()
    ))
    .bind(resume_id)
    .execute(&mut *conn)
    .await?;

    link_tags(conn, kind, resume_id, names).await
}

/// Tag names linked to a resume, in the order they were linked
pub async fn tag_names_for(
    conn: &mut SqliteConnection,
    kind: TagKind,
    resume_id: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(&format!(
        "SELECT t.name FROM {tags} t JOIN {join} j ON j.{col} = t.id WHERE j.resume_id = ? ORDER BY j.rowid",
        tags = kind.table(),
        join = kind.join_table(),
        col = kind.join_column()
    ))
    .bind(resume_id)
    .fetch_all(&mut *conn)
    .await
}

#[derive(Debug, Clone)]
pub struct SqliteResumeRepository {
    db: SqlitePool,
}

impl SqliteResumeRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ResumeRepository for SqliteResumeRepository {
    async fn begin(&self) -> Result<Box<dyn ResumeTransaction>, RepositoryError> {
        let tx = self.db.begin().await?;
        Ok(Box::new(SqliteResumeTransaction { tx }))
    }
}

pub struct SqliteResumeTransaction {
    tx: Transaction<'static, Sqlite>,
}

impl SqliteResumeTransaction {
    /// Runs the association inside a savepoint so a failure undoes only its own writes
    async fn associate(
        &mut self,
        kind: TagKind,
        resume_id: &str,
        names: &[String],
    ) -> Result<Vec<String>, RepositoryError> {
        let mut savepoint = Connection::begin(&mut *self.tx).await?;

        match link_tags(&mut savepoint, kind, resume_id, names).await {
            Ok(linked) => {
                savepoint.commit().await?;
                Ok(linked)
            }
            Err(e) => {
                if let Err(rollback_error) = savepoint.rollback().await {
                    warn!(error = %rollback_error, table = kind.table(), "Failed to roll back tag savepoint");
                }
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl ResumeTransaction for SqliteResumeTransaction {
    async fn create_resume(&mut self, resume: &NewResume) -> Result<(), RepositoryError> {
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

        sqlx::query(
            r#"
            INSERT INTO resumes (
                id, name, major, graduation_year, pdf_url, s3_key, uploaded_by,
                is_active, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(&resume.id)
        .bind(&resume.name)
        .bind(&resume.major)
        .bind(&resume.graduation_year)
        .bind(&resume.pdf_url)
        .bind(&resume.s3_key)
        .bind(&resume.uploaded_by)
        .bind(&now)
        .bind(&now)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn associate_companies(
        &mut self,
        resume_id: &str,
        names: &[String],
    ) -> Result<Vec<String>, RepositoryError> {
        self.associate(TagKind::Company, resume_id, names).await
    }

    async fn associate_keywords(
        &mut self,
        resume_id: &str,
        names: &[String],
    ) -> Result<Vec<String>, RepositoryError> {
        self.associate(TagKind::Keyword, resume_id, names).await
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
