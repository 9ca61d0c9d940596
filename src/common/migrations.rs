// src/common/migrations.rs
//! Database migration and schema management

use sqlx::SqlitePool;
use std::env;
use tracing::{info, warn};

/// Run all database migrations
///
/// Tables are created if they don't exist. Setting `RESET_DB=true` drops
/// everything first.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let should_reset_db = env::var("RESET_DB").unwrap_or_else(|_| "false".to_string()) == "true";

    if should_reset_db {
        warn!("RESET_DB=true - dropping all tables and recreating schema");
        drop_all_tables(pool).await?;
    } else {
        info!("Skipping table drop (RESET_DB not set)");
    }

    create_schema(pool).await?;
    init_default_settings(pool).await?;

    info!("Database migration completed");
    Ok(())
}

/// Create every table and index. Idempotent.
pub async fn create_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    create_resume_tables(pool).await?;
    create_tag_tables(pool).await?;
    create_system_tables(pool).await?;
    create_indexes(pool).await?;
    Ok(())
}

/// Initialize default system settings from environment variables
/// Only sets values if they don't already exist in the database
async fn init_default_settings(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let aws_settings = vec![
        ("aws_access_key_id", "AWS_ACCESS_KEY_ID"),
        ("aws_secret_access_key", "AWS_SECRET_ACCESS_KEY"),
        ("aws_region", "AWS_REGION"),
        ("aws_s3_bucket_name", "AWS_S3_BUCKET_NAME"),
        ("aws_cloudfront_domain", "AWS_CLOUDFRONT_DOMAIN"),
    ];

    let other_settings = vec![
        ("openai_api_key", "OPENAI_API_KEY"),
        ("openai_base_url", "OPENAI_BASE_URL"),
        ("openai_model_resume_parsing", "OPENAI_MODEL"),
        ("storage_type", "STORAGE_TYPE"),
        ("company_abbreviations", "COMPANY_ABBREVIATIONS"),
        ("company_minor_words", "COMPANY_MINOR_WORDS"),
    ];

    let all_settings: Vec<_> = aws_settings.into_iter().chain(other_settings).collect();

    for (db_key, env_key) in all_settings {
        let Ok(value) = env::var(env_key) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }

        let result = sqlx::query(
            r#"
            INSERT INTO system_settings (key, value, updated_at, updated_by)
            VALUES (?, ?, datetime('now'), 'system')
            ON CONFLICT(key) DO NOTHING
            "#,
        )
        .bind(db_key)
        .bind(&value)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            info!(key = %db_key, "Initialized setting from environment variable");
        }
    }

    // Default storage type: S3 when AWS credentials exist, otherwise local disk
    let storage_type: Option<(String,)> =
        sqlx::query_as("SELECT value FROM system_settings WHERE key = 'storage_type'")
            .fetch_optional(pool)
            .await?;

    if storage_type.is_none() {
        let aws_key: Option<(String,)> =
            sqlx::query_as("SELECT value FROM system_settings WHERE key = 'aws_access_key_id'")
                .fetch_optional(pool)
                .await?;

        let default_storage = if aws_key.is_some() { "s3" } else { "local" };

        sqlx::query(
            r#"
            INSERT INTO system_settings (key, value, updated_at, updated_by)
            VALUES ('storage_type', ?, datetime('now'), 'system')
            "#,
        )
        .bind(default_storage)
        .execute(pool)
        .await?;

        info!(storage_type = %default_storage, "Set default storage type");
    }

    Ok(())
}

async fn drop_all_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    // Reverse dependency order
    let tables = [
        "resume_keywords",
        "resume_companies",
        "keywords",
        "companies",
        "resumes",
        "system_settings",
    ];

    for table in tables {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
            .execute(pool)
            .await?;
    }

    Ok(())
}

async fn create_resume_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS resumes (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            major TEXT NOT NULL,
            graduation_year TEXT NOT NULL,
            pdf_url TEXT NOT NULL,
            s3_key TEXT NOT NULL,
            uploaded_by TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_tag_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS companies (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE COLLATE NOCASE,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS keywords (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE COLLATE NOCASE,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS resume_companies (
            resume_id TEXT NOT NULL,
            company_id TEXT NOT NULL,
            PRIMARY KEY (resume_id, company_id),
            FOREIGN KEY(resume_id) REFERENCES resumes(id) ON DELETE CASCADE,
            FOREIGN KEY(company_id) REFERENCES companies(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS resume_keywords (
            resume_id TEXT NOT NULL,
            keyword_id TEXT NOT NULL,
            PRIMARY KEY (resume_id, keyword_id),
            FOREIGN KEY(resume_id) REFERENCES resumes(id) ON DELETE CASCADE,
            FOREIGN KEY(keyword_id) REFERENCES keywords(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_system_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS system_settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            description TEXT,
            updated_at TEXT DEFAULT (datetime('now')),
            updated_by TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_indexes(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_resumes_active_created ON resumes(is_active, created_at)",
        "CREATE INDEX IF NOT EXISTS idx_resumes_major ON resumes(major)",
        "CREATE INDEX IF NOT EXISTS idx_resumes_graduation_year ON resumes(graduation_year)",
        "CREATE INDEX IF NOT EXISTS idx_resume_companies_company ON resume_companies(company_id)",
        "CREATE INDEX IF NOT EXISTS idx_resume_keywords_keyword ON resume_keywords(keyword_id)",
    ];

    for index in indexes {
        sqlx::query(index).execute(pool).await?;
    }

    Ok(())
}
