// src/services/settings.rs
//! Runtime settings backed by the `system_settings` table.
//!
//! Lookup order is cache, then database, then the upper-cased environment
//! variable of the same name. Only database hits are cached.

use sqlx::SqlitePool;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug)]
struct CacheEntry {
    value: String,
    loaded_at: Instant,
}

#[derive(Debug)]
pub struct SettingsService {
    db: SqlitePool,
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl SettingsService {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            cache: RwLock::new(HashMap::new()),
        }
    }

    async fn cached(&self, key: &str) -> Option<String> {
        let cache = self.cache.read().await;
        cache
            .get(key)
            .filter(|entry| entry.loaded_at.elapsed() < CACHE_TTL)
            .map(|entry| entry.value.clone())
    }

    async fn load(&self, key: &str) -> Result<Option<String>, SettingsError> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM system_settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.db)
            .await?;

        if let Some(value) = &value {
            self.cache.write().await.insert(
                key.to_string(),
                CacheEntry {
                    value: value.clone(),
                    loaded_at: Instant::now(),
                },
            );
        }

        Ok(value)
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>, SettingsError> {
        if let Some(value) = self.cached(key).await {
            debug!(key = %key, source = "cache", "Setting resolved");
            return Ok(Some(value));
        }

        if let Some(value) = self.load(key).await? {
            debug!(key = %key, source = "database", "Setting resolved");
            return Ok(Some(value));
        }

        let from_env = std::env::var(key.to_uppercase()).ok();
        debug!(key = %key, found = from_env.is_some(), source = "environment", "Setting resolved");
        Ok(from_env)
    }

    /// Resolves several keys; absent ones map to `None`
    pub async fn get_settings(
        &self,
        keys: &[&str],
    ) -> Result<HashMap<String, Option<String>>, SettingsError> {
        let mut resolved = HashMap::with_capacity(keys.len());
        for key in keys {
            resolved.insert(key.to_string(), self.get_setting(key).await?);
        }
        Ok(resolved)
    }

    /// Upserts a setting and drops its cache entry
    pub async fn set_setting(
        &self,
        key: &str,
        value: &str,
        updated_by: Option<&str>,
    ) -> Result<(), SettingsError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(SettingsError::InvalidConfig(
                "Setting key must not be empty".to_string(),
            ));
        }

        sqlx::query(
            r#"
            INSERT INTO system_settings (key, value, updated_at, updated_by)
            VALUES (?1, ?2, datetime('now'), ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = ?2, updated_at = datetime('now'), updated_by = ?3
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(updated_by)
        .execute(&self.db)
        .await?;

        self.cache.write().await.remove(key);

        info!(key = %key, updated_by = ?updated_by, "Setting saved");
        Ok(())
    }
}
