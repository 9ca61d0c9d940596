// src/services/aws.rs
//! S3 access for resume artifacts. Credentials, region, bucket and the
//! optional CloudFront domain are read from settings on every call so
//! changes take effect without a restart.

use crate::services::settings::{SettingsError, SettingsService};
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Error)]
pub enum AWSError {
    #[error("AWS credentials not configured")]
    NotConfigured,

    #[error("S3 operation failed: {0}")]
    S3Error(String),

    #[error("Settings error: {0}")]
    SettingsError(#[from] SettingsError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone)]
pub struct AWSConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub s3_bucket_name: String,
    pub cloudfront_domain: Option<String>,
}

impl AWSConfig {
    fn from_settings(mut values: HashMap<String, Option<String>>) -> Result<Self, AWSError> {
        let mut take = |key: &str| values.remove(key).flatten().filter(|v| !v.trim().is_empty());

        Ok(Self {
            access_key_id: take("aws_access_key_id").ok_or(AWSError::NotConfigured)?,
            secret_access_key: take("aws_secret_access_key").ok_or(AWSError::NotConfigured)?,
            region: take("aws_region").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            s3_bucket_name: take("aws_s3_bucket_name").unwrap_or_default(),
            cloudfront_domain: take("aws_cloudfront_domain"),
        })
    }

    /// Public URL of `key`, through CloudFront when requested and configured
    pub fn object_url(&self, key: &str, use_cloudfront: bool) -> String {
        match (&self.cloudfront_domain, use_cloudfront) {
            (Some(domain), true) => format!("https://{}/{}", domain, key),
            _ => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.s3_bucket_name, self.region, key
            ),
        }
    }
}

/// Client bound to the configured bucket
struct BucketClient {
    client: S3Client,
    config: AWSConfig,
}

impl BucketClient {
    fn bucket(&self) -> &str {
        &self.config.s3_bucket_name
    }
}

#[derive(Debug)]
pub struct AWSService {
    settings_service: Arc<SettingsService>,
}

impl AWSService {
    pub fn new(settings_service: Arc<SettingsService>) -> Self {
        Self { settings_service }
    }

    pub async fn get_config(&self) -> Result<AWSConfig, AWSError> {
        let values = self
            .settings_service
            .get_settings(&[
                "aws_access_key_id",
                "aws_secret_access_key",
                "aws_region",
                "aws_s3_bucket_name",
                "aws_cloudfront_domain",
            ])
            .await?;

        AWSConfig::from_settings(values)
    }

    async fn bucket_client(&self) -> Result<BucketClient, AWSError> {
        let config = self.get_config().await?;

        if config.s3_bucket_name.is_empty() {
            return Err(AWSError::InvalidConfig(
                "S3 bucket name not configured".to_string(),
            ));
        }

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "system_settings",
        );

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        debug!(bucket = %config.s3_bucket_name, region = %config.region, "S3 client ready");
        Ok(BucketClient {
            client: S3Client::new(&sdk_config),
            config,
        })
    }

    /// Puts the object and returns its public URL
    pub async fn upload_file(
        &self,
        data: Bytes,
        key: &str,
        content_type: &str,
    ) -> Result<String, AWSError> {
        let target = self.bucket_client().await?;
        let size = data.len();

        target
            .client
            .put_object()
            .bucket(target.bucket())
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, key = %key, "S3 put failed");
                AWSError::S3Error(format!("Upload failed: {}", e))
            })?;

        info!(key = %key, bucket = %target.bucket(), bytes = size, "Object stored in S3");
        Ok(target.config.object_url(key, true))
    }

    pub async fn delete_file(&self, key: &str) -> Result<(), AWSError> {
        let target = self.bucket_client().await?;

        target
            .client
            .delete_object()
            .bucket(target.bucket())
            .key(key)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, key = %key, "S3 delete failed");
                AWSError::S3Error(format!("Delete failed: {}", e))
            })?;

        info!(key = %key, bucket = %target.bucket(), "Object deleted from S3");
        Ok(())
    }

    /// Time-limited GET URL for a private object
    pub async fn presigned_get_url(&self, key: &str, expires_in: Duration) -> Result<String, AWSError> {
        let target = self.bucket_client().await?;

        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| AWSError::InvalidConfig(format!("Invalid presign expiry: {}", e)))?;

        let request = target
            .client
            .get_object()
            .bucket(target.bucket())
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| {
                error!(error = %e, key = %key, "S3 presign failed");
                AWSError::S3Error(format!("Presign failed: {}", e))
            })?;

        Ok(request.uri().to_string())
    }
}
