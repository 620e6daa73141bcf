//! S3 object store implementation with paginated listing

use crate::{ObjectRecord, ObjectStore, ObjectStoreError};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::get_object::GetObjectError;
use chrono::{DateTime, Utc};
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Connection options for an S3 bucket.
#[derive(Debug, Clone)]
pub struct S3Options {
    /// Bucket name
    pub bucket: String,
    /// AWS region
    pub region: String,
    /// Endpoint override for S3-compatible stores (MinIO, LocalStack, ...)
    pub endpoint: Option<String>,
    /// Use path-style addressing instead of virtual-hosted style
    pub path_style: bool,
    /// Shared config profile to load credentials from
    pub profile: Option<String>,
}

impl S3Options {
    /// Options for `bucket` in `region` with default addressing and credentials.
    pub fn new(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            endpoint: None,
            path_style: false,
            profile: None,
        }
    }
}

/// Shared S3 client for efficient operations
///
/// Creating an S3 client is relatively expensive, so this struct allows
/// reusing the client across every listing and download of a run.
pub struct S3Client {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Client {
    /// Create a new S3 client from AWS config
    pub async fn new(options: S3Options) -> Self {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(options.region));
        if let Some(profile) = &options.profile {
            loader = loader.profile_name(profile);
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &options.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        if options.path_style {
            builder = builder.force_path_style(true);
        }

        Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            bucket: options.bucket,
        }
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    /// List all objects under a prefix (recursive)
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<ObjectRecord>, ObjectStoreError> {
        let bucket = self.bucket.as_str();
        let mut results = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .set_prefix(prefix.map(str::to_string));

            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(|e| ObjectStoreError::List {
                bucket: bucket.to_string(),
                message: explain_list_error(&DisplayErrorContext(&e).to_string(), bucket),
            })?;

            if let Some(contents) = response.contents {
                for object in contents {
                    let Some(key) = object.key else { continue };

                    // Skip "directory" markers (keys ending with /)
                    if key.ends_with('/') {
                        continue;
                    }

                    let last_modified = object
                        .last_modified
                        .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
                        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

                    results.push(ObjectRecord {
                        key,
                        size: object.size.unwrap_or_default(),
                        last_modified,
                    });
                }
            }

            // Handle pagination
            if response.is_truncated == Some(true) {
                continuation_token = response.next_continuation_token;
                if continuation_token.is_none() {
                    break;
                }
            } else {
                break;
            }
        }

        tracing::debug!(
            bucket = %bucket,
            prefix = prefix.unwrap_or_default(),
            "Listed {} objects",
            results.len()
        );

        Ok(results)
    }

    async fn fetch_to(&self, key: &str, dest: &Path) -> Result<u64, ObjectStoreError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let missing = e.as_service_error().is_some_and(GetObjectError::is_no_such_key)
                    || e.raw_response().map(|r| r.status().as_u16()) == Some(404);
                if missing {
                    ObjectStoreError::NotFound {
                        bucket: self.bucket.clone(),
                        key: key.to_string(),
                    }
                } else {
                    ObjectStoreError::Get {
                        key: key.to_string(),
                        message: DisplayErrorContext(&e).to_string(),
                    }
                }
            })?;

        let io_err = |source| ObjectStoreError::Io {
            path: dest.to_path_buf(),
            source,
        };

        let mut file = tokio::fs::File::create(dest).await.map_err(io_err)?;
        let mut body = response.body.into_async_read();
        let written = tokio::io::copy(&mut body, &mut file)
            .await
            .map_err(|e| ObjectStoreError::Get {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        file.flush().await.map_err(io_err)?;

        Ok(written)
    }
}

/// Wrap common S3 listing failures with actionable context.
pub fn explain_list_error(message: &str, bucket: &str) -> String {
    let lower = message.to_lowercase();
    if lower.contains("accessdenied") || lower.contains("403") {
        return format!(
            "access denied for bucket {bucket:?}: verify IAM permissions (s3:ListBucket, s3:GetObject) -- original error: {message}"
        );
    }
    if lower.contains("nosuchbucket") || lower.contains("404") {
        return format!(
            "bucket not found: {bucket:?} -- verify the bucket name and region -- original error: {message}"
        );
    }
    message.to_string()
}
