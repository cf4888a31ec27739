//! S3-compatible object store adapter
//!
//! Works against AWS S3 and S3-compatible services (Alibaba OSS, MinIO,
//! Wasabi, ...). Conditional creates are sent as `If-None-Match: *`; stores
//! that ignore the header must be configured with `conditional_writes: false`
//! so the lock refuses to run on them.

use crate::error::{Error, Result};
use crate::object::{ListPage, ListRequest, ObjectMeta, ObjectStore, PutMode};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::{ByteStream, DateTime as S3DateTime};
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use keyhold_core::StorageConfig;
use tracing::debug;

/// Provider name attached to static credentials
const STATIC_CREDENTIALS_PROVIDER: &str = "keyhold-static";

/// Error codes S3-compatible services return when `If-None-Match` fails
const PRECONDITION_CODES: &[&str] = &[
    "PreconditionFailed",
    "ObjectAlreadyExists",
    "FileAlreadyExists",
    "ConditionalRequestConflict",
];

/// Error codes for a missing object or bucket entry
const NOT_FOUND_CODES: &[&str] = &["NoSuchKey", "NotFound"];

/// Object store backed by an S3 bucket
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    conditional_writes: bool,
}

impl S3ObjectStore {
    /// Create a store from configuration
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        config.validate()?;
        let client = Self::create_client(config).await;

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
            conditional_writes: config.conditional_writes,
        })
    }

    /// Wrap an already configured client
    pub fn from_client(client: Client, bucket: impl Into<String>, conditional_writes: bool) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            conditional_writes,
        }
    }

    async fn create_client(config: &StorageConfig) -> Client {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let Some((access_key_id, access_key_secret)) = config.static_credentials() {
            debug!("Using static credentials for bucket {}", config.bucket);
            loader = loader.credentials_provider(Credentials::new(
                access_key_id,
                access_key_secret,
                None,
                None,
                STATIC_CREDENTIALS_PROVIDER,
            ));
        }

        let sdk_config = loader.load().await;
        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config);

        if let Some(endpoint_url) = config.endpoint_url() {
            debug!("Using custom S3 endpoint: {}", endpoint_url);
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint_url)
                .force_path_style(config.force_path_style);
        }

        Client::from_conf(s3_config_builder.build())
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Check if the bucket exists and is accessible
    pub async fn check_bucket(&self) -> Result<bool> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                debug!("Bucket {} is accessible", self.bucket);
                Ok(true)
            }
            Err(e) => {
                if is_not_found(&e) {
                    debug!("Bucket {} does not exist", self.bucket);
                    Ok(false)
                } else {
                    Err(Error::transient("head_bucket", self.bucket.clone(), e))
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>, mode: PutMode) -> Result<()> {
        debug!(
            "Uploading ({} bytes, {:?}): s3://{}/{}",
            body.len(),
            mode,
            self.bucket,
            key
        );

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body));

        if mode == PutMode::CreateNew {
            request = request.if_none_match("*");
        }

        match request.send().await {
            Ok(_) => Ok(()),
            Err(e) if mode == PutMode::CreateNew && is_precondition_failed(&e) => {
                Err(Error::already_exists(key))
            }
            Err(e) => Err(Error::transient("put", key, e)),
        }
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        debug!("Downloading: s3://{}/{}", self.bucket, key);

        let resp = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) if is_not_found(&e) => return Err(Error::not_found(key)),
            Err(e) => return Err(Error::transient("get", key, e)),
        };

        let body = resp
            .body
            .collect()
            .await
            .map_err(|e| Error::transient("read", key, e))?;

        Ok(body.into_bytes().to_vec())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        debug!("Deleting: s3://{}/{}", self.bucket, key);

        match self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Err(Error::not_found(key)),
            Err(e) => Err(Error::transient("delete", key, e)),
        }
    }

    async fn head(&self, key: &str) -> Result<ObjectMeta> {
        let resp = match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) if is_not_found(&e) => return Err(Error::not_found(key)),
            Err(e) => return Err(Error::transient("head", key, e)),
        };

        let last_modified = resp.last_modified.and_then(to_chrono).unwrap_or_else(|| {
            debug!("No Last-Modified for {}, using current time", key);
            Utc::now()
        });

        Ok(ObjectMeta {
            last_modified,
            size: resp.content_length.unwrap_or(0).max(0) as u64,
        })
    }

    async fn list_page(
        &self,
        request: &ListRequest,
        continuation: Option<String>,
    ) -> Result<ListPage> {
        debug!(
            "Listing s3://{}/{} (delimiter: {:?})",
            self.bucket, request.prefix, request.delimiter
        );

        let mut list = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&request.prefix);

        if let Some(delimiter) = &request.delimiter {
            list = list.delimiter(delimiter);
        }
        if let Some(token) = continuation {
            list = list.continuation_token(token);
        }

        let resp = list
            .send()
            .await
            .map_err(|e| Error::transient("list", request.prefix.clone(), e))?;

        let keys = resp
            .contents
            .unwrap_or_default()
            .into_iter()
            .filter_map(|object| object.key)
            .collect();

        let next_token = if resp.is_truncated == Some(true) {
            resp.next_continuation_token
        } else {
            None
        };

        Ok(ListPage { keys, next_token })
    }

    fn supports_conditional_put(&self) -> bool {
        self.conditional_writes
    }

    fn name(&self) -> &'static str {
        "s3"
    }
}

impl std::fmt::Debug for S3ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ObjectStore")
            .field("bucket", &self.bucket)
            .field("conditional_writes", &self.conditional_writes)
            .finish_non_exhaustive()
    }
}

fn is_not_found<E: ProvideErrorMetadata>(err: &SdkError<E, HttpResponse>) -> bool {
    matches_error(err, NOT_FOUND_CODES, 404)
}

fn is_precondition_failed<E: ProvideErrorMetadata>(err: &SdkError<E, HttpResponse>) -> bool {
    matches_error(err, PRECONDITION_CODES, 412)
}

fn matches_error<E: ProvideErrorMetadata>(
    err: &SdkError<E, HttpResponse>,
    codes: &[&str],
    status: u16,
) -> bool {
    classify(
        err.code(),
        err.raw_response().map(|resp| resp.status().as_u16()),
        codes,
        status,
    )
}

/// Match on the service error code first, the HTTP status second
///
/// HEAD responses carry no body, so their code is often missing.
fn classify(code: Option<&str>, status: Option<u16>, codes: &[&str], expected: u16) -> bool {
    match code {
        Some(code) if codes.contains(&code) => true,
        _ => status == Some(expected),
    }
}

fn to_chrono(value: S3DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value.secs(), value.subsec_nanos())
}
