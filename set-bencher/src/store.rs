//! Object-store access used by the I/O task and by test object provisioning.
//!
//! [`ObjectStore`] is the seam between the I/O benchmark and the storage service. The production
//! implementation is [`S3Store`], which speaks the S3 protocol to any compatible endpoint with
//! static credentials. [`InMemoryStore`] keeps objects in a `HashMap` and is used in tests and for
//! local dry runs.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, BucketConfiguration, Region};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::job::IoTask;

/// Content type of every object written by the benchmark.
pub const CONTENT_TYPE: &str = "application/octet-stream";

/// Region used when none is configured. Most S3-compatible stores accept any value.
pub const DEFAULT_REGION: &str = "auto";

/// Errors returned by [`ObjectStore`] operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The connection parameters could not be turned into a client.
    #[error("invalid store configuration: {0}")]
    Config(String),

    /// Any error returned by the S3 client, including non-success responses.
    #[error("s3 error: {context}")]
    S3 {
        /// The operation that failed.
        context: String,
        /// The client error.
        #[source]
        cause: S3Error,
    },

    /// The store did not report a size for an object.
    #[error("object `{0}` has no content length")]
    MissingLength(String),

    /// The requested object does not exist.
    #[error("object `{0}` not found")]
    NotFound(String),

    /// A write was rejected by the store.
    #[error("write of `{0}` rejected")]
    Rejected(String),

    /// The bucket could not be created.
    #[error("creation of bucket `{0}` rejected")]
    BucketRejected(String),

    /// Reading an upload body failed.
    #[error("failed to read body of `{key}`")]
    Body {
        /// Key the body was meant for.
        key: String,
        /// The reader error.
        #[source]
        cause: std::io::Error,
    },
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A type-erased [`ObjectStore`] instance.
pub type BoxedStore = Box<dyn ObjectStore>;

/// A readable upload body of unknown length.
pub type BodyReader<'a> = &'a mut (dyn AsyncRead + Unpin + Send);

/// Minimal object-store protocol needed by the benchmark.
#[async_trait::async_trait]
pub trait ObjectStore: fmt::Debug + Send + Sync {
    /// The store name, used for diagnostics.
    fn name(&self) -> &'static str;

    /// Returns the size of the object in bytes.
    async fn head(&self, key: &str) -> StoreResult<u64>;

    /// Reads `len` bytes starting at `start`, drains the body and returns the number of bytes
    /// received.
    async fn get_range(&self, key: &str, start: u64, len: u64) -> StoreResult<u64>;

    /// Writes `body` under `key`.
    async fn put(&self, key: &str, body: Bytes) -> StoreResult<()>;

    /// Creates the bucket the store is bound to.
    async fn create_bucket(&self) -> StoreResult<()>;

    /// Streams the contents of `reader` into an object under `key`.
    async fn put_stream(&self, key: &str, reader: BodyReader<'_>) -> StoreResult<()>;
}

/// Connection parameters of an S3-compatible store.
#[derive(Clone, Debug, Default)]
pub struct StoreConfig {
    /// Endpoint, with or without a scheme.
    pub endpoint: String,
    /// Bucket all operations are bound to.
    pub bucket: String,
    /// Signing region, [`DEFAULT_REGION`] when absent.
    pub region: Option<String>,
    /// Static access key id.
    pub access_key: String,
    /// Static secret access key.
    pub secret_key: String,
    /// Use `http` for endpoints without a scheme.
    pub disable_ssl: bool,
    /// Address the bucket as a path segment instead of a subdomain.
    pub path_style: bool,
}

impl StoreConfig {
    /// Returns the endpoint URL, adding a scheme if the configured endpoint has none.
    pub fn endpoint_url(&self) -> String {
        if self.endpoint.contains("://") {
            return self.endpoint.clone();
        }
        let scheme = if self.disable_ssl { "http" } else { "https" };
        format!("{scheme}://{}", self.endpoint)
    }
}

impl From<&IoTask> for StoreConfig {
    fn from(task: &IoTask) -> Self {
        Self {
            endpoint: task.endpoint.clone(),
            bucket: task.bucket.clone(),
            region: task.region.clone(),
            access_key: task.key_id.clone(),
            secret_key: task.key_secret.clone(),
            disable_ssl: task.disable_ssl,
            path_style: task.path_style,
        }
    }
}

/// An [`ObjectStore`] backed by an S3-compatible service.
pub struct S3Store {
    bucket: Box<Bucket>,
    region: Region,
    credentials: Credentials,
    path_style: bool,
}

impl S3Store {
    /// Creates a client bound to the configured bucket. No request is sent.
    pub fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let credentials = Credentials::new(
            Some(config.access_key.as_str()),
            Some(config.secret_key.as_str()),
            None,
            None,
            None,
        )
        .map_err(|err| StoreError::Config(err.to_string()))?;

        let region = Region::Custom {
            region: config
                .region
                .clone()
                .unwrap_or_else(|| DEFAULT_REGION.to_owned()),
            endpoint: config.endpoint_url(),
        };

        let mut bucket = Bucket::new(&config.bucket, region.clone(), credentials.clone())
            .map_err(|cause| StoreError::S3 {
                context: format!("failed to configure bucket `{}`", config.bucket),
                cause,
            })?;
        if config.path_style {
            bucket = bucket.with_path_style();
        }

        Ok(Self {
            bucket,
            region,
            credentials,
            path_style: config.path_style,
        })
    }
}

impl fmt::Debug for S3Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Store")
            .field("bucket", &self.bucket.name())
            .field("endpoint", &self.bucket.host())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3Store {
    fn name(&self) -> &'static str {
        "s3-compatible"
    }

    async fn head(&self, key: &str) -> StoreResult<u64> {
        let (head, _status) =
            self.bucket
                .head_object(key)
                .await
                .map_err(|cause| StoreError::S3 {
                    context: format!("failed to head `{key}`"),
                    cause,
                })?;

        head.content_length
            .and_then(|len| u64::try_from(len).ok())
            .ok_or_else(|| StoreError::MissingLength(key.to_owned()))
    }

    async fn get_range(&self, key: &str, start: u64, len: u64) -> StoreResult<u64> {
        // the end of an HTTP range is inclusive
        let end = start + len.saturating_sub(1);
        let response = self
            .bucket
            .get_object_range(key, start, Some(end))
            .await
            .map_err(|cause| StoreError::S3 {
                context: format!("failed to read `{key}` [{start}-{end}]"),
                cause,
            })?;

        Ok(response.bytes().len() as u64)
    }

    async fn put(&self, key: &str, body: Bytes) -> StoreResult<()> {
        self.bucket
            .put_object_with_content_type(key, &body, CONTENT_TYPE)
            .await
            .map_err(|cause| StoreError::S3 {
                context: format!("failed to write `{key}`"),
                cause,
            })?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip_all, fields(bucket = %self.bucket.name()))]
    async fn create_bucket(&self) -> StoreResult<()> {
        let name = self.bucket.name();
        let config = BucketConfiguration::default();
        let result = if self.path_style {
            Bucket::create_with_path_style(
                &name,
                self.region.clone(),
                self.credentials.clone(),
                config,
            )
            .await
        } else {
            Bucket::create(&name, self.region.clone(), self.credentials.clone(), config).await
        };

        result.map_err(|cause| StoreError::S3 {
            context: format!("failed to create bucket `{name}`"),
            cause,
        })?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip_all, fields(%key))]
    async fn put_stream(&self, key: &str, mut reader: BodyReader<'_>) -> StoreResult<()> {
        self.bucket
            .put_object_stream_with_content_type(&mut reader, key, CONTENT_TYPE)
            .await
            .map_err(|cause| StoreError::S3 {
                context: format!("failed to upload `{key}`"),
                cause,
            })?;
        Ok(())
    }
}

/// An [`ObjectStore`] keeping all objects in memory.
///
/// The store is [`Clone`] so tests can keep a handle for inspection while the task under test
/// borrows another.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    objects: Arc<Mutex<HashMap<String, Bytes>>>,
    ranges: Arc<Mutex<Vec<(String, u64, u64)>>>,
    reject_writes: Arc<AtomicBool>,
    reject_bucket: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an object directly, bypassing the [`ObjectStore`] trait.
    pub fn insert(&self, key: impl Into<String>, body: impl Into<Bytes>) {
        self.objects
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .insert(key.into(), body.into());
    }

    /// Returns a copy of the stored object, if present.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.objects
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .get(key)
            .cloned()
    }

    /// Returns the number of stored objects.
    pub fn len(&self) -> usize {
        self.objects
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .len()
    }

    /// Returns `true` if no objects are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All ranges requested through [`ObjectStore::get_range`] as `(key, start, len)`.
    pub fn requested_ranges(&self) -> Vec<(String, u64, u64)> {
        self.ranges
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }

    /// Makes every subsequent write fail.
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::Relaxed);
    }

    /// Makes every subsequent bucket creation fail, like a bucket that already exists.
    pub fn reject_bucket_creation(&self, reject: bool) {
        self.reject_bucket.store(reject, Ordering::Relaxed);
    }
}

#[async_trait::async_trait]
impl ObjectStore for InMemoryStore {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn head(&self, key: &str) -> StoreResult<u64> {
        self.get(key)
            .map(|body| body.len() as u64)
            .ok_or_else(|| StoreError::NotFound(key.to_owned()))
    }

    async fn get_range(&self, key: &str, start: u64, len: u64) -> StoreResult<u64> {
        self.ranges
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push((key.to_owned(), start, len));

        let body = self
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_owned()))?;
        let start = (start as usize).min(body.len());
        let end = (start + len as usize).min(body.len());
        Ok(body.slice(start..end).len() as u64)
    }

    async fn put(&self, key: &str, body: Bytes) -> StoreResult<()> {
        if self.reject_writes.load(Ordering::Relaxed) {
            return Err(StoreError::Rejected(key.to_owned()));
        }
        self.insert(key, body);
        Ok(())
    }

    async fn create_bucket(&self) -> StoreResult<()> {
        if self.reject_bucket.load(Ordering::Relaxed) {
            return Err(StoreError::BucketRejected(self.name().to_owned()));
        }
        Ok(())
    }

    async fn put_stream(&self, key: &str, reader: BodyReader<'_>) -> StoreResult<()> {
        let mut body = Vec::new();
        reader
            .read_to_end(&mut body)
            .await
            .map_err(|cause| StoreError::Body {
                key: key.to_owned(),
                cause,
            })?;
        self.put(key, body.into()).await
    }
}
