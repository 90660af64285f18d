//! # Storage backends
//!
//! Configuration and unification for the storage backends, and the
//! cursor-following listing loop which turns a driver's bounded pages into
//! one complete key listing.

use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "local")]
use camino::Utf8PathBuf;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "b2")]
pub(crate) mod b2;

#[cfg(feature = "local")]
pub(crate) mod local;

pub(crate) mod memory;

#[cfg(feature = "b2")]
#[doc(inline)]
pub use b2::{B2ApplicationKey, B2Driver, B2_DEFAULT_ENDPOINT};

#[cfg(feature = "local")]
#[doc(inline)]
pub use local::LocalDriver;

#[doc(inline)]
pub use memory::MemoryStorage;

#[doc(inline)]
pub use storage_driver::{Driver, ListCursor, ListPage, StorageError, StorageErrorKind};

/// Page size used by the bundled drivers when none is configured.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Storage backend selection, as read from a configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageConfig {
    /// An empty in-memory bucket.
    Memory {
        /// Name of the bucket to create.
        bucket: String,
    },

    /// Buckets are directories below `path`.
    #[cfg(feature = "local")]
    Local {
        /// Root directory holding one directory per bucket.
        path: Utf8PathBuf,
    },

    /// A Backblaze B2 account, authorized with the given application key.
    #[cfg(feature = "b2")]
    B2(B2ApplicationKey),

    /// A Backblaze B2 account, with the key read from `B2_KEY_ID` and `B2_KEY`.
    #[cfg(feature = "b2")]
    #[serde(alias = "b2env")]
    B2Env,
}

impl StorageConfig {
    /// Construct the configured storage backend.
    #[tracing::instrument]
    pub fn build(self) -> Result<Storage, StorageError> {
        let client: Storage = match self {
            StorageConfig::Memory { bucket } => MemoryStorage::with_buckets(&[&bucket]).into(),
            #[cfg(feature = "local")]
            StorageConfig::Local { path } => LocalDriver::new(path).into(),
            #[cfg(feature = "b2")]
            StorageConfig::B2(key) => B2Driver::new(key)?.into(),
            #[cfg(feature = "b2")]
            StorageConfig::B2Env => {
                let key = B2ApplicationKey::from_env().map_err(|err| {
                    StorageError::builder("B2", StorageErrorKind::PermissionDenied, err)
                        .context("reading B2_KEY_ID and B2_KEY")
                        .build()
                })?;
                B2Driver::new(key)?.into()
            }
        };
        Ok(client)
    }
}

pub(crate) type ArcDriver = Arc<dyn Driver + Send + Sync>;

/// A cloneable, read-only handle to a storage driver.
///
/// Every backend call made through this handle is bounded by the configured
/// timeout, if any.
#[derive(Debug, Clone)]
pub struct Storage {
    driver: ArcDriver,
    timeout: Option<Duration>,
}

impl<D> From<D> for Storage
where
    D: Driver + Send + Sync + 'static,
{
    fn from(value: D) -> Self {
        Storage::new(value)
    }
}

impl Storage {
    /// Wrap a driver, with no per-call timeout.
    pub fn new<D: Driver + Send + Sync + 'static>(driver: D) -> Self {
        Self {
            driver: Arc::new(driver),
            timeout: None,
        }
    }

    /// Bound every individual backend call by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The per-call timeout, if one is set.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The name of the underlying driver.
    pub fn name(&self) -> &str {
        self.driver.name()
    }

    /// A handle scoped to a single bucket.
    pub fn bucket<S: Into<String>>(&self, bucket: S) -> StorageBucket {
        StorageBucket {
            storage: self.clone(),
            bucket: bucket.into(),
        }
    }

    /// List every key in `bucket` under `prefix`.
    ///
    /// Pages are requested one after another until the driver stops handing
    /// back a cursor. Any failure aborts the whole listing, and so does
    /// cancelling `cancel`; no partial listing is ever returned.
    #[tracing::instrument(skip(self, cancel), fields(driver=self.driver.name()))]
    pub async fn list(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut cursor: Option<ListCursor> = None;
        let mut pages = 0usize;

        loop {
            let page = self.list_page(bucket, prefix, cursor.as_ref(), cancel).await?;
            pages += 1;
            tracing::trace!(
                page = pages,
                keys = page.keys.len(),
                more = page.has_more(),
                "listed page"
            );

            keys.extend(page.keys);

            match page.next {
                Some(next) if cursor.as_ref() == Some(&next) => {
                    return Err(StorageError::builder(
                        self.driver.name(),
                        StorageErrorKind::InvalidRequest,
                        format!("listing cursor did not advance past {next}"),
                    )
                    .bucket(bucket)
                    .path(prefix.unwrap_or_default())
                    .build());
                }
                Some(next) => cursor = Some(next),
                None => break,
            };
        }

        tracing::debug!(pages, keys = keys.len(), "listing complete");
        Ok(keys)
    }

    /// Fetch a single page, bounded by the timeout and by `cancel`.
    async fn list_page(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        cursor: Option<&ListCursor>,
        cancel: &CancellationToken,
    ) -> Result<ListPage, StorageError> {
        let engine = self.driver.name();
        let request = async {
            let page = self.driver.list_page(bucket, prefix, cursor);
            match self.timeout {
                Some(timeout) => match tokio::time::timeout(timeout, page).await {
                    Ok(page) => page,
                    Err(elapsed) => Err(StorageError::builder(
                        engine,
                        StorageErrorKind::TimedOut,
                        elapsed,
                    )
                    .bucket(bucket)
                    .path(prefix.unwrap_or_default())
                    .context(format!("list page after {timeout:?}"))
                    .build()),
                },
                None => page.await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StorageError::builder(
                engine,
                StorageErrorKind::Cancelled,
                "listing abandoned by caller",
            )
            .bucket(bucket)
            .path(prefix.unwrap_or_default())
            .build()),
            page = request => page,
        }
    }
}

/// A [`Storage`] handle bound to one bucket.
#[derive(Debug, Clone)]
pub struct StorageBucket {
    /// The bucket name.
    pub bucket: String,
    storage: Storage,
}

impl StorageBucket {
    /// List every key in this bucket under `prefix`. See [`Storage::list`].
    #[tracing::instrument(skip(self, cancel), fields(driver=self.storage.name(), bucket=%self.bucket))]
    pub async fn list(
        &self,
        prefix: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, StorageError> {
        self.storage.list(&self.bucket, prefix, cancel).await
    }
}
