//! Listing keys held in a Backblaze B2 bucket, through the B2 native API.
//!
//! An account is authorized once and the authorization is reused until B2
//! reports it expired. Bucket names are resolved to bucket IDs once per bucket.

use std::collections::HashMap;
use std::env::VarError;
use std::fmt;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use storage_driver::{Driver, ListCursor, ListPage, StorageError, StorageErrorKind};

use crate::DEFAULT_PAGE_SIZE;

const B2_STORAGE_NAME: &str = "B2";

/// Host serving `b2_authorize_account`.
pub const B2_DEFAULT_ENDPOINT: &str = "https://api.backblazeb2.com";

const B2_KEY_ID_ENV: &str = "B2_KEY_ID";
const B2_KEY_ENV: &str = "B2_KEY";

/// Largest `maxFileCount` B2 accepts for one `b2_list_file_names` call.
const B2_MAX_FILE_COUNT: usize = 10_000;

/// B2 application key: a key ID and the secret key.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct B2ApplicationKey {
    key_id: String,
    key: String,
}

impl fmt::Debug for B2ApplicationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("B2ApplicationKey")
            .field("key_id", &self.key_id)
            .field("key", &"****")
            .finish()
    }
}

impl B2ApplicationKey {
    /// Create a new B2 application key.
    pub fn new(key_id: impl Into<String>, key: impl Into<String>) -> Self {
        let key_id = key_id.into();
        let key = key.into();
        if !key_id.starts_with('0') {
            tracing::warn!("B2 key id does not start with 0");
        }
        if !key.starts_with('K') {
            tracing::warn!("B2 key does not start with K");
        }
        Self { key_id, key }
    }

    /// Read the key from `B2_KEY_ID` and `B2_KEY`.
    pub fn from_env() -> Result<Self, VarError> {
        Ok(Self::new(
            std::env::var(B2_KEY_ID_ENV)?,
            std::env::var(B2_KEY_ENV)?,
        ))
    }
}

/// Response from `b2_authorize_account`.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct B2Authorization {
    account_id: String,
    authorization_token: String,
    api_url: String,
}

impl fmt::Debug for B2Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("B2Authorization")
            .field("account_id", &self.account_id)
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl B2Authorization {
    fn endpoint(&self, name: &str) -> String {
        format!("{}/b2api/v2/{name}", self.api_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BucketListBody<'a> {
    account_id: &'a str,
    bucket_name: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BucketListResponse {
    buckets: Vec<Bucket>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Bucket {
    bucket_id: String,
    bucket_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileListBody<'a> {
    bucket_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_file_name: Option<&'a str>,
    max_file_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    prefix: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    files: Vec<FileName>,
    next_file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileName {
    file_name: String,
}

/// An error body returned by the B2 API.
#[derive(Debug, Clone, Deserialize, thiserror::Error)]
#[error("{status}: {message} ({code})")]
struct B2Error {
    status: u16,
    code: String,
    message: String,
}

impl B2Error {
    fn is_expired_token(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED.as_u16() && self.code == "expired_auth_token"
    }

    fn kind(&self) -> StorageErrorKind {
        status_kind(self.status)
    }
}

/// Map a B2 response status onto a storage error kind.
fn status_kind(status: u16) -> StorageErrorKind {
    match status {
        400 => StorageErrorKind::InvalidRequest,
        401 | 403 => StorageErrorKind::PermissionDenied,
        404 => StorageErrorKind::NotFound,
        408 | 429 | 500..=599 => StorageErrorKind::ServiceUnavailable,
        _ => StorageErrorKind::Other,
    }
}

/// Storage driver listing keys in Backblaze B2 buckets.
pub struct B2Driver {
    client: reqwest::Client,
    key: B2ApplicationKey,
    endpoint: String,
    authorization: RwLock<Option<B2Authorization>>,
    buckets: RwLock<HashMap<String, String>>,
    page_size: usize,
}

impl fmt::Debug for B2Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("B2Driver")
            .field("key", &self.key)
            .field("endpoint", &self.endpoint)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl B2Driver {
    /// Create a driver for the account owning `key`.
    ///
    /// Nothing is sent to B2 until the first listing.
    pub fn new(key: B2ApplicationKey) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("provider-registry/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(StorageError::with(B2_STORAGE_NAME, StorageErrorKind::Other))?;

        Ok(Self {
            client,
            key,
            endpoint: B2_DEFAULT_ENDPOINT.to_string(),
            authorization: RwLock::new(None),
            buckets: RwLock::default(),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Authorize against a different host than [`B2_DEFAULT_ENDPOINT`].
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the maximum number of keys requested per listing page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, B2_MAX_FILE_COUNT);
        self
    }

    fn error<E>(
        &self,
        kind: StorageErrorKind,
        source: E,
        call: &str,
        bucket: &str,
        prefix: Option<&str>,
    ) -> StorageError
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        let mut builder = StorageError::builder(self.name(), kind, source)
            .bucket(bucket)
            .context(call.to_string());
        if let Some(prefix) = prefix {
            builder = builder.path(prefix);
        }
        builder.build()
    }

    fn transport_error(
        &self,
        error: reqwest::Error,
        call: &str,
        bucket: &str,
        prefix: Option<&str>,
    ) -> StorageError {
        let kind = if error.is_timeout() {
            StorageErrorKind::TimedOut
        } else if error.is_decode() {
            StorageErrorKind::Other
        } else {
            StorageErrorKind::Io
        };
        self.error(kind, error, call, bucket, prefix)
    }

    /// Decode a successful response, or the B2 error body of a failed one.
    async fn read<R: DeserializeOwned>(
        &self,
        response: reqwest::Response,
        call: &str,
        bucket: &str,
        prefix: Option<&str>,
    ) -> Result<Result<R, B2Error>, StorageError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map(Ok)
                .map_err(|err| self.transport_error(err, call, bucket, prefix));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| self.transport_error(err, call, bucket, prefix))?;
        let error = serde_json::from_slice(&body).unwrap_or_else(|_| B2Error {
            status: status.as_u16(),
            code: "unknown".to_string(),
            message: String::from_utf8_lossy(&body).into_owned(),
        });
        Ok(Err(error))
    }

    /// The cached account authorization, fetching a new one if needed.
    async fn authorization(&self, bucket: &str) -> Result<B2Authorization, StorageError> {
        if let Some(authorization) = self.authorization.read().await.as_ref() {
            return Ok(authorization.clone());
        }

        let mut slot = self.authorization.write().await;
        if let Some(authorization) = slot.as_ref() {
            return Ok(authorization.clone());
        }

        let call = "b2_authorize_account";
        tracing::debug!(key_id = %self.key.key_id, "authorizing B2 account");
        let response = self
            .client
            .get(format!("{}/b2api/v2/{call}", self.endpoint))
            .basic_auth(&self.key.key_id, Some(&self.key.key))
            .send()
            .await
            .map_err(|err| self.transport_error(err, call, bucket, None))?;

        let authorization: B2Authorization = self
            .read(response, call, bucket, None)
            .await?
            .map_err(|err| self.error(err.kind(), err, call, bucket, None))?;
        *slot = Some(authorization.clone());
        Ok(authorization)
    }

    /// POST `body` to a B2 API call, re-authorizing once if the token expired.
    async fn post<B, R>(
        &self,
        call: &str,
        body: &B,
        bucket: &str,
        prefix: Option<&str>,
    ) -> Result<R, StorageError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned + Send,
    {
        let mut reauthorized = false;
        loop {
            let authorization = self.authorization(bucket).await?;
            let response = self
                .client
                .post(authorization.endpoint(call))
                .header(
                    reqwest::header::AUTHORIZATION,
                    authorization.authorization_token.as_str(),
                )
                .json(body)
                .send()
                .await
                .map_err(|err| self.transport_error(err, call, bucket, prefix))?;

            match self.read(response, call, bucket, prefix).await? {
                Ok(value) => return Ok(value),
                Err(error) if error.is_expired_token() && !reauthorized => {
                    tracing::debug!("B2 authorization expired, re-authorizing");
                    self.authorization.write().await.take();
                    reauthorized = true;
                }
                Err(error) => return Err(self.error(error.kind(), error, call, bucket, prefix)),
            }
        }
    }

    /// Resolve a bucket name to its B2 bucket ID.
    async fn bucket_id(&self, bucket: &str) -> Result<String, StorageError> {
        if let Some(id) = self.buckets.read().await.get(bucket) {
            return Ok(id.clone());
        }

        let account_id = self.authorization(bucket).await?.account_id;
        let response: BucketListResponse = self
            .post(
                "b2_list_buckets",
                &BucketListBody {
                    account_id: &account_id,
                    bucket_name: bucket,
                },
                bucket,
                None,
            )
            .await?;

        let id = response
            .buckets
            .into_iter()
            .find(|b| b.bucket_name == bucket)
            .map(|b| b.bucket_id)
            .ok_or_else(|| {
                StorageError::builder(
                    self.name(),
                    StorageErrorKind::NotFound,
                    format!("Bucket not found: {bucket}"),
                )
                .bucket(bucket)
                .context("b2_list_buckets")
                .build()
            })?;

        self.buckets
            .write()
            .await
            .insert(bucket.to_string(), id.clone());
        Ok(id)
    }
}

#[async_trait::async_trait]
impl Driver for B2Driver {
    fn name(&self) -> &'static str {
        B2_STORAGE_NAME
    }

    #[tracing::instrument(skip(self), fields(driver = B2_STORAGE_NAME))]
    async fn list_page(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        cursor: Option<&ListCursor>,
    ) -> Result<ListPage, StorageError> {
        let bucket_id = self.bucket_id(bucket).await?;
        let body = FileListBody {
            bucket_id: &bucket_id,
            start_file_name: cursor.map(ListCursor::as_str),
            max_file_count: self.page_size,
            prefix: prefix.filter(|p| !p.is_empty()),
        };

        let response: FileListResponse = self
            .post("b2_list_file_names", &body, bucket, prefix)
            .await?;

        Ok(ListPage {
            keys: response.files.into_iter().map(|f| f.file_name).collect(),
            next: response.next_file_name.map(ListCursor::new),
        })
    }
}
