//! API server builder and router

use std::time::Duration;

use axum::Router;
use axum::response::Json;
use axum::routing::get;
use serde_json::json;

use crate::key::{DEFAULT_ARCHIVE_SUFFIX, KeyLayout};
use crate::storage::RegistryStorage;

/// Bucket name used when none is configured.
pub const DEFAULT_BUCKET: &str = "tfindex";

/// Per-page listing timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Path of the service discovery document.
pub const DISCOVERY_PATH: &str = "/.well-known/terraform.json";

/// Base path of the providers protocol, as advertised by discovery.
pub const PROVIDERS_V1: &str = "/v1/providers/";

/// Registry builder for configuring and creating the provider registry service
#[derive(Debug)]
pub struct RegistryBuilder {
    storage: storage::Storage,
    bucket: Option<String>,
    prefix: Option<String>,
    archive_suffix: Option<String>,
    timeout: Option<Duration>,
}

impl RegistryBuilder {
    /// Create a new registry builder over a storage backend
    pub fn new(storage: storage::Storage) -> Self {
        Self {
            storage,
            bucket: None,
            prefix: None,
            archive_suffix: None,
            timeout: None,
        }
    }

    /// Set the bucket name for storage
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Set the base prefix which provider namespaces live under
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set the suffix release archives must carry
    pub fn archive_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.archive_suffix = Some(suffix.into());
        self
    }

    /// Set the timeout for each storage listing call
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the registry service
    ///
    /// Returns a Router that can be served with any tower-compatible server
    pub fn build(self) -> Router {
        let bucket = self.bucket.unwrap_or_else(|| DEFAULT_BUCKET.to_string());
        let layout = KeyLayout::new(
            self.prefix.unwrap_or_default(),
            self.archive_suffix
                .unwrap_or_else(|| DEFAULT_ARCHIVE_SUFFIX.to_string()),
        );
        let storage = self
            .storage
            .with_timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT));

        tracing::debug!(%bucket, prefix = layout.prefix(), suffix = layout.archive_suffix(), "building registry");
        let registry_storage = RegistryStorage::new(storage, bucket, layout);

        Router::new()
            .route(DISCOVERY_PATH, get(discovery))
            .merge(crate::versions::router())
            .with_state(registry_storage)
    }
}

/// Service discovery document
///
/// Advertises where the providers protocol is served.
async fn discovery() -> Json<serde_json::Value> {
    Json(json!({ "providers.v1": PROVIDERS_V1 }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let storage = storage::MemoryStorage::with_buckets(&["test"]);
        let _registry = RegistryBuilder::new(storage.into())
            .bucket("test")
            .prefix("algolia/restapi")
            .archive_suffix(".zip")
            .timeout(Duration::from_secs(5))
            .build();
    }

    #[tokio::test]
    async fn discovery_document() {
        let Json(document) = discovery().await;
        assert_eq!(document, json!({"providers.v1": "/v1/providers/"}));
    }
}
