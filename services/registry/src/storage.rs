//! Storage layer for the registry

use storage::StorageBucket;
use tokio_util::sync::CancellationToken;

use crate::catalog::Catalog;
use crate::error::RegistryResult;
use crate::key::KeyLayout;

/// Registry storage backend: a bucket of provider archives and the layout they follow.
///
/// Cloning is cheap, and every clone shares the same read-only driver.
#[derive(Clone, Debug)]
pub struct RegistryStorage {
    bucket: StorageBucket,
    layout: KeyLayout,
}

impl RegistryStorage {
    /// Create a new registry storage
    pub fn new(storage: storage::Storage, bucket: String, layout: KeyLayout) -> Self {
        Self {
            bucket: storage.bucket(bucket),
            layout,
        }
    }

    /// Scan the bucket for one provider and build its catalog.
    ///
    /// The whole prefix is listed before anything is parsed, so a failure on
    /// any page fails the scan.
    #[tracing::instrument(skip(self, cancel), fields(bucket = %self.bucket.bucket))]
    pub async fn provider_catalog(
        &self,
        namespace: &str,
        provider_type: &str,
        cancel: &CancellationToken,
    ) -> RegistryResult<Catalog> {
        let prefix = self.layout.provider_prefix(namespace, provider_type);
        let keys = self.bucket.list(Some(prefix.as_str()), cancel).await?;
        Ok(Catalog::build(&self.layout, &prefix, keys))
    }
}
