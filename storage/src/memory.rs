use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;

use tokio::sync::RwLock;

use storage_driver::{Driver, ListCursor, ListPage, StorageError, StorageErrorKind};

use crate::DEFAULT_PAGE_SIZE;

/// Storage driver that holds object keys in memory.
///
/// Listings are paged like a remote object store would page them, so a small
/// page size exercises the same cursor handling as a large bucket.
#[derive(Debug)]
pub struct MemoryStorage {
    buckets: RwLock<HashMap<String, BTreeSet<String>>>,
    page_size: usize,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self {
            buckets: RwLock::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl MemoryStorage {
    /// Create a new `MemoryStorage` instance, with no buckets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new `MemoryStorage` instance, with the given buckets.
    pub fn with_buckets(buckets: &[&str]) -> Self {
        let mut map = HashMap::new();
        for bucket in buckets {
            map.insert(bucket.to_string(), BTreeSet::new());
        }

        Self {
            buckets: RwLock::new(map),
            ..Default::default()
        }
    }

    /// Create a new `MemoryStorage` instance holding a single bucket with the given keys.
    pub fn with_keys<I, S>(bucket: &str, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut map = HashMap::new();
        map.insert(
            bucket.to_string(),
            keys.into_iter().map(Into::into).collect(),
        );

        Self {
            buckets: RwLock::new(map),
            ..Default::default()
        }
    }

    /// Set the maximum number of keys returned per listing page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Add a key to a bucket, creating the bucket if needed.
    pub async fn insert(&self, bucket: &str, key: impl Into<String>) {
        let mut buckets = self.buckets.write().await;
        buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.into());
    }
}

#[async_trait::async_trait]
impl Driver for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn list_page(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        cursor: Option<&ListCursor>,
    ) -> Result<ListPage, StorageError> {
        tracing::trace!(%bucket, ?prefix, ?cursor, "list memory bucket");

        let buckets = self.buckets.read().await;
        let keys = buckets.get(bucket).ok_or_else(|| {
            StorageError::builder(
                self.name(),
                StorageErrorKind::NotFound,
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("Bucket not found: {bucket}"),
                ),
            )
            .bucket(bucket)
            .context("bucket not found")
            .build()
        })?;

        Ok(page_after(keys, prefix.unwrap_or_default(), cursor, self.page_size))
    }
}

/// Take up to `page_size` keys under `prefix` which sort after `cursor`.
///
/// Keys sharing a prefix are contiguous in sorted order, so the scan starts at
/// whichever of the prefix or the cursor sorts later.
pub(crate) fn page_after(
    keys: &BTreeSet<String>,
    prefix: &str,
    cursor: Option<&ListCursor>,
    page_size: usize,
) -> ListPage {
    let start = match cursor {
        Some(cursor) if cursor.as_str() >= prefix => Bound::Excluded(cursor.as_str()),
        _ => Bound::Included(prefix),
    };

    let mut matching = keys
        .range::<str, _>((start, Bound::Unbounded))
        .take_while(|key| key.starts_with(prefix));

    let page: Vec<String> = matching.by_ref().take(page_size).cloned().collect();
    let next = match (matching.next(), page.last()) {
        (Some(_), Some(last)) => Some(ListCursor::new(last.clone())),
        _ => None,
    };

    ListPage { keys: page, next }
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::Storage;

    fn keys() -> Vec<&'static str> {
        vec![
            "ns/a/1.0.0/linux_amd64/a.zip",
            "ns/a/1.0.0/darwin_arm64/a.zip",
            "ns/b/2.0.0/linux_amd64/b.zip",
            "ns/a/1.1.0/linux_amd64/a.zip",
            "other/c/0.1.0/linux_amd64/c.zip",
        ]
    }

    #[tokio::test]
    async fn pages_are_bounded_and_chained() {
        let storage = MemoryStorage::with_keys("test", keys()).with_page_size(2);

        let first = storage.list_page("test", Some("ns/a/"), None).await.unwrap();
        assert_eq!(first.keys.len(), 2);
        assert!(first.has_more());

        let second = storage
            .list_page("test", Some("ns/a/"), first.next.as_ref())
            .await
            .unwrap();
        assert_eq!(second.keys, vec!["ns/a/1.1.0/linux_amd64/a.zip"]);
        assert!(!second.has_more());
    }

    #[tokio::test]
    async fn exact_page_boundary_has_no_trailing_cursor() {
        let storage = MemoryStorage::with_keys("test", ["p/a", "p/b"]).with_page_size(2);
        let page = storage.list_page("test", Some("p/"), None).await.unwrap();
        assert_eq!(page.keys, vec!["p/a", "p/b"]);
        assert_eq!(page.next, None);
    }

    #[tokio::test]
    async fn paged_listing_matches_single_page() {
        let paged: Storage = MemoryStorage::with_keys("test", keys())
            .with_page_size(1)
            .into();
        let single: Storage = MemoryStorage::with_keys("test", keys()).into();
        let cancel = CancellationToken::new();

        let mut all = single.list("test", None, &cancel).await.unwrap();
        let mut chained = paged.list("test", None, &cancel).await.unwrap();
        all.sort();
        chained.sort();

        assert_eq!(all.len(), 5);
        assert_eq!(all, chained);
    }

    #[tokio::test]
    async fn prefix_filters_keys() {
        let storage: Storage = MemoryStorage::with_keys("test", keys()).into();
        let keys = storage
            .list("test", Some("ns/b/"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(keys, vec!["ns/b/2.0.0/linux_amd64/b.zip"]);
    }

    #[tokio::test]
    async fn missing_bucket_is_not_found() {
        let storage = MemoryStorage::with_buckets(&["test"]);
        let err = storage.list_page("missing", None, None).await.unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::NotFound);
        assert_eq!(err.bucket(), Some("missing"));
    }

    #[tokio::test]
    async fn insert_creates_bucket() {
        let storage = MemoryStorage::new();
        storage.insert("fresh", "key").await;
        let page = storage.list_page("fresh", None, None).await.unwrap();
        assert_eq!(page.keys, vec!["key"]);
    }
}
