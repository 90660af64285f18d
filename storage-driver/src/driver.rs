use std::{fmt, ops::Deref, sync::Arc};

use crate::error::StorageError;

/// An opaque continuation marker returned by a paged listing.
///
/// Callers should treat the contents as meaningless and only hand the cursor
/// back to the driver that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListCursor(String);

impl ListCursor {
    /// Wrap a driver-specific continuation marker.
    pub fn new(marker: impl Into<String>) -> Self {
        Self(marker.into())
    }

    /// The raw marker, for use by the driver which created it.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One bounded page of keys from a bucket listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Keys in this page, in the order the backend returned them.
    pub keys: Vec<String>,

    /// Cursor for the next page. `None` when the listing is exhausted.
    pub next: Option<ListCursor>,
}

impl ListPage {
    /// Whether more pages remain after this one.
    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }
}

/// A storage driver, which provides read access to the keys held by a storage backend.
///
/// Backends return keys in bounded pages. Following the cursor until it runs
/// out is the caller's job: a single call to [`Driver::list_page`] is not a
/// complete listing.
#[async_trait::async_trait]
pub trait Driver: fmt::Debug {
    /// The name of the driver.
    fn name(&self) -> &'static str;

    /// List one page of keys in a bucket, optionally filtered by a string prefix,
    /// starting after the position recorded in `cursor`.
    async fn list_page(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        cursor: Option<&ListCursor>,
    ) -> Result<ListPage, StorageError>;
}

#[async_trait::async_trait]
impl<D> Driver for Arc<D>
where
    D: ?Sized + Driver + Sync + Send + 'static,
{
    fn name(&self) -> &'static str {
        self.deref().name()
    }

    async fn list_page(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        cursor: Option<&ListCursor>,
    ) -> Result<ListPage, StorageError> {
        self.deref().list_page(bucket, prefix, cursor).await
    }
}

#[async_trait::async_trait]
impl<D> Driver for &D
where
    D: ?Sized + Driver + Sync + Send + 'static,
{
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn list_page(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        cursor: Option<&ListCursor>,
    ) -> Result<ListPage, StorageError> {
        (**self).list_page(bucket, prefix, cursor).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_obj_safe!(Driver);

    #[test]
    fn last_page_has_no_cursor() {
        let page = ListPage {
            keys: vec!["a".into()],
            next: None,
        };
        assert!(!page.has_more());

        let page = ListPage {
            keys: vec![],
            next: Some(ListCursor::new("a")),
        };
        assert!(page.has_more());
        assert_eq!(page.next.unwrap().as_str(), "a");
    }
}
