use std::collections::BTreeSet;

use camino::{Utf8Path, Utf8PathBuf};
use eyre::WrapErr;
use tracing::Instrument;

use storage_driver::{Driver, ListCursor, ListPage, StorageError, StorageErrorKind};

use crate::memory::page_after;
use crate::DEFAULT_PAGE_SIZE;

/// Storage driver which reads buckets from the local filesystem.
///
/// Each bucket is a directory under `root`, and each file below it is an
/// object whose key is its `/`-separated path relative to the bucket.
#[derive(Debug)]
pub struct LocalDriver {
    root: Utf8PathBuf,
    page_size: usize,
}

impl LocalDriver {
    /// Serve buckets from directories below `root`.
    pub fn new(root: Utf8PathBuf) -> Self {
        Self {
            root,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Set the maximum number of keys returned per listing page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn bucket_path(&self, bucket: &str) -> Utf8PathBuf {
        self.root.join(bucket)
    }
}

#[async_trait::async_trait]
impl Driver for LocalDriver {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn list_page(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        cursor: Option<&ListCursor>,
    ) -> Result<ListPage, StorageError> {
        let path = self.bucket_path(bucket);

        let metadata = tokio::fs::metadata(&path).await.map_err(|err| {
            StorageError::builder(self.name(), io_error_kind(&err), err)
                .bucket(bucket)
                .context("open bucket directory")
                .build()
        })?;
        if !metadata.is_dir() {
            return Err(StorageError::builder(
                self.name(),
                StorageErrorKind::NotFound,
                format!("Bucket is not a directory: {path}"),
            )
            .bucket(bucket)
            .build());
        }

        let keys = tokio::task::spawn_blocking(move || collect_keys(&path))
            .in_current_span()
            .await
            .wrap_err("local driver: walking bucket")
            .map_err(StorageError::with(self.name(), StorageErrorKind::Other))?
            .map_err(|err| {
                StorageError::builder(self.name(), StorageErrorKind::Io, err)
                    .bucket(bucket)
                    .build()
            })?;

        tracing::trace!("Found {} keys", keys.len());

        Ok(page_after(
            &keys,
            prefix.unwrap_or_default(),
            cursor,
            self.page_size,
        ))
    }
}

fn io_error_kind(err: &std::io::Error) -> StorageErrorKind {
    match err.kind() {
        std::io::ErrorKind::NotFound => StorageErrorKind::NotFound,
        std::io::ErrorKind::PermissionDenied => StorageErrorKind::PermissionDenied,
        _ => StorageErrorKind::Io,
    }
}

#[tracing::instrument]
fn collect_keys(root: &Utf8Path) -> eyre::Result<BTreeSet<String>> {
    let mut files = Vec::new();
    visit(root, &mut files)?;

    Ok(files
        .into_iter()
        .filter_map(|p| {
            p.strip_prefix(root).ok().map(|relative| {
                relative
                    .components()
                    .map(|c| c.as_str())
                    .collect::<Vec<_>>()
                    .join("/")
            })
        })
        .collect())
}

fn visit(path: &Utf8Path, files: &mut Vec<Utf8PathBuf>) -> eyre::Result<()> {
    for entry in path
        .read_dir_utf8()
        .wrap_err_with(|| format!("read directory {path}"))?
    {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            visit(entry.path(), files)?;
        } else {
            files.push(entry.path().to_owned())
        }
    }

    Ok(())
}
