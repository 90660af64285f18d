use std::error::Error as StdError;
use std::fmt;

use tracing_error::SpanTrace;

/// What went wrong with a storage call, in backend-neutral terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    /// The bucket does not exist.
    NotFound,

    /// The backend refused the credentials or the bucket.
    PermissionDenied,

    /// Reading from disk or the network failed.
    Io,

    /// The backend answered, but reported itself overloaded or broken.
    ServiceUnavailable,

    /// The backend rejected the request, or handed back a cursor that goes nowhere.
    InvalidRequest,

    /// A single page did not arrive before its deadline.
    TimedOut,

    /// The caller stopped waiting for the listing.
    Cancelled,

    /// Anything else.
    Other,
}

impl fmt::Display for StorageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StorageErrorKind::NotFound => "not found",
            StorageErrorKind::PermissionDenied => "permission denied",
            StorageErrorKind::Io => "I/O error",
            StorageErrorKind::ServiceUnavailable => "service unavailable",
            StorageErrorKind::InvalidRequest => "invalid request",
            StorageErrorKind::TimedOut => "timed out",
            StorageErrorKind::Cancelled => "cancelled",
            StorageErrorKind::Other => "other error",
        };
        f.write_str(text)
    }
}

/// A failed storage call: its kind, the driver that raised it, where it was
/// aimed, and the span it was raised in.
///
/// ```rust
/// use storage_driver::{StorageError, StorageErrorKind};
///
/// let error = StorageError::builder("memory", StorageErrorKind::NotFound, "no such bucket")
///     .bucket("tfindex")
///     .path("hashicorp/aws/")
///     .build();
///
/// assert_eq!(error.kind(), StorageErrorKind::NotFound);
/// assert_eq!(error.bucket(), Some("tfindex"));
/// ```
#[derive(Debug)]
pub struct StorageError {
    kind: StorageErrorKind,
    engine: &'static str,
    bucket: Option<String>,
    /// Listing prefix the call was scoped to.
    path: Option<String>,
    /// Which step failed, e.g. the backend call name.
    context: Option<String>,
    source: Box<dyn StdError + Send + Sync + 'static>,
    span_trace: Box<SpanTrace>,
}

impl StdError for StorageError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_ref())
    }
}

impl StorageError {
    /// An error with no bucket or prefix attached.
    pub fn new<E>(engine: &'static str, kind: StorageErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        Self::builder(engine, kind, error).build()
    }

    /// Start an error which will carry a bucket, prefix or context.
    pub fn builder<E>(engine: &'static str, kind: StorageErrorKind, error: E) -> StorageErrorBuilder
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        StorageErrorBuilder {
            error: StorageError {
                kind,
                engine,
                bucket: None,
                path: None,
                context: None,
                source: error.into(),
                span_trace: Box::new(SpanTrace::capture()),
            },
        }
    }

    /// A `map_err` adapter: `result.map_err(StorageError::with("local", StorageErrorKind::Io))`.
    pub fn with<E>(
        engine: &'static str,
        kind: StorageErrorKind,
    ) -> Box<dyn FnOnce(E) -> StorageError + Send + Sync>
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        Box::new(move |error: E| StorageError::new(engine, kind, error))
    }

    /// The kind of failure.
    pub fn kind(&self) -> StorageErrorKind {
        self.kind
    }

    /// Name of the driver which raised this error.
    pub fn engine(&self) -> &'static str {
        self.engine
    }

    /// The bucket being listed, if known.
    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    /// The listing prefix, if known.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// The span the error was raised in.
    pub fn span_trace(&self) -> &SpanTrace {
        &self.span_trace
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Storage error [{}] from {}", self.kind, self.engine)?;
        if let Some(bucket) = &self.bucket {
            write!(f, " (bucket: {bucket})")?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {path})")?;
        }
        if let Some(context) = &self.context {
            write!(f, " ({context})")?;
        }
        write!(f, ": {}", self.source)
    }
}

/// Attaches bucket, prefix and context to a [`StorageError`].
#[derive(Debug)]
pub struct StorageErrorBuilder {
    error: StorageError,
}

impl StorageErrorBuilder {
    /// The bucket being listed.
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.error.bucket = Some(bucket.into());
        self
    }

    /// The listing prefix.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.error.path = Some(path.into());
        self
    }

    /// Which step failed.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.error.context = Some(context.into());
        self
    }

    /// Finish the error.
    pub fn build(self) -> StorageError {
        self.error
    }
}
