//! # Terraform Provider Registry
//!
//! This crate implements the read side of the
//! [Terraform Provider Registry Protocol](https://developer.hashicorp.com/terraform/internals/provider-registry-protocol):
//! service discovery and version enumeration, backed by a bucket of provider
//! release archives.
//!
//! ## Bucket layout
//!
//! Archives are found by listing keys shaped like
//!
//! ```text
//! {prefix}/{namespace}/{type}/{version}/{os}_{arch}/{archive-file}
//! ```
//!
//! Every versions request lists the provider's prefix in full, following the
//! store's pagination cursor, and builds a fresh catalog. Keys of any other
//! shape are ignored.
//!
//! ## Example
//!
//! ```no_run
//! use provider_registry::RegistryBuilder;
//! use storage::MemoryStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = MemoryStorage::with_keys(
//!     "tfindex",
//!     ["algolia/restapi/1.2.0/linux_amd64/terraform-provider-restapi.zip"],
//! );
//! let registry = RegistryBuilder::new(storage.into())
//!     .bucket("tfindex")
//!     .build();
//!
//! // Use the registry service with axum or any tower-compatible server
//! # Ok(())
//! # }
//! ```

mod api;
mod catalog;
mod config;
mod error;
mod key;
mod storage;
mod versions;

pub use api::{DEFAULT_BUCKET, DEFAULT_TIMEOUT, DISCOVERY_PATH, PROVIDERS_V1, RegistryBuilder};
pub use catalog::{Catalog, Platform, VersionEntry};
pub use config::{ConfigError, RegistryConfig};
pub use error::{RegistryError, RegistryResult};
pub use key::{DEFAULT_ARCHIVE_SUFFIX, KeyLayout, KeyRejection, ParsedKey, parse_key};
