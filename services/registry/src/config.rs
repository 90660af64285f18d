//! Registry server configuration

use std::net::SocketAddr;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use storage::{StorageConfig, StorageError};

use crate::api::{DEFAULT_BUCKET, DEFAULT_TIMEOUT, RegistryBuilder};
use crate::key::DEFAULT_ARCHIVE_SUFFIX;

/// Reasons a configuration file could not be loaded
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("reading config from {path}")]
    Io {
        /// Path of the configuration file
        path: Utf8PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid registry configuration
    #[error("parsing config: {0}")]
    Parse(#[from] toml_edit::de::Error),

    /// No `[storage]` section was given
    #[error("no storage backend configured; add a [storage] section")]
    MissingStorage,

    /// `archive-suffix` is empty, which would accept every key as an archive
    #[error("archive-suffix must not be empty")]
    EmptyArchiveSuffix,

    /// The storage backend could not be set up
    #[error("connecting storage backend")]
    Storage(#[from] StorageError),
}

/// Registry server configuration, usually read from a TOML file
///
/// ```toml
/// bind = "0.0.0.0:8080"
/// bucket = "tfindex"
/// prefix = "algolia"
/// archive-suffix = ".zip"
/// timeout-seconds = 10
///
/// [storage.local]
/// path = "/srv/registry"
/// ```
///
/// A B2 account is configured with an application key, or with
/// `storage = "b2-env"` to read `B2_KEY_ID` and `B2_KEY` from the environment:
///
/// ```toml
/// [storage.b2]
/// key-id = "0012345"
/// key = "K001abcdef"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Address to listen on
    pub bind: SocketAddr,

    /// Bucket holding provider archives
    pub bucket: String,

    /// Base prefix providers live under
    pub prefix: String,

    /// Suffix every release archive carries
    pub archive_suffix: String,

    /// Timeout for each storage listing call, in seconds
    pub timeout_seconds: u64,

    /// Storage backend. Required.
    pub storage: Option<StorageConfig>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            bucket: DEFAULT_BUCKET.to_string(),
            prefix: String::new(),
            archive_suffix: DEFAULT_ARCHIVE_SUFFIX.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT.as_secs(),
            storage: None,
        }
    }
}

impl RegistryConfig {
    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml_edit::de::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the settings which parse but cannot serve a registry
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.is_none() {
            return Err(ConfigError::MissingStorage);
        }
        if self.archive_suffix.is_empty() {
            return Err(ConfigError::EmptyArchiveSuffix);
        }
        Ok(())
    }

    /// Read configuration from a TOML file
    pub fn from_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// The per-call storage timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Connect the storage backend and prepare a registry builder
    #[tracing::instrument(skip(self))]
    pub fn registry(&self) -> Result<RegistryBuilder, ConfigError> {
        self.validate()?;
        let storage = self
            .storage
            .clone()
            .ok_or(ConfigError::MissingStorage)?
            .build()?;
        Ok(RegistryBuilder::new(storage)
            .bucket(self.bucket.clone())
            .prefix(self.prefix.clone())
            .archive_suffix(self.archive_suffix.clone())
            .timeout(self.timeout()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = RegistryConfig::from_toml(
            r#"
            [storage.memory]
            bucket = "tfindex"
            "#,
        )
        .unwrap();
        assert_eq!(config.bind, SocketAddr::from(([127, 0, 0, 1], 8080)));
        assert_eq!(config.bucket, "tfindex");
        assert_eq!(config.archive_suffix, ".zip");
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn storage_section_is_required() {
        let err = RegistryConfig::from_toml("bucket = \"releases\"").unwrap_err();
        assert!(matches!(err, ConfigError::MissingStorage));
        assert!(err.to_string().contains("[storage]"));

        let err = RegistryConfig::default().registry().unwrap_err();
        assert!(matches!(err, ConfigError::MissingStorage));
    }

    #[test]
    fn empty_archive_suffix_is_rejected() {
        let err = RegistryConfig::from_toml(
            r#"
            archive-suffix = ""

            [storage.memory]
            bucket = "tfindex"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyArchiveSuffix));
    }

    #[test]
    fn b2_config_keeps_key_out_of_debug() {
        let config = RegistryConfig::from_toml(
            r#"
            [storage.b2]
            key-id = "0012345"
            key = "K001secret"
            "#,
        )
        .unwrap();
        assert!(matches!(config.storage, Some(StorageConfig::B2(_))));

        let debug = format!("{config:?}");
        assert!(debug.contains("0012345"));
        assert!(!debug.contains("K001secret"));

        let env = RegistryConfig::from_toml("storage = \"b2-env\"").unwrap();
        assert!(matches!(env.storage, Some(StorageConfig::B2Env)));
    }

    #[test]
    fn full_config() {
        let config = RegistryConfig::from_toml(
            r#"
            bind = "0.0.0.0:9000"
            bucket = "releases"
            prefix = "algolia/restapi"
            archive-suffix = ".tar.gz"
            timeout-seconds = 5

            [storage.local]
            path = "/srv/registry"
            "#,
        )
        .unwrap();

        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.bucket, "releases");
        assert_eq!(config.prefix, "algolia/restapi");
        assert_eq!(config.archive_suffix, ".tar.gz");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert!(matches!(
            config.storage,
            Some(StorageConfig::Local { path }) if path == "/srv/registry"
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = RegistryConfig::from_toml("buckets = \"typo\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = RegistryConfig::from_file(Utf8Path::new("/nonexistent/registry.toml"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "reading config from /nonexistent/registry.toml"
        );
    }

    #[test]
    fn builds_registry_from_config() {
        let config = RegistryConfig::from_toml(
            r#"
            [storage.memory]
            bucket = "tfindex"
            "#,
        )
        .unwrap();
        let _router = config.registry().unwrap().build();
    }
}
