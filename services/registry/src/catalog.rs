//! Provider version catalog
//!
//! Turns the complete key listing for one provider into the deduplicated,
//! ordered set of versions and platforms served by the versions endpoint.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::key::{KeyLayout, ParsedKey};

/// A target platform for a provider release.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Platform {
    /// Operating system, e.g. `linux`.
    pub os: String,
    /// CPU architecture, e.g. `amd64`.
    pub arch: String,
}

impl Platform {
    /// Create a platform from its os and arch.
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }
}

/// One provider version and every platform it was published for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionEntry {
    /// The version string, as it appears in the bucket.
    pub version: String,
    /// Unique platforms, sorted by os then arch.
    pub platforms: Vec<Platform>,
}

/// The versions available for one provider, sorted by version string.
///
/// Serializes as a bare JSON array of [`VersionEntry`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Catalog {
    versions: Vec<VersionEntry>,
}

impl Catalog {
    /// Build a catalog from every key listed under `provider_prefix`.
    ///
    /// Keys which don't follow the layout are skipped. Duplicate
    /// version/platform pairs collapse to one entry, and the result does not
    /// depend on the order of `keys`.
    pub fn build<I, S>(layout: &KeyLayout, provider_prefix: &str, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut versions: BTreeMap<String, BTreeSet<Platform>> = BTreeMap::new();
        let mut rejected = 0usize;

        for key in keys {
            let key = key.as_ref();
            match layout.parse(key, provider_prefix) {
                ParsedKey::Accepted { version, platform } => {
                    versions
                        .entry(version.to_owned())
                        .or_default()
                        .insert(platform);
                }
                ParsedKey::Rejected(reason) => {
                    rejected += 1;
                    tracing::trace!(%key, %reason, "skipping key");
                }
            }
        }

        tracing::debug!(versions = versions.len(), rejected, "built catalog");

        Self {
            versions: versions
                .into_iter()
                .map(|(version, platforms)| VersionEntry {
                    version,
                    platforms: platforms.into_iter().collect(),
                })
                .collect(),
        }
    }

    /// The catalog entries, sorted by version string.
    pub fn versions(&self) -> &[VersionEntry] {
        &self.versions
    }

    /// Whether no versions were found.
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// The number of distinct versions.
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Find the entry for `version`.
    pub fn get(&self, version: &str) -> Option<&VersionEntry> {
        self.versions
            .binary_search_by(|entry| entry.version.as_str().cmp(version))
            .ok()
            .map(|index| &self.versions[index])
    }
}

impl IntoIterator for Catalog {
    type Item = VersionEntry;
    type IntoIter = std::vec::IntoIter<VersionEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.versions.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "algolia/restapi/ns/provtype/";

    fn layout() -> KeyLayout {
        KeyLayout::new("algolia/restapi", ".zip")
    }

    fn build(keys: &[&str]) -> Catalog {
        Catalog::build(&layout(), PREFIX, keys)
    }

    #[test]
    fn groups_platforms_by_version() {
        let catalog = build(&[
            "algolia/restapi/ns/provtype/1.2.0/linux_amd64/a.zip",
            "algolia/restapi/ns/provtype/1.2.0/darwin_arm64/b.zip",
        ]);

        assert_eq!(
            catalog.versions(),
            &[VersionEntry {
                version: "1.2.0".into(),
                platforms: vec![
                    Platform::new("darwin", "arm64"),
                    Platform::new("linux", "amd64"),
                ],
            }]
        );
    }

    #[test]
    fn duplicate_platforms_collapse() {
        let catalog = build(&[
            "algolia/restapi/ns/provtype/1.2.0/linux_amd64/a.zip",
            "algolia/restapi/ns/provtype/1.2.0/linux_amd64/b.zip",
        ]);

        let entry = catalog.get("1.2.0").unwrap();
        assert_eq!(entry.platforms, vec![Platform::new("linux", "amd64")]);
    }

    #[test]
    fn order_of_keys_does_not_matter() {
        let mut keys = vec![
            "algolia/restapi/ns/provtype/1.0.0/linux_amd64/a.zip",
            "algolia/restapi/ns/provtype/2.0.0/windows_386/a.zip",
            "algolia/restapi/ns/provtype/1.0.0/darwin_arm64/a.zip",
            "algolia/restapi/ns/provtype/2.0.0/linux_arm/a.zip",
            "algolia/restapi/ns/provtype/1.0.0/linux_amd64/copy.zip",
        ];
        let forward = build(&keys);
        keys.reverse();
        let backward = build(&keys);

        assert_eq!(forward, backward);
        assert_eq!(forward, build(&keys));
        assert_eq!(
            forward
                .versions()
                .iter()
                .map(|v| v.version.as_str())
                .collect::<Vec<_>>(),
            vec!["1.0.0", "2.0.0"]
        );
    }

    #[test]
    fn malformed_keys_do_not_affect_others() {
        let catalog = build(&[
            "algolia/restapi/ns/provtype/1.2.0/linux_amd64/a.zip",
            "algolia/restapi/ns/provtype/1.2.0/linux_amd64/SHA256SUMS",
            "algolia/restapi/ns/provtype/1.2.0/a.zip",
            "algolia/restapi/ns/provtype/1.2.0/linux/a.zip",
            "algolia/restapi/ns/provtype/1.2.0/linux_amd_64/a.zip",
            "algolia/restapi/ns/provtype/1.3.0/linux_amd64/nested/a.zip",
        ]);

        assert_eq!(catalog.len(), 1);
        assert_eq!(
            catalog.get("1.2.0").unwrap().platforms,
            vec![Platform::new("linux", "amd64")]
        );
        assert!(catalog.get("1.3.0").is_none());
    }

    #[test]
    fn empty_and_invalid_inputs_build_empty_catalog() {
        assert!(build(&[]).is_empty());
        assert!(build(&["junk", "algolia/restapi/ns/provtype/readme.md"]).is_empty());
    }

    #[test]
    fn serializes_as_protocol_array() {
        let catalog = build(&["algolia/restapi/ns/provtype/1.2.0/linux_amd64/a.zip"]);
        let json = serde_json::to_value(&catalog).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"version": "1.2.0", "platforms": [{"os": "linux", "arch": "amd64"}]}
            ])
        );

        let empty = serde_json::to_string(&Catalog::default()).unwrap();
        assert_eq!(empty, "[]");
    }
}
