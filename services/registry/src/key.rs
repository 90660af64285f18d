//! Object key layout and parsing
//!
//! Provider archives are stored under
//! `{prefix}/{namespace}/{type}/{version}/{os}_{arch}/{archive-file}`.
//! Keys which do not follow that shape are rejected, never treated as errors.

use std::fmt;

use crate::catalog::Platform;

/// Archive suffix used when none is configured.
pub const DEFAULT_ARCHIVE_SUFFIX: &str = ".zip";

/// The bucket layout which provider archives are stored in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLayout {
    prefix: String,
    archive_suffix: String,
}

impl Default for KeyLayout {
    fn default() -> Self {
        Self::new("", DEFAULT_ARCHIVE_SUFFIX)
    }
}

impl KeyLayout {
    /// Create a layout rooted at `prefix`, accepting archives ending in `archive_suffix`.
    ///
    /// Leading and trailing `/` are trimmed from the prefix.
    pub fn new(prefix: impl AsRef<str>, archive_suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.as_ref().trim_matches('/').to_owned(),
            archive_suffix: archive_suffix.into(),
        }
    }

    /// The base prefix shared by all providers. Empty when providers live at the bucket root.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The suffix every archive key must end with.
    pub fn archive_suffix(&self) -> &str {
        &self.archive_suffix
    }

    /// The listing prefix for a single provider, always ending in `/`.
    pub fn provider_prefix(&self, namespace: &str, provider_type: &str) -> String {
        if self.prefix.is_empty() {
            format!("{namespace}/{provider_type}/")
        } else {
            format!("{}/{namespace}/{provider_type}/", self.prefix)
        }
    }

    /// Parse a key listed under `provider_prefix`.
    pub fn parse<'k>(&self, key: &'k str, provider_prefix: &str) -> ParsedKey<'k> {
        parse_key(key, provider_prefix, &self.archive_suffix)
    }
}

/// Why a key was left out of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRejection {
    /// The key is not under the provider prefix.
    OutsidePrefix,
    /// The key does not end with the archive suffix.
    NotAnArchive,
    /// The key is not `{version}/{platform}/{file}` below the prefix.
    SegmentCount(usize),
    /// The platform segment is not exactly `{os}_{arch}`.
    PlatformTag,
    /// One of the segments is empty.
    EmptySegment,
}

impl fmt::Display for KeyRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyRejection::OutsidePrefix => write!(f, "outside provider prefix"),
            KeyRejection::NotAnArchive => write!(f, "missing archive suffix"),
            KeyRejection::SegmentCount(n) => write!(f, "expected 3 path segments, found {n}"),
            KeyRejection::PlatformTag => write!(f, "platform tag is not os_arch"),
            KeyRejection::EmptySegment => write!(f, "empty path segment"),
        }
    }
}

/// The result of parsing one object key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedKey<'k> {
    /// The key names a release archive for `version` on `platform`.
    Accepted {
        /// Version segment, verbatim.
        version: &'k str,
        /// Target platform.
        platform: Platform,
    },
    /// The key does not follow the layout.
    Rejected(KeyRejection),
}

impl ParsedKey<'_> {
    /// Whether the key was accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, ParsedKey::Accepted { .. })
    }
}

/// Parse a single object key into a version and platform.
///
/// The key must start with `prefix`, end with `archive_suffix`, and below the
/// prefix consist of exactly `{version}/{os}_{arch}/{filename}`.
pub fn parse_key<'k>(key: &'k str, prefix: &str, archive_suffix: &str) -> ParsedKey<'k> {
    let Some(rest) = key.strip_prefix(prefix) else {
        return ParsedKey::Rejected(KeyRejection::OutsidePrefix);
    };

    if !key.ends_with(archive_suffix) {
        return ParsedKey::Rejected(KeyRejection::NotAnArchive);
    }

    let segments: Vec<&str> = rest.split('/').collect();
    let [version, tag, filename] = segments[..] else {
        return ParsedKey::Rejected(KeyRejection::SegmentCount(segments.len()));
    };

    let Some((os, arch)) = tag.split_once('_') else {
        return ParsedKey::Rejected(KeyRejection::PlatformTag);
    };
    if arch.contains('_') {
        return ParsedKey::Rejected(KeyRejection::PlatformTag);
    }

    if [version, os, arch, filename].iter().any(|s| s.is_empty()) {
        return ParsedKey::Rejected(KeyRejection::EmptySegment);
    }

    ParsedKey::Accepted {
        version,
        platform: Platform::new(os, arch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "algolia/restapi/ns/provtype/";

    fn reject(key: &str) -> KeyRejection {
        match parse_key(key, PREFIX, ".zip") {
            ParsedKey::Rejected(reason) => reason,
            accepted => panic!("expected {key} to be rejected, got {accepted:?}"),
        }
    }

    #[test]
    fn accepts_well_formed_key() {
        let parsed = parse_key(
            "algolia/restapi/ns/provtype/1.2.0/linux_amd64/a.zip",
            PREFIX,
            ".zip",
        );
        assert_eq!(
            parsed,
            ParsedKey::Accepted {
                version: "1.2.0",
                platform: Platform::new("linux", "amd64"),
            }
        );
        assert!(parsed.is_accepted());
    }

    #[test]
    fn rejects_other_prefix() {
        assert_eq!(
            reject("algolia/other/ns/provtype/1.2.0/linux_amd64/a.zip"),
            KeyRejection::OutsidePrefix
        );
    }

    #[test]
    fn rejects_missing_suffix() {
        assert_eq!(
            reject("algolia/restapi/ns/provtype/1.2.0/linux_amd64/a.tar.gz"),
            KeyRejection::NotAnArchive
        );
        assert_eq!(
            reject("algolia/restapi/ns/provtype/1.2.0/linux_amd64/SHA256SUMS"),
            KeyRejection::NotAnArchive
        );
    }

    #[test]
    fn rejects_wrong_segment_count() {
        assert_eq!(
            reject("algolia/restapi/ns/provtype/1.2.0/a.zip"),
            KeyRejection::SegmentCount(2)
        );
        assert_eq!(
            reject("algolia/restapi/ns/provtype/1.2.0/linux_amd64/extra/a.zip"),
            KeyRejection::SegmentCount(4)
        );
        assert_eq!(
            reject("algolia/restapi/ns/provtype//1.2.0/linux_amd64/a.zip"),
            KeyRejection::SegmentCount(4)
        );
    }

    #[test]
    fn rejects_bad_platform_tags() {
        assert_eq!(
            reject("algolia/restapi/ns/provtype/1.2.0/linux/a.zip"),
            KeyRejection::PlatformTag
        );
        assert_eq!(
            reject("algolia/restapi/ns/provtype/1.2.0/linux_amd_64/a.zip"),
            KeyRejection::PlatformTag
        );
    }

    #[test]
    fn rejects_empty_segments() {
        assert_eq!(
            reject("algolia/restapi/ns/provtype/1.2.0/_amd64/a.zip"),
            KeyRejection::EmptySegment
        );
        assert_eq!(
            reject("algolia/restapi/ns/provtype//linux_amd64/a.zip"),
            KeyRejection::EmptySegment
        );
    }

    #[test]
    fn suffix_alone_is_a_filename() {
        assert!(
            parse_key("algolia/restapi/ns/provtype/1.2.0/linux_amd64/.zip", PREFIX, ".zip")
                .is_accepted()
        );
    }

    #[test]
    fn layout_scopes_provider_prefix() {
        let layout = KeyLayout::new("/algolia/restapi/", ".zip");
        assert_eq!(layout.prefix(), "algolia/restapi");
        assert_eq!(layout.provider_prefix("ns", "provtype"), PREFIX);

        let root = KeyLayout::default();
        assert_eq!(root.provider_prefix("ns", "provtype"), "ns/provtype/");
        assert_eq!(root.archive_suffix(), ".zip");
    }

    #[test]
    fn layout_parse_uses_suffix() {
        let layout = KeyLayout::new("base", ".tar.gz");
        let prefix = layout.provider_prefix("ns", "t");
        assert!(layout.parse("base/ns/t/1.0.0/linux_amd64/p.tar.gz", &prefix).is_accepted());
        assert!(!layout.parse("base/ns/t/1.0.0/linux_amd64/p.zip", &prefix).is_accepted());
    }
}
