//! Release naming conventions and the persisted release manifest.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Branch prefix for scaffolded, human-editable draft releases.
pub const DRAFT_BRANCH_PREFIX: &str = "draft-releases/";

/// Tag namespace for permanently recorded releases.
pub const RELEASE_TAG_PREFIX: &str = "releases/";

/// Repository directory holding one subdirectory per release id.
pub const RELEASES_DIRECTORY_PATH: &str = ".pubflow/releases";

pub const RELEASE_MANIFEST_FILENAME: &str = "release.toml";
pub const RELEASE_NOTES_FILENAME: &str = "release_notes.md";

/// One package entry in a release manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub version: String,
    /// `Some(false)` marks an intentionally unchanged package whose version
    /// must be preserved verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish: Option<bool>,
}

impl ManifestEntry {
    pub fn should_publish(&self) -> bool {
        self.publish != Some(false)
    }
}

/// Structured release manifest: package name to version + publish flag.
pub type ReleaseManifest = BTreeMap<String, ManifestEntry>;

/// Repository path of the manifest for a release id.
pub fn manifest_path(id: &str) -> String {
    format!("{RELEASES_DIRECTORY_PATH}/{id}/{RELEASE_MANIFEST_FILENAME}")
}

/// Repository path of the release notes for a release id.
pub fn notes_path(id: &str) -> String {
    format!("{RELEASES_DIRECTORY_PATH}/{id}/{RELEASE_NOTES_FILENAME}")
}

/// Parses a release manifest. Structural check only: scaffolded manifests
/// carry `TODO` placeholder versions until a reviewer fills them in.
pub fn parse_manifest(text: &str) -> Result<ReleaseManifest> {
    toml::from_str(text).map_err(|error| Error::Toml {
        error,
        context: RELEASE_MANIFEST_FILENAME.to_string(),
    })
}

/// Validates that every manifest version is real semver. Required before
/// publishing; a leftover `TODO` placeholder fails here.
pub fn validate_manifest_versions(manifest: &ReleaseManifest) -> Result<()> {
    for (package, entry) in manifest {
        semver::Version::parse(&entry.version).map_err(|e| Error::InvalidVersion {
            package: package.clone(),
            message: format!("{} ({})", entry.version, e),
        })?;
    }
    Ok(())
}

/// Builds a tag name of the form `releases/<date>/<HHMMSS>/<id>`.
///
/// Colons cannot appear in git tag names, so the time portion is compacted.
pub fn release_tag_name(datetime: &DateTime<Utc>, id: &str) -> String {
    format!(
        "{RELEASE_TAG_PREFIX}{}/{}/{id}",
        datetime.format("%Y-%m-%d"),
        datetime.format("%H%M%S"),
    )
}

/// Extracts the release id from a tag name produced by
/// [`release_tag_name`], if the tag has the expected shape.
pub fn id_from_tag_name(tag_name: &str) -> Option<&str> {
    let rest = tag_name.strip_prefix(RELEASE_TAG_PREFIX)?;
    let mut parts = rest.splitn(3, '/');
    let _date = parts.next()?;
    let _time = parts.next()?;
    parts.next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn tag_name_round_trip() {
        let datetime = Utc.with_ymd_and_hms(2020, 4, 7, 9, 5, 33).unwrap();
        let tag = release_tag_name(&datetime, "misty-firefly");
        assert_eq!(tag, "releases/2020-04-07/090533/misty-firefly");
        assert_eq!(id_from_tag_name(&tag), Some("misty-firefly"));
    }

    #[test]
    fn id_from_foreign_tag_is_none() {
        assert_eq!(id_from_tag_name("v1.2.3"), None);
        assert_eq!(id_from_tag_name("releases/2020-04-07"), None);
    }

    #[test]
    fn parses_manifest_with_publish_flags() {
        let text = r#"
[pkg-a]
version = "1.2.0"

[pkg-b]
version = "0.4.1"
publish = false
"#;
        let manifest = parse_manifest(text).unwrap();
        assert!(manifest["pkg-a"].should_publish());
        assert!(!manifest["pkg-b"].should_publish());
    }

    #[test]
    fn placeholder_versions_parse_but_fail_validation() {
        let manifest = parse_manifest("[pkg-a]\nversion = \"TODO\"\n").unwrap();
        let err = validate_manifest_versions(&manifest).unwrap_err();
        assert!(matches!(err, Error::InvalidVersion { .. }));
    }
}
