//! Per-commit package snapshots and their status-check wire format.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Name of the status check that carries the serialized snapshot.
pub const PACKAGE_HASHES_CHECK_NAME: &str = "Package tarball hashes";

const SNAPSHOT_SCHEMA_VERSION: u64 = 1;

/// State of a single package at a specific commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageStatus {
    /// Content hash of the packed artifact.
    pub shasum: String,
    /// Names of other local packages this package depends on.
    #[serde(rename = "localDependencies")]
    pub local_dependencies: Vec<String>,
}

/// Mapping from package name to its status, captured at one commit.
///
/// Immutable once produced; only ever compared against other snapshots.
pub type PackageSnapshot = BTreeMap<String, PackageStatus>;

/// Serializes a snapshot into the status-check text payload
/// (`schema_version` 1).
pub fn serialize_snapshot(snapshot: &PackageSnapshot) -> Result<String> {
    let payload = serde_json::json!({
        "schema_version": SNAPSHOT_SCHEMA_VERSION,
        "packages": snapshot,
    });
    Ok(serde_json::to_string_pretty(&payload)?)
}

/// Deserializes a status-check text payload back into a snapshot.
///
/// # Errors
///
/// Returns [`Error::SchemaVersionMismatch`] for any schema version other
/// than 1; unknown versions never default silently.
pub fn deserialize_snapshot(text: &str) -> Result<PackageSnapshot> {
    let value: Value = serde_json::from_str(text)?;
    match value.get("schema_version").and_then(Value::as_u64) {
        Some(SNAPSHOT_SCHEMA_VERSION) => {
            let packages = value
                .get("packages")
                .cloned()
                .unwrap_or_else(|| Value::Object(Default::default()));
            Ok(serde_json::from_value(packages)?)
        }
        found => Err(Error::SchemaVersionMismatch {
            context: "package snapshot check payload",
            found,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_snapshot_payload() {
        let mut snapshot = PackageSnapshot::new();
        snapshot.insert(
            "pkg-a".to_string(),
            PackageStatus {
                shasum: "abc123".to_string(),
                local_dependencies: vec![],
            },
        );
        snapshot.insert(
            "pkg-b".to_string(),
            PackageStatus {
                shasum: "def456".to_string(),
                local_dependencies: vec!["pkg-a".to_string()],
            },
        );

        let text = serialize_snapshot(&snapshot).unwrap();
        let parsed = deserialize_snapshot(&text).unwrap();
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn rejects_unknown_schema_version() {
        let text = r#"{"schema_version": 7, "packages": {}}"#;
        let err = deserialize_snapshot(text).unwrap_err();
        assert!(matches!(
            err,
            Error::SchemaVersionMismatch { found: Some(7), .. }
        ));
    }

    #[test]
    fn rejects_missing_schema_version() {
        let err = deserialize_snapshot(r#"{"packages": {}}"#).unwrap_err();
        assert!(matches!(err, Error::SchemaVersionMismatch { found: None, .. }));
    }
}
