//! Deployment task kinds and their versioned payload schemas.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{Error, Result};

/// Task identifier carried on canary deployment records.
pub const CANARY_TASK_ID: &str = "publish:canary";

/// Task identifier carried on stable deployment records.
pub const STABLE_TASK_ID: &str = "publish:stable";

/// Deployment environment name used for all publish deployments.
pub const DEPLOY_ENVIRONMENT: &str = "npm";

/// Payload of a canary deployment: a monotonically increasing sequence
/// number per commit, plus packages whose already-published versions must
/// be held unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanaryPayload {
    pub id: u64,
    pub unchanged_packages: BTreeMap<String, String>,
}

impl CanaryPayload {
    /// Serializes at the current schema version (2).
    pub fn serialize(&self) -> Value {
        json!({
            "schema_version": 2,
            "id": self.id,
            "unchangedPackages": self.unchanged_packages,
        })
    }

    /// Deserializes any known schema version.
    ///
    /// Version 1 predates `unchangedPackages` and maps to an empty hold
    /// set. Unknown versions fail explicitly rather than defaulting.
    pub fn deserialize(payload: &Value) -> Result<Self> {
        #[derive(Deserialize)]
        struct V1 {
            id: u64,
        }
        #[derive(Deserialize)]
        struct V2 {
            id: u64,
            #[serde(rename = "unchangedPackages", default)]
            unchanged_packages: BTreeMap<String, String>,
        }

        match payload.get("schema_version").and_then(Value::as_u64) {
            Some(1) => {
                let v1: V1 = serde_json::from_value(payload.clone())?;
                Ok(Self {
                    id: v1.id,
                    unchanged_packages: BTreeMap::new(),
                })
            }
            Some(2) => {
                let v2: V2 = serde_json::from_value(payload.clone())?;
                Ok(Self {
                    id: v2.id,
                    unchanged_packages: v2.unchanged_packages,
                })
            }
            found => Err(Error::SchemaVersionMismatch {
                context: "canary deployment payload",
                found,
            }),
        }
    }
}

/// Payload of a stable deployment: the id of a scaffolded release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StablePayload {
    pub id: String,
}

impl StablePayload {
    pub fn serialize(&self) -> Value {
        json!({
            "schema_version": 1,
            "id": self.id,
        })
    }

    pub fn deserialize(payload: &Value) -> Result<Self> {
        #[derive(Deserialize)]
        struct V1 {
            id: String,
        }

        match payload.get("schema_version").and_then(Value::as_u64) {
            Some(1) => {
                let v1: V1 = serde_json::from_value(payload.clone())?;
                Ok(Self { id: v1.id })
            }
            found => Err(Error::SchemaVersionMismatch {
                context: "stable deployment payload",
                found,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canary_v1_maps_to_empty_hold_set() {
        let payload = json!({ "schema_version": 1, "id": 4 });
        let parsed = CanaryPayload::deserialize(&payload).unwrap();
        assert_eq!(parsed.id, 4);
        assert!(parsed.unchanged_packages.is_empty());
    }

    #[test]
    fn canary_round_trips_at_v2() {
        let mut unchanged = BTreeMap::new();
        unchanged.insert("pkg-a".to_string(), "1.0.0".to_string());
        let payload = CanaryPayload {
            id: 9,
            unchanged_packages: unchanged,
        };
        let parsed = CanaryPayload::deserialize(&payload.serialize()).unwrap();
        assert_eq!(parsed, payload);
    }

    #[test]
    fn unknown_versions_are_rejected() {
        let err = CanaryPayload::deserialize(&json!({ "schema_version": 3, "id": 0 }));
        assert!(matches!(
            err,
            Err(Error::SchemaVersionMismatch { found: Some(3), .. })
        ));

        let err = StablePayload::deserialize(&json!({ "id": "calm-lake" }));
        assert!(matches!(
            err,
            Err(Error::SchemaVersionMismatch { found: None, .. })
        ));
    }
}
