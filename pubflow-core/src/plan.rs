//! Publish plans: the per-deployment mapping of package to target version,
//! distribution tag, and publish flag.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::releases::ReleaseManifest;
use crate::workspace::WorkspaceMap;

/// Distribution tag for canary publishes.
pub const CANARY_DIST_TAG: &str = "canary";

/// Distribution tag for stable publishes. Backport channels are out of
/// scope.
pub const STABLE_DIST_TAG: &str = "latest";

/// Target state for one package within a publish attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub dir: PathBuf,
    pub version: String,
    pub dist_tag: String,
    pub publish: bool,
    pub local_dependencies: Vec<String>,
}

/// Derived, per-deployment plan; computed fresh each run and never
/// persisted.
pub type PublishPlan = BTreeMap<String, PlanEntry>;

/// Builds the plan for a canary publish: every workspace package gets the
/// canary version except those whose already-published version is held
/// unchanged.
pub fn canary_plan(
    workspace: &WorkspaceMap,
    unchanged_packages: &BTreeMap<String, String>,
    canary_version: &str,
) -> PublishPlan {
    workspace
        .iter()
        .map(|(name, pkg)| {
            let entry = match unchanged_packages.get(name) {
                Some(held_version) => PlanEntry {
                    dir: pkg.location.clone(),
                    version: held_version.clone(),
                    dist_tag: CANARY_DIST_TAG.to_string(),
                    publish: false,
                    local_dependencies: pkg.local_dependencies.clone(),
                },
                None => PlanEntry {
                    dir: pkg.location.clone(),
                    version: canary_version.to_string(),
                    dist_tag: CANARY_DIST_TAG.to_string(),
                    publish: true,
                    local_dependencies: pkg.local_dependencies.clone(),
                },
            };
            (name.clone(), entry)
        })
        .collect()
}

/// Builds the plan for a stable publish from a reviewed release manifest.
///
/// # Errors
///
/// Fails with [`Error::PackageNotFound`] if the manifest names a package
/// the workspace no longer contains; manual manifest edits are scaffolded,
/// never reconciled automatically.
pub fn stable_plan(workspace: &WorkspaceMap, manifest: &ReleaseManifest) -> Result<PublishPlan> {
    let mut plan = PublishPlan::new();
    for (name, entry) in manifest {
        let pkg = workspace
            .get(name)
            .ok_or_else(|| Error::PackageNotFound { name: name.clone() })?;
        plan.insert(
            name.clone(),
            PlanEntry {
                dir: pkg.location.clone(),
                version: entry.version.clone(),
                dist_tag: STABLE_DIST_TAG.to_string(),
                publish: entry.should_publish(),
                local_dependencies: pkg.local_dependencies.clone(),
            },
        );
    }
    Ok(plan)
}
