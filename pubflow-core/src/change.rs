//! Change propagation between two package snapshots.

use std::collections::{BTreeMap, BTreeSet};

use crate::graph::PackageGraph;
use crate::snapshot::PackageSnapshot;

/// Result of comparing a head snapshot against a base snapshot.
#[derive(Debug, Default, Clone)]
pub struct SnapshotDiff {
    /// Packages whose own content hash changed (including additions).
    pub modified: BTreeSet<String>,
    /// Transitive closure of modified packages and their dependents; the
    /// set of packages that must be republished.
    pub needs_publishing: BTreeSet<String>,
    /// Packages present in head but not in base.
    pub added: BTreeSet<String>,
    /// Packages present in base but not in head. Never part of
    /// `needs_publishing`; reported for changelog completeness only.
    pub removed: BTreeSet<String>,
}

/// Determines which packages must be republished given a head snapshot and
/// the snapshot of the prior release (empty base means no prior release).
///
/// Components are visited in dependency-first order, so a dependency's
/// publish requirement is always decided before its dependents are
/// evaluated. That makes the transitive closure a single graph pass instead
/// of an iterative fixpoint.
pub fn diff_snapshots(head: &PackageSnapshot, base: &PackageSnapshot) -> SnapshotDiff {
    let deps: BTreeMap<String, Vec<String>> = head
        .iter()
        .map(|(name, status)| (name.clone(), status.local_dependencies.clone()))
        .collect();
    let graph = PackageGraph::new(&deps);

    let mut diff = SnapshotDiff::default();

    for component in graph.components() {
        let mut component_needs_publishing = false;

        for pkg in component {
            let status = &head[pkg];
            for dep in &status.local_dependencies {
                if diff.needs_publishing.contains(dep) {
                    component_needs_publishing = true;
                }
            }
            let prior_shasum = base.get(pkg).map(|s| s.shasum.as_str());
            if prior_shasum != Some(status.shasum.as_str()) {
                diff.modified.insert(pkg.clone());
                component_needs_publishing = true;
            }
        }

        if component_needs_publishing {
            for pkg in component {
                diff.needs_publishing.insert(pkg.clone());
            }
        }
    }

    diff.added = head
        .keys()
        .filter(|pkg| !base.contains_key(*pkg))
        .cloned()
        .collect();
    diff.removed = base
        .keys()
        .filter(|pkg| !head.contains_key(*pkg))
        .cloned()
        .collect();

    diff
}
