//! Release context builder: reconstructs "what changed since the last
//! release" for a target commit by walking commit history.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::change::diff_snapshots;
use crate::error::{Error, Result};
use crate::forge::{CommitInfo, ForgeClient};
use crate::releases::{self, RELEASE_TAG_PREFIX};
use crate::snapshot::{self, PackageSnapshot, PACKAGE_HASHES_CHECK_NAME};

const HISTORY_PAGE_SIZE: u32 = 100;

/// Per-package conclusion of the context builder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageContext {
    /// Whether the package needs a new publish relative to the prior
    /// release.
    pub publish: bool,
    /// Version recorded in the prior release's manifest, if any.
    pub prior_version: Option<String>,
    /// Commit messages attributed to this package since the prior release.
    pub changes: Vec<String>,
}

/// Everything needed to scaffold a release for one commit.
#[derive(Debug, Clone)]
pub struct ReleaseContext {
    /// Tree sha of the target commit, used as the base tree for the
    /// scaffolding commit.
    pub tree_sha: String,
    /// Commit of the nearest ancestor release, absent on a first release.
    pub prior_release_sha: Option<String>,
    /// Prior-release index: commit sha to release tag name, rebuilt on
    /// every run.
    pub existing_releases: BTreeMap<String, String>,
    pub packages: BTreeMap<String, PackageContext>,
}

/// Fetches the package snapshot recorded for a commit, treating any lookup
/// or parse failure as "unknown": changelog attribution tolerates gaps.
pub async fn snapshot_for_commit(
    forge: &dyn ForgeClient,
    sha: &str,
) -> Option<PackageSnapshot> {
    let text = match forge.latest_check_text(sha, PACKAGE_HASHES_CHECK_NAME).await {
        Ok(Some(text)) => text,
        Ok(None) => return None,
        Err(err) => {
            debug!(sha, %err, "snapshot lookup failed, treating as unknown");
            return None;
        }
    };
    match snapshot::deserialize_snapshot(&text) {
        Ok(snapshot) => Some(snapshot),
        Err(err) => {
            warn!(sha, %err, "invalid snapshot payload, treating as unknown");
            None
        }
    }
}

/// Builds the prior-release index by scanning all release tags.
async fn release_index(forge: &dyn ForgeClient) -> Result<BTreeMap<String, String>> {
    let tags = forge.list_tags(RELEASE_TAG_PREFIX).await?;
    Ok(tags.into_iter().map(|tag| (tag.sha, tag.name)).collect())
}

/// Builds the release context for `sha` on `branch`.
///
/// Returns `Ok(None)` when no release should be scaffolded: the commit is
/// already released, no snapshot exists for it, or the branch tip moved
/// since the event fired (staleness guard). These are silent no-ops, not
/// errors.
pub async fn build_release_context(
    forge: &Arc<dyn ForgeClient>,
    sha: &str,
    branch: &str,
) -> Result<Option<ReleaseContext>> {
    let (head_snapshot, existing_releases, branch_tip) = tokio::try_join!(
        async { Ok(snapshot_for_commit(forge.as_ref(), sha).await) },
        release_index(forge.as_ref()),
        forge.branch_head(branch),
    )?;

    let head_snapshot = match head_snapshot {
        Some(snapshot) => snapshot,
        None => {
            debug!(sha, "no snapshot for target commit, skipping");
            return Ok(None);
        }
    };
    if existing_releases.contains_key(sha) {
        debug!(sha, "commit already has a release tag, skipping");
        return Ok(None);
    }
    if branch_tip != sha {
        debug!(sha, branch, tip = %branch_tip, "branch moved, skipping stale request");
        return Ok(None);
    }

    // First release ever: everything publishes, nothing to attribute.
    if existing_releases.is_empty() {
        let commit = forge.get_commit(sha).await?;
        let packages = head_snapshot
            .keys()
            .map(|pkg| {
                (
                    pkg.clone(),
                    PackageContext {
                        publish: true,
                        ..Default::default()
                    },
                )
            })
            .collect();
        return Ok(Some(ReleaseContext {
            tree_sha: commit.tree_sha,
            prior_release_sha: None,
            existing_releases,
            packages,
        }));
    }

    let (relevant_commits, prior_release_sha) =
        walk_to_prior_release(forge.as_ref(), sha, &existing_releases).await?;

    let tree_sha = match relevant_commits.first() {
        Some(head) => head.tree_sha.clone(),
        None => forge.get_commit(sha).await?.tree_sha,
    };

    let snapshots = fetch_snapshots(forge, &relevant_commits, sha, &head_snapshot).await?;

    // Attribute hash changes between consecutive commits, oldest first. A
    // commit is only attributable when both its own snapshot and its
    // immediate parent's are known; otherwise it is skipped for changelog
    // purposes but still covered by the final head-vs-base diff.
    let mut package_changes: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut parent_snapshot: Option<&PackageSnapshot> = None;
    for (commit, commit_snapshot) in relevant_commits.iter().zip(&snapshots).rev() {
        if let (Some(current), Some(parent)) = (commit_snapshot.as_ref(), parent_snapshot) {
            let diff = diff_snapshots(current, parent);
            for pkg in &diff.needs_publishing {
                package_changes
                    .entry(pkg.clone())
                    .or_default()
                    .push(commit.message.clone());
            }
        }
        parent_snapshot = commit_snapshot.as_ref();
    }

    let prior_versions = match prior_release_sha
        .as_deref()
        .and_then(|prior| existing_releases.get(prior))
    {
        Some(tag_name) => prior_manifest_versions(forge.as_ref(), tag_name).await?,
        None => BTreeMap::new(),
    };

    // The publish decision compares the target against the prior release's
    // snapshot, not against the immediate parent.
    let base_snapshot = snapshots
        .last()
        .and_then(|s| s.clone())
        .unwrap_or_default();
    let overall = diff_snapshots(&head_snapshot, &base_snapshot);

    let packages = head_snapshot
        .keys()
        .map(|pkg| {
            (
                pkg.clone(),
                PackageContext {
                    publish: overall.needs_publishing.contains(pkg),
                    prior_version: prior_versions.get(pkg).cloned(),
                    changes: package_changes.get(pkg).cloned().unwrap_or_default(),
                },
            )
        })
        .collect();

    Ok(Some(ReleaseContext {
        tree_sha,
        prior_release_sha,
        existing_releases,
        packages,
    }))
}

/// Walks history newest-first from `sha`, stopping at the first ancestor
/// present in the prior-release index. That ancestor is included as the
/// base commit of the walk.
async fn walk_to_prior_release(
    forge: &dyn ForgeClient,
    sha: &str,
    existing_releases: &BTreeMap<String, String>,
) -> Result<(Vec<CommitInfo>, Option<String>)> {
    let mut relevant = Vec::new();
    let mut prior_release_sha = None;
    let mut page = 1;

    'walk: loop {
        let commits = forge.list_commits(sha, page, HISTORY_PAGE_SIZE).await?;
        if commits.is_empty() {
            break;
        }
        for commit in commits {
            let is_prior_release = existing_releases.contains_key(&commit.sha);
            if is_prior_release {
                prior_release_sha = Some(commit.sha.clone());
            }
            relevant.push(commit);
            if is_prior_release {
                break 'walk;
            }
        }
        page += 1;
    }

    Ok((relevant, prior_release_sha))
}

/// Fetches the snapshot of every relevant commit concurrently, reusing the
/// already-fetched head snapshot. The result preserves commit order; only
/// latency is overlapped.
async fn fetch_snapshots(
    forge: &Arc<dyn ForgeClient>,
    commits: &[CommitInfo],
    head_sha: &str,
    head_snapshot: &PackageSnapshot,
) -> Result<Vec<Option<PackageSnapshot>>> {
    let mut handles = Vec::with_capacity(commits.len());
    for commit in commits {
        if commit.sha == head_sha {
            handles.push(None);
            continue;
        }
        let forge = Arc::clone(forge);
        let sha = commit.sha.clone();
        handles.push(Some(tokio::spawn(async move {
            snapshot_for_commit(forge.as_ref(), &sha).await
        })));
    }

    let mut snapshots = Vec::with_capacity(commits.len());
    for handle in handles {
        match handle {
            None => snapshots.push(Some(head_snapshot.clone())),
            Some(handle) => {
                let snapshot = handle
                    .await
                    .map_err(|e| Error::Forge(format!("snapshot fetch task failed: {e}")))?;
                snapshots.push(snapshot);
            }
        }
    }
    Ok(snapshots)
}

/// Reads the prior release's manifest to recover per-package versions. A
/// missing or unparsable manifest degrades to "no prior versions".
async fn prior_manifest_versions(
    forge: &dyn ForgeClient,
    tag_name: &str,
) -> Result<BTreeMap<String, String>> {
    let id = match releases::id_from_tag_name(tag_name) {
        Some(id) => id,
        None => {
            warn!(tag_name, "release tag has unexpected shape, ignoring");
            return Ok(BTreeMap::new());
        }
    };
    let text = match forge.get_file(&releases::manifest_path(id), tag_name).await? {
        Some(text) => text,
        None => {
            warn!(tag_name, "prior release manifest missing");
            return Ok(BTreeMap::new());
        }
    };
    let manifest = releases::parse_manifest(&text)?;
    Ok(manifest
        .into_iter()
        .map(|(pkg, entry)| (pkg, entry.version))
        .collect())
}
