//! Event handlers: one per inbound event kind.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::deployments::{StablePayload, STABLE_TASK_ID};
use crate::dispatch::{self, Dispatcher};
use crate::error::{Error, Result};
use crate::forge::{CheckAction, CheckConclusion, CheckOutput, Deployment};
use crate::releases::{self, ReleaseManifest, DRAFT_BRANCH_PREFIX};
use crate::router::{EventContext, RepoInfo};
use crate::scaffold::scaffold_release;
use crate::snapshot::{serialize_snapshot, PackageSnapshot, PackageStatus, PACKAGE_HASHES_CHECK_NAME};

const RELEASE_CHECK_NAME: &str = "Release";
const RELEASE_VALIDATION_CHECK_NAME: &str = "Release validation";

/// Check-run action identifier that requests a canary publish.
pub const CANARY_PUBLISH_ACTION_ID: &str = "publish_canary";
/// Check-run action identifier that requests a release pull request.
pub const RELEASE_PR_ACTION_ID: &str = "release_pr";

#[derive(Debug, Deserialize)]
struct CommitId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PushEvent {
    #[serde(rename = "ref")]
    git_ref: String,
    #[serde(default)]
    deleted: bool,
    head_commit: Option<CommitId>,
    #[serde(default)]
    commits: Vec<CommitId>,
    repository: RepoInfo,
}

/// Push: records the package-hash snapshot for the new head, prunes stale
/// draft release branches, and offers release action buttons. Pushes to
/// draft branches get a validation check instead.
pub async fn on_push(ctx: Arc<EventContext>, payload: Value) -> Result<()> {
    let event: PushEvent = serde_json::from_value(payload)?;

    let branch = match event.git_ref.strip_prefix("refs/heads/") {
        Some(branch) => branch.to_string(),
        None => return Ok(()),
    };
    let head_commit = match (&event.head_commit, event.deleted) {
        (Some(head), false) => head.id.clone(),
        _ => {
            debug!("ref was deleted, skipping push event");
            return Ok(());
        }
    };

    if branch.starts_with(DRAFT_BRANCH_PREFIX) {
        return validate_draft_release(&ctx, &branch, &head_commit).await;
    }

    record_package_hashes(&ctx, &head_commit).await?;
    close_stale_draft_pulls(&ctx, &event.repository, &branch).await?;

    for commit in &event.commits {
        let mut actions = vec![CheckAction {
            identifier: CANARY_PUBLISH_ACTION_ID.to_string(),
            label: "Canary release".to_string(),
            description: "Publish a canary release".to_string(),
        }];
        if branch == event.repository.default_branch && commit.id == head_commit {
            actions.push(CheckAction {
                identifier: RELEASE_PR_ACTION_ID.to_string(),
                label: "Release PR".to_string(),
                description: "Create a release PR".to_string(),
            });
        }
        ctx.forge
            .create_check(
                RELEASE_CHECK_NAME,
                &commit.id,
                Some(CheckConclusion::Neutral),
                Some(CheckOutput {
                    title: "Release".to_string(),
                    summary: "Release actions".to_string(),
                    text: String::new(),
                }),
                &actions,
            )
            .await?;
    }

    Ok(())
}

/// Packs every workspace package and publishes the resulting snapshot as a
/// completed status check on the commit. Packing is issued concurrently;
/// it has no cross-package effect.
async fn record_package_hashes(ctx: &EventContext, head_sha: &str) -> Result<()> {
    let workspace = ctx.workspace.list_packages().await?;

    let mut handles = Vec::with_capacity(workspace.len());
    for (name, pkg) in &workspace {
        let tool = Arc::clone(&ctx.tool);
        let dir = ctx.repo_root.join(&pkg.location);
        let name = name.clone();
        let local_dependencies = pkg.local_dependencies.clone();
        handles.push(tokio::spawn(async move {
            let packed = tool.pack(&dir).await?;
            Ok::<_, Error>((
                name,
                PackageStatus {
                    shasum: packed.shasum,
                    local_dependencies,
                },
            ))
        }));
    }

    let mut snapshot = PackageSnapshot::new();
    for handle in handles {
        let (name, status) = handle
            .await
            .map_err(|e| Error::Forge(format!("pack task failed: {e}")))??;
        snapshot.insert(name, status);
    }

    let text = serialize_snapshot(&snapshot)?;
    ctx.forge
        .create_check(
            PACKAGE_HASHES_CHECK_NAME,
            head_sha,
            Some(CheckConclusion::Success),
            Some(CheckOutput {
                title: "Package tarball hashes".to_string(),
                summary: "Package tarball hashes".to_string(),
                text,
            }),
            &[],
        )
        .await?;

    info!(sha = head_sha, packages = snapshot.len(), "recorded package hashes");
    Ok(())
}

/// Validates a pushed draft release branch: the scaffolded manifest must
/// still be well-formed. Version placeholders are allowed here; semver
/// strictness applies at publish time.
async fn validate_draft_release(ctx: &EventContext, branch: &str, head_sha: &str) -> Result<()> {
    let check_id = ctx
        .forge
        .create_check(RELEASE_VALIDATION_CHECK_NAME, head_sha, None, None, &[])
        .await?;

    let conclusion = match draft_manifest(ctx, branch).await {
        Ok(_) => CheckConclusion::Success,
        Err(err) => {
            warn!(branch, %err, "draft release validation failed");
            CheckConclusion::Failure
        }
    };
    ctx.forge.complete_check(check_id, conclusion).await
}

async fn draft_manifest(ctx: &EventContext, branch: &str) -> Result<ReleaseManifest> {
    let id = draft_branch_release_id(branch)
        .ok_or_else(|| Error::Forge(format!("malformed draft branch name: {branch}")))?;
    let text = ctx
        .forge
        .get_file(&releases::manifest_path(id), branch)
        .await?
        .ok_or_else(|| Error::Forge(format!("no release manifest on {branch}")))?;
    releases::parse_manifest(&text)
}

/// Extracts the release id from a `draft-releases/<shorthash>/<id>/<uid>`
/// branch name.
fn draft_branch_release_id(branch: &str) -> Option<&str> {
    branch
        .strip_prefix(DRAFT_BRANCH_PREFIX)?
        .split('/')
        .nth(1)
}

/// Deletes draft release branches whose open pull requests target a branch
/// that just advanced; their contexts are stale.
async fn close_stale_draft_pulls(
    ctx: &EventContext,
    repo: &RepoInfo,
    base_branch: &str,
) -> Result<()> {
    let pulls = ctx.forge.list_open_pulls(base_branch).await?;
    for pull in pulls {
        if pull.head_repo_id == repo.id && pull.head_ref.starts_with(DRAFT_BRANCH_PREFIX) {
            info!(branch = %pull.head_ref, "closing outdated draft release");
            ctx.forge.delete_branch(&pull.head_ref).await?;
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct PullRequestEvent {
    action: String,
    pull_request: PullRequestData,
    repository: RepoInfo,
}

#[derive(Debug, Deserialize)]
struct PullRequestData {
    merged: bool,
    merge_commit_sha: Option<String>,
    head: PullRequestHead,
}

#[derive(Debug, Deserialize)]
struct PullRequestHead {
    #[serde(rename = "ref")]
    git_ref: String,
    repo: PullRequestHeadRepo,
}

#[derive(Debug, Deserialize)]
struct PullRequestHeadRepo {
    id: u64,
}

/// Pull request closed: a merged draft release branch finalizes the
/// release by creating a stable deployment for the merge commit.
pub async fn on_pull_request(ctx: Arc<EventContext>, payload: Value) -> Result<()> {
    let event: PullRequestEvent = serde_json::from_value(payload)?;
    if event.action != "closed" {
        return Ok(());
    }

    let pr = &event.pull_request;
    if !pr.merged
        || pr.head.repo.id != event.repository.id
        || !pr.head.git_ref.starts_with(DRAFT_BRANCH_PREFIX)
    {
        return Ok(());
    }

    let merge_sha = pr
        .merge_commit_sha
        .as_deref()
        .ok_or_else(|| Error::Forge("merged pull request without merge commit".to_string()))?;
    let release_id = draft_branch_release_id(&pr.head.git_ref)
        .ok_or_else(|| Error::Forge(format!("malformed draft branch: {}", pr.head.git_ref)))?;

    dispatch::create_stable_deployment(ctx.forge.as_ref(), merge_sha, release_id).await?;
    ctx.forge.delete_branch(&pr.head.git_ref).await?;

    info!(release_id, merge_sha, "stable deployment created for merged release");
    Ok(())
}

#[derive(Debug, Deserialize)]
struct DeploymentEvent {
    deployment: DeploymentRecord,
}

#[derive(Debug, Deserialize)]
struct DeploymentRecord {
    id: u64,
    sha: String,
    task: String,
    payload: Value,
    updated_at: DateTime<Utc>,
}

impl From<DeploymentRecord> for Deployment {
    fn from(record: DeploymentRecord) -> Self {
        Deployment {
            id: record.id,
            sha: record.sha,
            task: record.task,
            payload: record.payload,
            updated_at: record.updated_at,
        }
    }
}

/// Deployment created: run the publish flow it describes.
pub async fn on_deployment(ctx: Arc<EventContext>, payload: Value) -> Result<()> {
    let event: DeploymentEvent = serde_json::from_value(payload)?;
    let dispatcher = Dispatcher::new(
        Arc::clone(&ctx.forge),
        Arc::clone(&ctx.workspace),
        Arc::clone(&ctx.tool),
        ctx.repo_root.clone(),
    );
    dispatcher.handle_deployment(&event.deployment.into()).await
}

#[derive(Debug, Deserialize)]
struct DeploymentStatusEvent {
    deployment_status: DeploymentStatusData,
    deployment: DeploymentRecord,
}

#[derive(Debug, Deserialize)]
struct DeploymentStatusData {
    state: String,
}

/// Deployment status: a successful stable deployment is permanently
/// recorded as a tagged release with formatted notes.
pub async fn on_deployment_status(ctx: Arc<EventContext>, payload: Value) -> Result<()> {
    let event: DeploymentStatusEvent = serde_json::from_value(payload)?;
    if event.deployment.task != STABLE_TASK_ID || event.deployment_status.state != "success" {
        return Ok(());
    }

    let StablePayload { id } = StablePayload::deserialize(&event.deployment.payload)?;
    let sha = &event.deployment.sha;

    let notes_path = releases::notes_path(&id);
    let manifest_path = releases::manifest_path(&id);
    let (notes, manifest_text) = tokio::try_join!(
        ctx.forge.get_file(&notes_path, sha),
        ctx.forge.get_file(&manifest_path, sha),
    )?;
    let notes =
        notes.ok_or_else(|| Error::Forge(format!("release notes missing for {id} at {sha}")))?;
    let manifest_text = manifest_text
        .ok_or_else(|| Error::Forge(format!("release manifest missing for {id} at {sha}")))?;
    let manifest = releases::parse_manifest(&manifest_text)?;

    let body = annotate_notes(&notes, &manifest);
    let tag_name = releases::release_tag_name(&event.deployment.updated_at, &id);
    let title = format!(
        "{} \"{}\"",
        event.deployment.updated_at.format("%Y-%m-%d"),
        id
    );

    ctx.forge.create_release(&tag_name, sha, &title, &body).await?;
    info!(tag_name, sha, "release recorded");
    Ok(())
}

/// Rewrites top-level `# package` headings to `# package@version` using
/// the reviewed manifest.
fn annotate_notes(notes: &str, manifest: &ReleaseManifest) -> String {
    let mut lines: Vec<String> = Vec::new();
    for line in notes.lines() {
        match line.strip_prefix("# ").map(str::trim) {
            Some(name) if manifest.contains_key(name) => {
                lines.push(format!("# {name}@{}", manifest[name].version));
            }
            _ => lines.push(line.to_string()),
        }
    }
    let mut body = lines.join("\n");
    if notes.ends_with('\n') {
        body.push('\n');
    }
    body
}

#[derive(Debug, Deserialize)]
struct CheckRunEvent {
    action: String,
    requested_action: Option<RequestedAction>,
    check_run: CheckRunData,
    repository: RepoInfo,
}

#[derive(Debug, Deserialize)]
struct RequestedAction {
    identifier: String,
}

#[derive(Debug, Deserialize)]
struct CheckRunData {
    head_sha: String,
    check_suite: CheckSuiteData,
}

#[derive(Debug, Deserialize)]
struct CheckSuiteData {
    head_branch: Option<String>,
}

/// Check-run action button: either publish a canary for the commit or
/// scaffold a release pull request.
pub async fn on_check_run(ctx: Arc<EventContext>, payload: Value) -> Result<()> {
    let event: CheckRunEvent = serde_json::from_value(payload)?;
    if event.action != "requested_action" {
        return Ok(());
    }
    let identifier = match &event.requested_action {
        Some(action) => action.identifier.as_str(),
        None => return Ok(()),
    };

    match identifier {
        CANARY_PUBLISH_ACTION_ID => {
            let id =
                dispatch::create_canary_deployment(ctx.forge.as_ref(), &event.check_run.head_sha)
                    .await?;
            info!(deployment = id, sha = %event.check_run.head_sha, "canary deployment created");
            Ok(())
        }
        RELEASE_PR_ACTION_ID => {
            let branch = event
                .check_run
                .check_suite
                .head_branch
                .clone()
                .unwrap_or_else(|| event.repository.default_branch.clone());
            scaffold_release(&ctx.forge, &event.repository, &event.check_run.head_sha, &branch)
                .await?;
            Ok(())
        }
        other => {
            debug!(identifier = other, "unknown check action, ignoring");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::releases::ManifestEntry;
    use std::collections::BTreeMap;

    #[test]
    fn annotates_known_package_headings() {
        let mut manifest: ReleaseManifest = BTreeMap::new();
        manifest.insert(
            "pkg-a".to_string(),
            ManifestEntry {
                version: "2.0.0".to_string(),
                publish: None,
            },
        );

        let notes = "# pkg-a\n - fix things\n\n# unknown\n - other\n";
        let annotated = annotate_notes(notes, &manifest);
        assert!(annotated.contains("# pkg-a@2.0.0"));
        assert!(annotated.contains("# unknown\n"));
        assert!(annotated.ends_with('\n'));
    }

    #[test]
    fn extracts_release_id_from_draft_branch() {
        assert_eq!(
            draft_branch_release_id("draft-releases/0abc123/misty-firefly/beef"),
            Some("misty-firefly")
        );
        assert_eq!(draft_branch_release_id("feature/misty-firefly"), None);
    }
}
