//! Forge client contract: the read/write operations the engine needs from
//! the hosting platform.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::Result;

/// A commit as seen by the engine: identity, tree, and message.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub sha: String,
    pub tree_sha: String,
    pub message: String,
}

/// A ref under the tag namespace.
#[derive(Debug, Clone)]
pub struct TagRef {
    /// Tag name with the `refs/tags/` prefix stripped.
    pub name: String,
    pub sha: String,
}

/// A deployment record on the forge.
#[derive(Debug, Clone)]
pub struct Deployment {
    pub id: u64,
    pub sha: String,
    pub task: String,
    pub payload: Value,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle states reported on a deployment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentState {
    InProgress,
    Success,
    Error,
}

impl DeploymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentState::InProgress => "in_progress",
            DeploymentState::Success => "success",
            DeploymentState::Error => "error",
        }
    }
}

/// Terminal conclusion of a check run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckConclusion {
    Success,
    Failure,
    Neutral,
}

impl CheckConclusion {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckConclusion::Success => "success",
            CheckConclusion::Failure => "failure",
            CheckConclusion::Neutral => "neutral",
        }
    }
}

/// Free-form output attached to a check run.
#[derive(Debug, Clone)]
pub struct CheckOutput {
    pub title: String,
    pub summary: String,
    pub text: String,
}

/// An action button offered on a check run.
#[derive(Debug, Clone)]
pub struct CheckAction {
    pub identifier: String,
    pub label: String,
    pub description: String,
}

/// Request to create a deployment record.
#[derive(Debug, Clone)]
pub struct NewDeployment {
    pub git_ref: String,
    pub task: String,
    pub payload: Value,
    pub environment: String,
    pub description: String,
}

/// One file written as part of a scaffolding commit.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub path: String,
    pub content: String,
}

/// An open pull request, reduced to what the engine inspects.
#[derive(Debug, Clone)]
pub struct PullRequest {
    pub number: u64,
    pub head_ref: String,
    pub head_repo_id: u64,
}

/// Operations the engine performs against the hosting platform.
///
/// Implementations are constructed for a single repository; every method is
/// a suspension point for the cooperative scheduler. Implementations must
/// fail loudly rather than return partial data.
#[async_trait]
pub trait ForgeClient: Send + Sync {
    /// Fetches one commit with its tree sha and message.
    async fn get_commit(&self, sha: &str) -> Result<CommitInfo>;

    /// Lists commits reachable from `sha`, newest first, one page at a
    /// time. Pages are 1-based; an empty page ends the history. Callers
    /// stop paginating early once they find what they need.
    async fn list_commits(&self, sha: &str, page: u32, per_page: u32) -> Result<Vec<CommitInfo>>;

    /// Lists tags whose name starts with `prefix`. A missing namespace is
    /// an empty list, not an error.
    async fn list_tags(&self, prefix: &str) -> Result<Vec<TagRef>>;

    /// Resolves the current tip of a branch.
    async fn branch_head(&self, branch: &str) -> Result<String>;

    /// Creates a branch ref pointing at `sha`.
    async fn create_branch(&self, branch: &str, sha: &str) -> Result<()>;

    /// Deletes a branch ref.
    async fn delete_branch(&self, branch: &str) -> Result<()>;

    /// Reads a file blob at a ref, or `None` if absent.
    async fn get_file(&self, path: &str, git_ref: &str) -> Result<Option<String>>;

    /// Writes files as a new tree + commit on top of `parent_sha`, and
    /// returns the new commit sha.
    async fn commit_files(
        &self,
        base_tree_sha: &str,
        parent_sha: &str,
        message: &str,
        files: &[NewFile],
    ) -> Result<String>;

    /// Opens a draft pull request and returns its number.
    async fn create_pull(&self, title: &str, head: &str, base: &str) -> Result<u64>;

    /// Replaces the body of a pull request.
    async fn update_pull_body(&self, number: u64, body: &str) -> Result<()>;

    /// Lists open pull requests targeting `base`.
    async fn list_open_pulls(&self, base: &str) -> Result<Vec<PullRequest>>;

    /// Creates a deployment record and returns its id.
    async fn create_deployment(&self, deployment: &NewDeployment) -> Result<u64>;

    /// Lists deployment records for a commit and task.
    async fn list_deployments(&self, git_ref: &str, task: &str) -> Result<Vec<Deployment>>;

    /// Appends a status to a deployment record's status sequence.
    async fn create_deployment_status(&self, deployment_id: u64, state: DeploymentState)
        -> Result<()>;

    /// Creates a check run; `conclusion` of `None` leaves it in progress.
    async fn create_check(
        &self,
        name: &str,
        head_sha: &str,
        conclusion: Option<CheckConclusion>,
        output: Option<CheckOutput>,
        actions: &[CheckAction],
    ) -> Result<u64>;

    /// Completes a previously created check run.
    async fn complete_check(&self, check_id: u64, conclusion: CheckConclusion) -> Result<()>;

    /// Returns the text payload of the latest completed check run named
    /// `check_name` on `sha`, or `None` if there is none.
    async fn latest_check_text(&self, sha: &str, check_name: &str) -> Result<Option<String>>;

    /// Permanently records a release with a tag, target commit, title, and
    /// body.
    async fn create_release(
        &self,
        tag_name: &str,
        target_sha: &str,
        title: &str,
        body: &str,
    ) -> Result<()>;
}
