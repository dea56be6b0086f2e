use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use pubflow_core::error::Result;
use pubflow_core::forge::{
    CheckAction, CheckConclusion, CheckOutput, CommitInfo, Deployment, DeploymentState,
    ForgeClient, NewDeployment, NewFile, PullRequest, TagRef,
};
use pubflow_core::handlers::on_deployment_status;
use pubflow_core::plan::PublishPlan;
use pubflow_core::router::EventContext;
use pubflow_core::workspace::{
    PackageTool, PackedArtifact, PublishedPackage, WorkspaceAdapter, WorkspaceMap,
};

#[derive(Debug, Clone, PartialEq)]
struct CreatedRelease {
    tag_name: String,
    target_sha: String,
    title: String,
    body: String,
}

/// Forge double serving fixed file blobs and recording created releases.
#[derive(Default)]
struct ReleaseRecordingForge {
    /// File contents keyed by (path, ref).
    files: BTreeMap<(String, String), String>,
    releases: Mutex<Vec<CreatedRelease>>,
}

#[async_trait]
impl ForgeClient for ReleaseRecordingForge {
    async fn get_commit(&self, _sha: &str) -> Result<CommitInfo> {
        unimplemented!("not used by the deployment status handler")
    }

    async fn list_commits(
        &self,
        _sha: &str,
        _page: u32,
        _per_page: u32,
    ) -> Result<Vec<CommitInfo>> {
        unimplemented!("not used by the deployment status handler")
    }

    async fn list_tags(&self, _prefix: &str) -> Result<Vec<TagRef>> {
        unimplemented!("not used by the deployment status handler")
    }

    async fn branch_head(&self, _branch: &str) -> Result<String> {
        unimplemented!("not used by the deployment status handler")
    }

    async fn create_branch(&self, _branch: &str, _sha: &str) -> Result<()> {
        unimplemented!("not used by the deployment status handler")
    }

    async fn delete_branch(&self, _branch: &str) -> Result<()> {
        unimplemented!("not used by the deployment status handler")
    }

    async fn get_file(&self, path: &str, git_ref: &str) -> Result<Option<String>> {
        Ok(self
            .files
            .get(&(path.to_string(), git_ref.to_string()))
            .cloned())
    }

    async fn commit_files(
        &self,
        _base_tree_sha: &str,
        _parent_sha: &str,
        _message: &str,
        _files: &[NewFile],
    ) -> Result<String> {
        unimplemented!("not used by the deployment status handler")
    }

    async fn create_pull(&self, _title: &str, _head: &str, _base: &str) -> Result<u64> {
        unimplemented!("not used by the deployment status handler")
    }

    async fn update_pull_body(&self, _number: u64, _body: &str) -> Result<()> {
        unimplemented!("not used by the deployment status handler")
    }

    async fn list_open_pulls(&self, _base: &str) -> Result<Vec<PullRequest>> {
        unimplemented!("not used by the deployment status handler")
    }

    async fn create_deployment(&self, _deployment: &NewDeployment) -> Result<u64> {
        unimplemented!("not used by the deployment status handler")
    }

    async fn list_deployments(&self, _git_ref: &str, _task: &str) -> Result<Vec<Deployment>> {
        unimplemented!("not used by the deployment status handler")
    }

    async fn create_deployment_status(
        &self,
        _deployment_id: u64,
        _state: DeploymentState,
    ) -> Result<()> {
        unimplemented!("not used by the deployment status handler")
    }

    async fn create_check(
        &self,
        _name: &str,
        _head_sha: &str,
        _conclusion: Option<CheckConclusion>,
        _output: Option<CheckOutput>,
        _actions: &[CheckAction],
    ) -> Result<u64> {
        unimplemented!("not used by the deployment status handler")
    }

    async fn complete_check(&self, _check_id: u64, _conclusion: CheckConclusion) -> Result<()> {
        unimplemented!("not used by the deployment status handler")
    }

    async fn latest_check_text(&self, _sha: &str, _check_name: &str) -> Result<Option<String>> {
        unimplemented!("not used by the deployment status handler")
    }

    async fn create_release(
        &self,
        tag_name: &str,
        target_sha: &str,
        title: &str,
        body: &str,
    ) -> Result<()> {
        self.releases.lock().unwrap().push(CreatedRelease {
            tag_name: tag_name.to_string(),
            target_sha: target_sha.to_string(),
            title: title.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

struct UnusedWorkspace;

#[async_trait]
impl WorkspaceAdapter for UnusedWorkspace {
    async fn list_packages(&self) -> Result<WorkspaceMap> {
        unimplemented!("not used by the deployment status handler")
    }
}

struct UnusedTool;

#[async_trait]
impl PackageTool for UnusedTool {
    async fn pack(&self, _dir: &Path) -> Result<PackedArtifact> {
        unimplemented!("not used by the deployment status handler")
    }

    async fn publish(&self, _artifact: &Path, _dist_tag: &str) -> Result<PublishedPackage> {
        unimplemented!("not used by the deployment status handler")
    }

    async fn unpublish(&self, _id: &str) -> Result<()> {
        unimplemented!("not used by the deployment status handler")
    }

    async fn write_versions(&self, _plan: &PublishPlan) -> Result<()> {
        unimplemented!("not used by the deployment status handler")
    }
}

fn context(forge: Arc<ReleaseRecordingForge>) -> Arc<EventContext> {
    Arc::new(EventContext {
        forge,
        workspace: Arc::new(UnusedWorkspace),
        tool: Arc::new(UnusedTool),
        repo_root: PathBuf::from("."),
    })
}

fn stable_success_payload() -> serde_json::Value {
    json!({
        "deployment_status": { "state": "success" },
        "deployment": {
            "id": 7,
            "sha": "m1",
            "task": "publish:stable",
            "payload": { "schema_version": 1, "id": "misty-firefly" },
            "updated_at": "2024-02-03T10:15:00Z",
        },
    })
}

fn forge_with_release_files() -> ReleaseRecordingForge {
    let mut forge = ReleaseRecordingForge::default();
    forge.files.insert(
        (
            ".pubflow/releases/misty-firefly/release_notes.md".to_string(),
            "m1".to_string(),
        ),
        "# pkg-a\n - fix parser\n".to_string(),
    );
    forge.files.insert(
        (
            ".pubflow/releases/misty-firefly/release.toml".to_string(),
            "m1".to_string(),
        ),
        "[pkg-a]\nversion = \"2.0.0\"\n".to_string(),
    );
    forge
}

#[tokio::test]
async fn test_successful_stable_deployment_records_release() {
    let forge = Arc::new(forge_with_release_files());
    let ctx = context(Arc::clone(&forge));

    on_deployment_status(ctx, stable_success_payload())
        .await
        .unwrap();

    let releases = forge.releases.lock().unwrap();
    assert_eq!(releases.len(), 1);
    let release = &releases[0];
    assert_eq!(release.tag_name, "releases/2024-02-03/101500/misty-firefly");
    assert_eq!(release.target_sha, "m1");
    assert_eq!(release.title, "2024-02-03 \"misty-firefly\"");
    assert!(release.body.contains("# pkg-a@2.0.0"));
    assert!(release.body.contains(" - fix parser"));
}

#[tokio::test]
async fn test_failed_stable_deployment_is_ignored() {
    let forge = Arc::new(forge_with_release_files());
    let ctx = context(Arc::clone(&forge));

    let mut payload = stable_success_payload();
    payload["deployment_status"]["state"] = json!("error");
    on_deployment_status(ctx, payload).await.unwrap();

    assert!(forge.releases.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_canary_deployment_status_is_ignored() {
    let forge = Arc::new(forge_with_release_files());
    let ctx = context(Arc::clone(&forge));

    let mut payload = stable_success_payload();
    payload["deployment"]["task"] = json!("publish:canary");
    payload["deployment"]["payload"] = json!({ "schema_version": 2, "id": 0 });
    on_deployment_status(ctx, payload).await.unwrap();

    assert!(forge.releases.lock().unwrap().is_empty());
}
