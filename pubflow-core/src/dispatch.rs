//! Deployment dispatcher: maps deployment tasks to canary/stable publish
//! flows and reports progress through deployment statuses.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::deployments::{
    CanaryPayload, StablePayload, CANARY_TASK_ID, DEPLOY_ENVIRONMENT, STABLE_TASK_ID,
};
use crate::error::Result;
use crate::forge::{Deployment, DeploymentState, ForgeClient, NewDeployment};
use crate::ident::canary_version;
use crate::pipeline;
use crate::plan::{self, PublishPlan};
use crate::releases::{self};
use crate::workspace::{PackageTool, PublishedPackage, WorkspaceAdapter};

/// Drives one publish attempt per deployment record.
///
/// Each invocation computes its own publish plan from scratch; no state is
/// shared across deployments.
pub struct Dispatcher {
    forge: Arc<dyn ForgeClient>,
    workspace: Arc<dyn WorkspaceAdapter>,
    tool: Arc<dyn PackageTool>,
    /// Root of the repository checkout the tool operates on.
    repo_root: PathBuf,
}

impl Dispatcher {
    pub fn new(
        forge: Arc<dyn ForgeClient>,
        workspace: Arc<dyn WorkspaceAdapter>,
        tool: Arc<dyn PackageTool>,
        repo_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            forge,
            workspace,
            tool,
            repo_root: repo_root.into(),
        }
    }

    /// Classifies and executes a deployment task.
    ///
    /// The status is set to `in_progress` immediately; any failure during
    /// planning, version rewriting, or publishing transitions it to
    /// `error` and re-raises the failure. There is no automatic retry.
    pub async fn handle_deployment(&self, deployment: &Deployment) -> Result<()> {
        if deployment.task != CANARY_TASK_ID && deployment.task != STABLE_TASK_ID {
            debug!(task = %deployment.task, "not a publish deployment, ignoring");
            return Ok(());
        }

        info!(id = deployment.id, task = %deployment.task, sha = %deployment.sha, "dispatching");
        self.forge
            .create_deployment_status(deployment.id, DeploymentState::InProgress)
            .await?;

        match self.run(deployment).await {
            Ok(published) => {
                info!(id = deployment.id, count = published.len(), "deployment succeeded");
                self.forge
                    .create_deployment_status(deployment.id, DeploymentState::Success)
                    .await?;
                Ok(())
            }
            Err(err) => {
                if let Err(status_err) = self
                    .forge
                    .create_deployment_status(deployment.id, DeploymentState::Error)
                    .await
                {
                    warn!(id = deployment.id, %status_err, "failed to record error status");
                }
                Err(err)
            }
        }
    }

    async fn run(&self, deployment: &Deployment) -> Result<Vec<PublishedPackage>> {
        let plan = if deployment.task == CANARY_TASK_ID {
            self.canary_plan(deployment).await?
        } else {
            self.stable_plan(deployment).await?
        };

        // Versions are rewritten before packing so artifacts carry their
        // final manifested versions.
        self.tool.write_versions(&plan).await?;
        pipeline::publish_packages(self.tool.as_ref(), &plan).await
    }

    async fn canary_plan(&self, deployment: &Deployment) -> Result<PublishPlan> {
        let payload = CanaryPayload::deserialize(&deployment.payload)?;
        let version = canary_version(&deployment.sha, payload.id);
        let workspace = self.workspace.list_packages().await?;
        Ok(plan::canary_plan(
            &workspace,
            &payload.unchanged_packages,
            &version,
        ))
    }

    async fn stable_plan(&self, deployment: &Deployment) -> Result<PublishPlan> {
        let payload = StablePayload::deserialize(&deployment.payload)?;
        let manifest_path = self.repo_root.join(releases::manifest_path(&payload.id));
        let text = tokio::fs::read_to_string(&manifest_path).await?;
        let manifest = releases::parse_manifest(&text)?;
        releases::validate_manifest_versions(&manifest)?;
        let workspace = self.workspace.list_packages().await?;
        plan::stable_plan(&workspace, &manifest)
    }
}

/// Creates a canary deployment for a commit, allocating the next sequence
/// number from the count of existing canary deployments so repeated
/// requests for the same commit never collide.
pub async fn create_canary_deployment(forge: &dyn ForgeClient, sha: &str) -> Result<u64> {
    let existing = forge.list_deployments(sha, CANARY_TASK_ID).await?;
    let payload = CanaryPayload {
        id: existing.len() as u64,
        unchanged_packages: Default::default(),
    };
    forge
        .create_deployment(&NewDeployment {
            git_ref: sha.to_string(),
            task: CANARY_TASK_ID.to_string(),
            payload: payload.serialize(),
            environment: DEPLOY_ENVIRONMENT.to_string(),
            description: "Publish canary".to_string(),
        })
        .await
}

/// Creates a stable deployment for a merged release branch.
pub async fn create_stable_deployment(
    forge: &dyn ForgeClient,
    merge_sha: &str,
    release_id: &str,
) -> Result<u64> {
    let payload = StablePayload {
        id: release_id.to_string(),
    };
    forge
        .create_deployment(&NewDeployment {
            git_ref: merge_sha.to_string(),
            task: STABLE_TASK_ID.to_string(),
            payload: payload.serialize(),
            environment: DEPLOY_ENVIRONMENT.to_string(),
            description: "Publish merge".to_string(),
        })
        .await
}
