//! Workspace and package tool contracts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;
use crate::plan::PublishPlan;

/// A local package as reported by the workspace adapter.
#[derive(Debug, Clone)]
pub struct WorkspacePackage {
    /// Location relative to the repository root.
    pub location: PathBuf,
    /// Names of other local packages it depends on.
    pub local_dependencies: Vec<String>,
}

/// Mapping from package name to its workspace entry, produced fresh from
/// the checkout on every run.
pub type WorkspaceMap = BTreeMap<String, WorkspacePackage>;

/// Lists the local packages of a repository checkout.
#[async_trait]
pub trait WorkspaceAdapter: Send + Sync {
    /// Returns every local package. Must fail loudly rather than return
    /// partial data.
    async fn list_packages(&self) -> Result<WorkspaceMap>;
}

/// A packed, publishable artifact.
#[derive(Debug, Clone)]
pub struct PackedArtifact {
    pub artifact_path: PathBuf,
    pub shasum: String,
}

/// Registry identity of a published artifact.
#[derive(Debug, Clone)]
pub struct PublishedPackage {
    /// `name@version` registry identifier.
    pub id: String,
    pub shasum: String,
}

/// Packs and publishes individual packages, and rewrites manifested
/// versions.
#[async_trait]
pub trait PackageTool: Send + Sync {
    /// Packs the package at `dir` and returns the artifact and its content
    /// hash.
    async fn pack(&self, dir: &Path) -> Result<PackedArtifact>;

    /// Publishes a packed artifact to the registry under a distribution
    /// tag.
    async fn publish(&self, artifact: &Path, dist_tag: &str) -> Result<PublishedPackage>;

    /// Best-effort removal of a published artifact, used only as
    /// compensation after a partial publish failure.
    async fn unpublish(&self, id: &str) -> Result<()>;

    /// Rewrites every plan package's own manifested version and the
    /// version of every local dependency reference across the workspace,
    /// regardless of whether the dependency itself is republished.
    async fn write_versions(&self, plan: &PublishPlan) -> Result<()>;
}
