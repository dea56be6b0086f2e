//! Package tool backed by the npm CLI.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use pubflow_core::error::{Error, Result};
use pubflow_core::plan::PublishPlan;
use pubflow_core::workspace::{PackageTool, PackedArtifact, PublishedPackage};

use crate::process::run_tool;

const DEPENDENCY_SECTIONS: &[&str] = &[
    "dependencies",
    "devDependencies",
    "peerDependencies",
    "optionalDependencies",
];

/// Packs and publishes packages with `npm pack` / `npm publish`.
pub struct NpmTool {
    repo_root: PathBuf,
}

#[derive(Debug, Deserialize)]
struct PackMetadata {
    filename: String,
    shasum: String,
}

#[derive(Debug, Deserialize)]
struct PublishMetadata {
    id: String,
    shasum: String,
}

impl NpmTool {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    /// Resolves a plan directory against the repository root; absolute
    /// paths pass through unchanged.
    fn resolve(&self, dir: &Path) -> PathBuf {
        self.repo_root.join(dir)
    }
}

#[async_trait]
impl PackageTool for NpmTool {
    async fn pack(&self, dir: &Path) -> Result<PackedArtifact> {
        let dir = self.resolve(dir);
        let stdout = run_tool("npm", &["pack", "--json"], &dir).await?;
        let mut entries: Vec<PackMetadata> = serde_json::from_str(&stdout)?;
        let metadata = entries.pop().ok_or_else(|| Error::ToolInvocation {
            command: "npm pack --json".to_string(),
            status: None,
            output: "empty pack metadata".to_string(),
        })?;
        Ok(PackedArtifact {
            artifact_path: dir.join(metadata.filename),
            shasum: metadata.shasum,
        })
    }

    async fn publish(&self, artifact: &Path, dist_tag: &str) -> Result<PublishedPackage> {
        let artifact = self.resolve(artifact);
        let dir = artifact.parent().ok_or_else(|| Error::ToolInvocation {
            command: "npm publish".to_string(),
            status: None,
            output: format!("artifact has no parent directory: {}", artifact.display()),
        })?;
        let filename = artifact
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::ToolInvocation {
                command: "npm publish".to_string(),
                status: None,
                output: format!("artifact has no file name: {}", artifact.display()),
            })?;

        let stdout = run_tool(
            "npm",
            &["publish", filename, "--tag", dist_tag, "--json"],
            dir,
        )
        .await?;
        let metadata: PublishMetadata = serde_json::from_str(&stdout)?;
        Ok(PublishedPackage {
            id: metadata.id,
            shasum: metadata.shasum,
        })
    }

    async fn unpublish(&self, id: &str) -> Result<()> {
        run_tool("npm", &["unpublish", id, "--force"], &self.repo_root).await?;
        Ok(())
    }

    async fn write_versions(&self, plan: &PublishPlan) -> Result<()> {
        for entry in plan.values() {
            let manifest_path = self.resolve(&entry.dir).join("package.json");
            let content = tokio::fs::read_to_string(&manifest_path).await?;
            let mut json: Value = serde_json::from_str(&content)?;

            json["version"] = Value::String(entry.version.clone());

            // Every local dependency reference takes the plan's version,
            // whether or not that dependency is being republished.
            for (dep, dep_entry) in plan {
                for section in DEPENDENCY_SECTIONS {
                    if let Some(deps) = json.get_mut(*section).and_then(Value::as_object_mut) {
                        if deps.contains_key(dep) {
                            deps.insert(dep.clone(), Value::String(dep_entry.version.clone()));
                        }
                    }
                }
            }

            let serialized = format!("{}\n", serde_json::to_string_pretty(&json)?);
            tokio::fs::write(&manifest_path, serialized).await?;
        }
        Ok(())
    }
}
