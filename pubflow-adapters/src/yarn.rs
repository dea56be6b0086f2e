//! Workspace adapter backed by `yarn workspaces info`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use pubflow_core::error::{Error, Result};
use pubflow_core::workspace::{WorkspaceAdapter, WorkspaceMap, WorkspacePackage};

use crate::process::run_tool;

/// Lists local packages by shelling out to `yarn workspaces info --json`.
pub struct YarnWorkspaces {
    repo_root: PathBuf,
}

#[derive(Debug, Deserialize)]
struct WorkspaceInfo {
    location: String,
    #[serde(rename = "workspaceDependencies", default)]
    workspace_dependencies: Vec<String>,
}

impl YarnWorkspaces {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }
}

#[async_trait]
impl WorkspaceAdapter for YarnWorkspaces {
    async fn list_packages(&self) -> Result<WorkspaceMap> {
        let stdout = run_tool("yarn", &["workspaces", "info", "--json"], &self.repo_root).await?;

        // Yarn 1 wraps the workspace map in a log envelope with a
        // string-encoded `data` field; newer versions emit the map
        // directly.
        let value: Value = serde_json::from_str(&stdout)?;
        let info: BTreeMap<String, WorkspaceInfo> = match value.get("data").and_then(Value::as_str)
        {
            Some(data) => serde_json::from_str(data)?,
            None => serde_json::from_value(value)?,
        };

        if info.is_empty() {
            return Err(Error::ToolInvocation {
                command: "yarn workspaces info --json".to_string(),
                status: None,
                output: "no workspaces reported".to_string(),
            });
        }

        Ok(info
            .into_iter()
            .map(|(name, ws)| {
                (
                    name,
                    WorkspacePackage {
                        location: PathBuf::from(ws.location),
                        local_dependencies: ws.workspace_dependencies,
                    },
                )
            })
            .collect())
    }
}
