use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use pubflow_core::error::{Error, Result};
use pubflow_core::pipeline::publish_packages;
use pubflow_core::plan::{PlanEntry, PublishPlan};
use pubflow_core::workspace::{PackageTool, PackedArtifact, PublishedPackage};

/// Package tool double that records every call and can be told to fail
/// when publishing a specific package.
struct RecordingTool {
    calls: Mutex<Vec<String>>,
    fail_publish_of: Option<String>,
}

impl RecordingTool {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_publish_of: None,
        }
    }

    fn failing_on(package: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_publish_of: Some(package.to_string()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

fn package_of(path: &Path) -> String {
    path.file_name().unwrap().to_str().unwrap().to_string()
}

#[async_trait]
impl PackageTool for RecordingTool {
    async fn pack(&self, dir: &Path) -> Result<PackedArtifact> {
        let package = package_of(dir);
        self.record(format!("pack {package}"));
        Ok(PackedArtifact {
            artifact_path: dir.join(format!("{package}.tgz")),
            shasum: format!("sha-{package}"),
        })
    }

    async fn publish(&self, artifact: &Path, dist_tag: &str) -> Result<PublishedPackage> {
        let package = package_of(artifact.parent().unwrap());
        self.record(format!("publish {package} --tag {dist_tag}"));
        if self.fail_publish_of.as_deref() == Some(package.as_str()) {
            return Err(Error::ToolInvocation {
                command: format!("publish {package}"),
                status: Some(1),
                output: "registry rejected tarball".to_string(),
            });
        }
        Ok(PublishedPackage {
            id: format!("{package}@1.0.0"),
            shasum: format!("sha-{package}"),
        })
    }

    async fn unpublish(&self, id: &str) -> Result<()> {
        self.record(format!("unpublish {id}"));
        Ok(())
    }

    async fn write_versions(&self, _plan: &PublishPlan) -> Result<()> {
        self.record("write_versions".to_string());
        Ok(())
    }
}

fn plan(entries: &[(&str, bool, &[&str])]) -> PublishPlan {
    entries
        .iter()
        .map(|(name, publish, deps)| {
            (
                name.to_string(),
                PlanEntry {
                    dir: PathBuf::from(name),
                    version: "1.0.0".to_string(),
                    dist_tag: "latest".to_string(),
                    publish: *publish,
                    local_dependencies: deps.iter().map(|d| d.to_string()).collect(),
                },
            )
        })
        .collect()
}

#[tokio::test]
async fn test_publishes_in_dependency_order() {
    let tool = RecordingTool::new();
    let plan = plan(&[
        ("pkg-x", true, &[]),
        ("pkg-y", true, &["pkg-x"]),
        ("pkg-z", true, &["pkg-y"]),
    ]);

    let published = publish_packages(&tool, &plan).await.unwrap();

    assert_eq!(published.len(), 3);
    assert_eq!(
        tool.calls(),
        vec![
            "pack pkg-x",
            "pack pkg-y",
            "pack pkg-z",
            "publish pkg-x --tag latest",
            "publish pkg-y --tag latest",
            "publish pkg-z --tag latest",
        ]
    );
}

#[tokio::test]
async fn test_skips_unflagged_packages() {
    let tool = RecordingTool::new();
    let plan = plan(&[("pkg-x", false, &[]), ("pkg-y", true, &["pkg-x"])]);

    let published = publish_packages(&tool, &plan).await.unwrap();

    assert_eq!(published.len(), 1);
    assert_eq!(published[0].id, "pkg-y@1.0.0");
    assert_eq!(tool.calls(), vec!["pack pkg-y", "publish pkg-y --tag latest"]);
}

#[tokio::test]
async fn test_failure_compensates_earlier_publishes_only() {
    let tool = RecordingTool::failing_on("pkg-y");
    let plan = plan(&[
        ("pkg-x", true, &[]),
        ("pkg-y", true, &["pkg-x"]),
        ("pkg-z", true, &["pkg-y"]),
    ]);

    let err = publish_packages(&tool, &plan).await.unwrap_err();

    match err {
        Error::PartialPublish { published, source } => {
            assert_eq!(published, vec!["pkg-x@1.0.0"]);
            assert!(matches!(*source, Error::ToolInvocation { .. }));
        }
        other => panic!("expected PartialPublish, got {other:?}"),
    }

    let calls = tool.calls();
    // pkg-z is never published, and only pkg-x is rolled back.
    assert!(!calls.contains(&"publish pkg-z --tag latest".to_string()));
    assert_eq!(calls.last().unwrap(), "unpublish pkg-x@1.0.0");
    assert_eq!(
        calls
            .iter()
            .filter(|c| c.starts_with("unpublish"))
            .count(),
        1
    );
}

#[tokio::test]
async fn test_cycle_fails_before_any_tool_call() {
    let tool = RecordingTool::new();
    let plan = plan(&[("pkg-a", true, &["pkg-b"]), ("pkg-b", true, &["pkg-a"])]);

    let err = publish_packages(&tool, &plan).await.unwrap_err();

    assert!(matches!(err, Error::CyclicDependency { .. }));
    assert!(tool.calls().is_empty());
}
