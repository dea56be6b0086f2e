//! Publish pipeline: pack and publish a plan in dependency order, with
//! best-effort compensation on partial failure.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::graph::PackageGraph;
use crate::plan::PublishPlan;
use crate::workspace::{PackageTool, PublishedPackage};

struct QueuedArtifact {
    package: String,
    artifact_path: PathBuf,
    dist_tag: String,
}

/// Packs and publishes every flagged package of a plan.
///
/// Packing walks the topological order for readability of logs, but has no
/// cross-package effect; publishing is strictly sequential in that order so
/// a dependency is live in the registry before any dependent referencing it
/// by exact version goes out.
///
/// # Errors
///
/// Fails with [`Error::CyclicDependency`] before any tool invocation if the
/// plan's graph has a cycle. A publish failure stops the run; packages
/// already published get a best-effort unpublish (compensation failures are
/// logged, not escalated) and the result is [`Error::PartialPublish`]
/// wrapping the triggering failure.
pub async fn publish_packages(
    tool: &dyn PackageTool,
    plan: &PublishPlan,
) -> Result<Vec<PublishedPackage>> {
    let deps: BTreeMap<String, Vec<String>> = plan
        .iter()
        .map(|(name, entry)| (name.clone(), entry.local_dependencies.clone()))
        .collect();
    let order = PackageGraph::new(&deps).publish_order()?;

    info!(order = ?order, "computed publish order");

    let mut artifacts = Vec::new();
    for package in &order {
        let entry = &plan[package];
        if !entry.publish {
            info!(package, "skipping pack (publish: false)");
            continue;
        }
        let packed = tool.pack(&entry.dir).await?;
        artifacts.push(QueuedArtifact {
            package: package.clone(),
            artifact_path: packed.artifact_path,
            dist_tag: entry.dist_tag.clone(),
        });
    }

    let mut published: Vec<PublishedPackage> = Vec::new();
    for artifact in &artifacts {
        match tool
            .publish(&artifact.artifact_path, &artifact.dist_tag)
            .await
        {
            Ok(result) => {
                info!(
                    id = %result.id,
                    dist_tag = %artifact.dist_tag,
                    shasum = %result.shasum,
                    "published"
                );
                published.push(result);
            }
            Err(err) => {
                error!(package = %artifact.package, "publish failed, compensating");
                compensate(tool, &published).await;
                return Err(Error::PartialPublish {
                    published: published.into_iter().map(|p| p.id).collect(),
                    source: Box::new(err),
                });
            }
        }
    }

    Ok(published)
}

/// Unpublishes already-published artifacts after a mid-run failure.
///
/// Registries bound how long an unpublish is accepted (npm allows 72
/// hours), so this can legitimately fail; failures are logged and the
/// overall error still propagates.
async fn compensate(tool: &dyn PackageTool, published: &[PublishedPackage]) {
    for package in published {
        if let Err(err) = tool.unpublish(&package.id).await {
            warn!(id = %package.id, %err, "compensating unpublish failed");
        } else {
            info!(id = %package.id, "unpublished");
        }
    }
}
