//! Core library for monorepo release orchestration.

pub mod change;
pub mod context;
pub mod deployments;
pub mod dispatch;
pub mod error;
pub mod forge;
pub mod graph;
pub mod handlers;
pub mod ident;
pub mod pipeline;
pub mod plan;
pub mod releases;
pub mod router;
pub mod scaffold;
pub mod snapshot;
pub mod workspace;

pub use change::{diff_snapshots, SnapshotDiff};
pub use context::{build_release_context, PackageContext, ReleaseContext};
pub use dispatch::Dispatcher;
pub use error::{Error, Result};
pub use graph::PackageGraph;
pub use plan::{PlanEntry, PublishPlan};
pub use router::{default_router, EventContext, EventRouter, RepoInfo};
pub use snapshot::{PackageSnapshot, PackageStatus};
pub use workspace::{PackageTool, WorkspaceAdapter};
