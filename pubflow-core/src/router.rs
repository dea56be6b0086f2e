//! Explicit event router: maps forge event kinds to handlers.
//!
//! The router is transport-agnostic: any HTTP (or other) delivery layer
//! that can name the event kind and hand over the payload can drive it.
//! All collaborators travel in an explicit [`EventContext`]; there is no
//! ambient request state.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::forge::ForgeClient;
use crate::handlers;
use crate::workspace::{PackageTool, WorkspaceAdapter};

/// Repository coordinates carried on every event payload.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoInfo {
    pub id: u64,
    pub full_name: String,
    pub html_url: String,
    pub default_branch: String,
}

/// Collaborators every handler needs, passed explicitly per dispatch.
pub struct EventContext {
    pub forge: Arc<dyn ForgeClient>,
    pub workspace: Arc<dyn WorkspaceAdapter>,
    pub tool: Arc<dyn PackageTool>,
    /// Root of the repository checkout the package tool operates on.
    pub repo_root: PathBuf,
}

type HandlerFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;
type Handler = Box<dyn Fn(Arc<EventContext>, Value) -> HandlerFuture + Send + Sync>;

/// Mapping from event-kind strings to async handlers.
#[derive(Default)]
pub struct EventRouter {
    routes: HashMap<String, Handler>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for an event kind, replacing any previous one.
    pub fn on<F, Fut>(mut self, kind: &str, handler: F) -> Self
    where
        F: Fn(Arc<EventContext>, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.routes.insert(
            kind.to_string(),
            Box::new(move |ctx, payload| Box::pin(handler(ctx, payload))),
        );
        self
    }

    pub fn handles(&self, kind: &str) -> bool {
        self.routes.contains_key(kind)
    }

    /// Routes one event. Unknown kinds are ignored with a debug log.
    pub async fn dispatch(
        &self,
        kind: &str,
        ctx: Arc<EventContext>,
        payload: Value,
    ) -> Result<()> {
        match self.routes.get(kind) {
            Some(handler) => handler(ctx, payload).await,
            None => {
                debug!(kind, "no handler registered, ignoring event");
                Ok(())
            }
        }
    }
}

/// The standard wiring: push, pull-request, deployment, deployment-status,
/// and check-run-action events.
pub fn default_router() -> EventRouter {
    EventRouter::new()
        .on("push", handlers::on_push)
        .on("pull_request", handlers::on_pull_request)
        .on("deployment", handlers::on_deployment)
        .on("deployment_status", handlers::on_deployment_status)
        .on("check_run", handlers::on_check_run)
}
