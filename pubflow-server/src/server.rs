//! HTTP delivery layer for forge webhook events.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use pubflow_core::router::{EventContext, EventRouter};

/// Server state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    ctx: Arc<EventContext>,
    router: Arc<EventRouter>,
}

impl AppState {
    /// Creates new app state.
    pub fn new(ctx: EventContext, router: EventRouter) -> Self {
        Self {
            ctx: Arc::new(ctx),
            router: Arc::new(router),
        }
    }
}

/// Creates the HTTP router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/events", post(receive_event))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Accepts one webhook delivery.
///
/// POST /events
///
/// The event kind travels in the `X-GitHub-Event` header. Handling runs
/// in a background task so slow publishes never trip the forge's webhook
/// delivery timeout; the response only acknowledges receipt.
async fn receive_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Response, ServerError> {
    let kind = headers
        .get("x-github-event")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServerError::BadRequest("missing X-GitHub-Event header".to_string()))?
        .to_string();

    if !state.router.handles(&kind) {
        info!(kind, "ignoring unhandled event kind");
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let ctx = Arc::clone(&state.ctx);
    let router = Arc::clone(&state.router);
    tokio::spawn(async move {
        if let Err(err) = router.dispatch(&kind, ctx, payload).await {
            error!(kind, %err, "event handler failed");
        }
    });

    Ok(StatusCode::ACCEPTED.into_response())
}

/// Liveness probe.
///
/// GET /healthz
async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

/// Server error types.
#[derive(Debug)]
pub enum ServerError {
    BadRequest(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(serde_json::json!({ "error": message }));
        (status, body).into_response()
    }
}
