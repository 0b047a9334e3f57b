//! Axum router and all HTTP handlers for aos-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Sync requests are `POST`s to any path whose last
//! segment names a [`Route`].

use std::{convert::Infallible, sync::Arc};

use aos_reconcile::sync::{self, SyncError};
use aos_reconcile::ReconcileError;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{error, info, warn};

use crate::{
    api_types::{ErrorResponse, HealthResponse},
    state::{AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Route table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Advertisers,
    Orders,
}

impl Route {
    pub const ALL: [Route; 2] = [Route::Advertisers, Route::Orders];

    pub fn segment(self) -> &'static str {
        match self {
            Route::Advertisers => "advertisers",
            Route::Orders => "orders",
        }
    }

    /// Select by the last segment of a request path.
    pub fn from_path(path: &str) -> Result<Route, String> {
        let last = path.rsplit('/').next().unwrap_or("");
        Route::ALL
            .into_iter()
            .find(|r| r.segment() == last)
            .ok_or_else(|| last.to_string())
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/stream", get(stream))
        .route("/*path", post(dispatch))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
            archive_enabled: st.archive.is_some(),
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /*path
// ---------------------------------------------------------------------------

/// Archive, select the route, run the sync, publish events.
pub(crate) async fn dispatch(
    State(st): State<Arc<AppState>>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = format!("/{path}");
    // Unparseable bodies are archived as null and rejected by the handler.
    let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    if let Some(archive) = &st.archive {
        match archive.save(&path, &headers, &json).await {
            Ok(file) => info!(path = %path, file = %file.display(), "request archived"),
            Err(e) => {
                error!(path = %path, error = %format!("{e:#}"), "request archive failed");
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("An error occurred while trying to save request: {e:#}"),
                );
            }
        }
    }

    let route = match Route::from_path(&path) {
        Ok(r) => r,
        Err(segment) => {
            warn!(path = %path, "no route for segment");
            return error_response(
                StatusCode::NOT_FOUND,
                format!("Function '{segment}' not found"),
            );
        }
    };

    let result = match route {
        Route::Advertisers => sync::sync_advertiser(&st.reconciler, &json)
            .await
            .map(|resp| {
                st.publish_synced(&resp.synced);
                Json(resp).into_response()
            }),
        Route::Orders => sync::sync_order(&st.reconciler, &json).await.map(|resp| {
            st.publish_synced(&resp.synced);
            Json(resp).into_response()
        }),
    };

    match result {
        Ok(resp) => {
            info!(route = route.segment(), "sync ok");
            resp
        }
        Err(e) => sync_error_response(&st, route, e),
    }
}

/// Map a failed sync to its HTTP status and publish it as a `log` event.
fn sync_error_response(st: &AppState, route: Route, e: SyncError) -> Response {
    let status = match &e {
        SyncError::NotAnObject { what: "request" } => StatusCode::BAD_REQUEST,
        SyncError::NotAnObject { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        SyncError::Reconcile(ReconcileError::Store(s)) if s.is_unavailable() => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        SyncError::Reconcile(ReconcileError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        SyncError::Reconcile(_) => StatusCode::UNPROCESSABLE_ENTITY,
    };

    let msg = match status {
        StatusCode::BAD_REQUEST => "Request is not a JSON object".to_string(),
        _ => e.to_string(),
    };

    let level = if status.is_server_error() {
        error!(route = route.segment(), error = %e, "sync failed");
        "ERROR"
    } else {
        warn!(route = route.segment(), error = %e, "sync rejected");
        "WARN"
    };
    let _ = st.bus.send(BusMsg::LogLine {
        level: level.to_string(),
        msg: format!("{} sync {}: {}", route.segment(), status.as_u16(), msg),
    });

    error_response(status, msg)
}

fn error_response(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::new(msg))).into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(m.event_name()).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
