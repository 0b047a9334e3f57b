//! Shared runtime state for aos-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The reconciler holds
//! the store handle; the pool behind it is owned by `main.rs`.

use std::time::Duration;

use aos_reconcile::sync::SyncedEntity;
use aos_reconcile::Reconciler;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::archive::RequestArchive;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    /// One entity reconciled by a sync request.
    Sync(SyncedEntity),
    LogLine { level: String, msg: String },
}

impl BusMsg {
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::Sync(_) => "sync",
            BusMsg::LogLine { .. } => "log",
        }
    }
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub reconciler: Reconciler,
    /// `None` disables request archiving.
    pub archive: Option<RequestArchive>,
}

impl AppState {
    pub fn new(reconciler: Reconciler, archive: Option<RequestArchive>) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);

        Self {
            bus,
            build: BuildInfo {
                service: "aos-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            reconciler,
            archive,
        }
    }

    /// Publish one `sync` event per reconciled entity, in order.
    pub fn publish_synced(&self, synced: &[SyncedEntity]) {
        for s in synced {
            // No subscribers is not an error.
            let _ = self.bus.send(BusMsg::Sync(s.clone()));
        }
    }
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}
