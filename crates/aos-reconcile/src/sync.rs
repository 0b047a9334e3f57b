//! Source-system payloads in, response documents out.
//!
//! Advertiser payload:
//! `{"name": "...", "sourceAdvertiserId": "..."}`
//!
//! Order payload: the order's name, `sourceOrderId`, order attributes, and a
//! `lineitems` list whose entries carry `name`, `sourceLineitemId` and the
//! line-item attributes. The order is reconciled before its line items, and
//! line items are reconciled in list order.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Attributes, EntityKind, Outcome, ReconcileError, Reconciled, Reconciler};

pub const STATUS_SUCCESS: &str = "success";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SyncError {
    /// The payload (or a line-item entry) is not a JSON object.
    NotAnObject { what: &'static str },
    Reconcile(ReconcileError),
}

impl SyncError {
    pub fn is_input_error(&self) -> bool {
        match self {
            SyncError::NotAnObject { .. } => true,
            SyncError::Reconcile(e) => e.is_input_error(),
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::NotAnObject { what } => write!(f, "{what} is not a JSON object"),
            SyncError::Reconcile(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Reconcile(e) => Some(e),
            SyncError::NotAnObject { .. } => None,
        }
    }
}

impl From<ReconcileError> for SyncError {
    fn from(e: ReconcileError) -> Self {
        SyncError::Reconcile(e)
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// One reconciled entity, kept for event publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncedEntity {
    pub kind: EntityKind,
    pub external_id: String,
    #[serde(flatten)]
    pub reconciled: Reconciled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvertiserSyncResponse {
    pub advertiser_id: i64,
    /// Echo of the payload value, untouched.
    pub source_advertiser_id: Value,
    #[serde(skip)]
    pub synced: Vec<SyncedEntity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemResult {
    /// Surrogate id rendered as a string.
    pub lineitem_id: String,
    pub source_lineitem_id: Value,
    /// Present only for rows created by this call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub status: String,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSyncResponse {
    pub order_id: i64,
    pub source_order_id: Value,
    pub lineitems: Vec<LineItemResult>,
    #[serde(skip)]
    pub synced: Vec<SyncedEntity>,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

pub async fn sync_advertiser(rec: &Reconciler, payload: &Value) -> Result<AdvertiserSyncResponse, SyncError> {
    let obj = payload
        .as_object()
        .ok_or(SyncError::NotAnObject { what: "request" })?;

    let synced = reconcile_entry(rec, EntityKind::Advertiser, obj).await?;

    Ok(AdvertiserSyncResponse {
        advertiser_id: synced.reconciled.surrogate_id,
        source_advertiser_id: echo(obj, EntityKind::Advertiser),
        synced: vec![synced],
    })
}

pub async fn sync_order(rec: &Reconciler, payload: &Value) -> Result<OrderSyncResponse, SyncError> {
    let obj = payload
        .as_object()
        .ok_or(SyncError::NotAnObject { what: "request" })?;

    let order = reconcile_entry(rec, EntityKind::Order, obj).await?;
    let order_id = order.reconciled.surrogate_id;

    let entries: &[Value] = match obj.get("lineitems") {
        None | Some(Value::Null) => &[],
        Some(Value::Array(items)) => items.as_slice(),
        Some(other) => {
            return Err(ReconcileError::validation("lineitems", other.to_string(), "expected a list").into())
        }
    };

    let mut synced = vec![order];
    let mut lineitems = Vec::with_capacity(entries.len());
    for entry in entries {
        let item = entry
            .as_object()
            .ok_or(SyncError::NotAnObject { what: "lineitem" })?;
        let s = reconcile_entry(rec, EntityKind::LineItem, item).await?;

        let name = match s.reconciled.outcome {
            Outcome::Created => Some(display_name(item)?.to_string()),
            _ => None,
        };
        lineitems.push(LineItemResult {
            lineitem_id: s.reconciled.surrogate_id.to_string(),
            source_lineitem_id: echo(item, EntityKind::LineItem),
            name,
            status: STATUS_SUCCESS.to_string(),
            error_message: None,
        });
        synced.push(s);
    }

    Ok(OrderSyncResponse {
        order_id,
        source_order_id: echo(obj, EntityKind::Order),
        lineitems,
        synced,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn reconcile_entry(rec: &Reconciler, kind: EntityKind, obj: &Attributes) -> Result<SyncedEntity, SyncError> {
    let external_id = source_id(obj, kind)?;
    let name = display_name(obj)?;
    let reconciled = rec.reconcile(kind, &external_id, name, obj).await?;
    Ok(SyncedEntity {
        kind,
        external_id,
        reconciled,
    })
}

fn display_name(obj: &Attributes) -> Result<&str, ReconcileError> {
    match obj.get("name") {
        None | Some(Value::Null) => Err(ReconcileError::MissingField { field: "name" }),
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(ReconcileError::validation("name", other.to_string(), "expected a string")),
    }
}

/// External ids are opaque; numeric ids are keyed by their decimal text.
fn source_id(obj: &Attributes, kind: EntityKind) -> Result<String, ReconcileError> {
    let field = kind.source_id_field();
    match obj.get(field) {
        None | Some(Value::Null) => Err(ReconcileError::MissingField { field }),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(ReconcileError::validation(field, other.to_string(), "expected a string")),
    }
}

fn echo(obj: &Attributes, kind: EntityKind) -> Value {
    obj.get(kind.source_id_field()).cloned().unwrap_or(Value::Null)
}
