//! aos-reconcile
//!
//! Identity reconciliation for entities pushed by the upstream order
//! management system (advertisers, orders, line items).
//!
//! Every entity is keyed by the id the source system assigned to it
//! (`external_id`). The first time an external id is seen a row is created
//! with the next dense surrogate id; afterwards the same surrogate id is
//! returned and only the display name is kept in sync.
//!
//! No IO lives here. Storage is reached through the [`EntityStore`] trait;
//! `aos-db` provides the Postgres adapter and `aos-testkit` an in-memory one.

mod attrs;
mod engine;
mod error;
mod kind;
mod store;
pub mod sync;

pub use attrs::{
    canonical_datetime, parse_source_datetime, Attributes, CreateAttrs, LineItemAttrs,
    OrderAttrs, CANONICAL_DATETIME_FORMAT, SOURCE_DATETIME_FORMAT,
};
pub use engine::{Outcome, Reconciled, Reconciler};
pub use error::{ReconcileError, StoreError};
pub use kind::EntityKind;
pub use store::{EntityRecord, EntityStore, ExistingEntity, InsertOutcome, NewEntity};
