//! Storage boundary for the reconciler.

use serde::{Deserialize, Serialize};

use crate::{CreateAttrs, EntityKind, StoreError};

// ---------------------------------------------------------------------------
// Row shapes
// ---------------------------------------------------------------------------

/// The part of an existing row the reconciler needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingEntity {
    pub surrogate_id: i64,
    pub display_name: String,
}

/// A row to be created. The surrogate id is allocated by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntity {
    pub external_id: String,
    pub display_name: String,
    pub attrs: CreateAttrs,
}

impl NewEntity {
    pub fn kind(&self) -> EntityKind {
        self.attrs.kind()
    }
}

/// A full stored row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub surrogate_id: i64,
    pub external_id: String,
    pub display_name: String,
    pub attrs: CreateAttrs,
}

impl EntityRecord {
    pub fn kind(&self) -> EntityKind {
        self.attrs.kind()
    }
}

/// Result of [`EntityStore::insert_if_absent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was written with this surrogate id.
    Inserted(i64),
    /// A row for the external id already existed; nothing was written.
    Existing(ExistingEntity),
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Tabular store holding one table per [`EntityKind`].
///
/// Every method is awaited to completion before the reconciler proceeds;
/// a returned `Ok` means the write is durable.
#[async_trait::async_trait]
pub trait EntityStore: Send + Sync {
    /// Zero-or-one row whose external id equals `external_id`.
    async fn lookup(&self, kind: EntityKind, external_id: &str) -> Result<Option<ExistingEntity>, StoreError>;

    /// Current maximum surrogate id, `None` when the table is empty.
    async fn max_surrogate_id(&self, kind: EntityKind) -> Result<Option<i64>, StoreError>;

    /// Overwrite the display name of `surrogate_id`.
    async fn update_display_name(&self, kind: EntityKind, surrogate_id: i64, display_name: &str) -> Result<(), StoreError>;

    /// Allocate `max + 1` and insert `entity` as one atomic step, unless a
    /// row with the same external id already exists.
    async fn insert_if_absent(&self, entity: &NewEntity) -> Result<InsertOutcome, StoreError>;

    /// Full row by surrogate id.
    async fn fetch(&self, kind: EntityKind, surrogate_id: i64) -> Result<Option<EntityRecord>, StoreError>;
}
