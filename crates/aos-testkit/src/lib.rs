//! In-process test doubles for the reconciliation stack.
//!
//! [`MemoryStore`] implements [`EntityStore`] over plain maps, counts every
//! call so tests can assert side-effect budgets, and can be told to fail the
//! next call to simulate an unreachable store.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use aos_reconcile::{
    EntityKind, EntityRecord, EntityStore, ExistingEntity, InsertOutcome, NewEntity, Reconciler,
    StoreError,
};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Call counters
// ---------------------------------------------------------------------------

/// Per-store call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub lookups: u64,
    pub max_id_queries: u64,
    pub updates: u64,
    pub inserts: u64,
    pub fetches: u64,
}

impl CallCounts {
    /// Updates + inserts: the writes a reconcile call may issue.
    pub fn mutations(&self) -> u64 {
        self.updates + self.inserts
    }
}

/// Store operations a fault can be aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Lookup,
    MaxId,
    Update,
    Insert,
    Fetch,
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inner {
    /// kind -> surrogate_id -> record (ordered so max is cheap)
    tables: BTreeMap<EntityKind, BTreeMap<i64, EntityRecord>>,
    counts: CallCounts,
    /// Pending fault; `None` op means "whichever call comes next".
    fail_next: Option<(Option<StoreOp>, StoreError)>,
}

impl Inner {
    fn take_fault(&mut self, op: StoreOp) -> Result<(), StoreError> {
        match &self.fail_next {
            Some((None, _)) => {}
            Some((Some(target), _)) if *target == op => {}
            _ => return Ok(()),
        }
        match self.fail_next.take() {
            Some((_, e)) => Err(e),
            None => Ok(()),
        }
    }

    fn table(&self, kind: EntityKind) -> Option<&BTreeMap<i64, EntityRecord>> {
        self.tables.get(&kind)
    }

    fn find(&self, kind: EntityKind, external_id: &str) -> Option<ExistingEntity> {
        self.table(kind)?
            .values()
            .find(|r| r.external_id == external_id)
            .map(|r| ExistingEntity {
                surrogate_id: r.surrogate_id,
                display_name: r.display_name.clone(),
            })
    }

    fn max_id(&self, kind: EntityKind) -> Option<i64> {
        self.table(kind)?.keys().next_back().copied()
    }
}

/// Thread-safe in-memory [`EntityStore`]. Every operation runs under one
/// lock, so `insert_if_absent` is atomic.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic in another test thread must not hide this store's state.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Wrap a clone of this store in a [`Reconciler`].
    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(Arc::new(self.clone()))
    }

    /// Seed a row directly, bypassing counters. Replaces any row with the same id.
    pub fn seed(&self, record: EntityRecord) {
        let mut g = self.lock();
        g.tables
            .entry(record.kind())
            .or_default()
            .insert(record.surrogate_id, record);
    }

    pub fn counts(&self) -> CallCounts {
        self.lock().counts
    }

    pub fn reset_counts(&self) {
        self.lock().counts = CallCounts::default();
    }

    /// Fail the next store call (of any kind) with `err`.
    pub fn fail_next(&self, err: StoreError) {
        self.lock().fail_next = Some((None, err));
    }

    /// Fail the next call of `op` with `err`; other calls pass.
    pub fn fail_next_on(&self, op: StoreOp, err: StoreError) {
        self.lock().fail_next = Some((Some(op), err));
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        self.lock().table(kind).map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, kind: EntityKind) -> bool {
        self.len(kind) == 0
    }

    pub fn record(&self, kind: EntityKind, surrogate_id: i64) -> Option<EntityRecord> {
        self.lock().table(kind)?.get(&surrogate_id).cloned()
    }

    pub fn record_by_external_id(&self, kind: EntityKind, external_id: &str) -> Option<EntityRecord> {
        self.lock()
            .table(kind)?
            .values()
            .find(|r| r.external_id == external_id)
            .cloned()
    }

    /// Surrogate ids of `kind`, ascending.
    pub fn ids(&self, kind: EntityKind) -> Vec<i64> {
        self.lock()
            .table(kind)
            .map(|t| t.keys().copied().collect())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl EntityStore for MemoryStore {
    async fn lookup(&self, kind: EntityKind, external_id: &str) -> Result<Option<ExistingEntity>, StoreError> {
        let mut g = self.lock();
        g.counts.lookups += 1;
        g.take_fault(StoreOp::Lookup)?;
        Ok(g.find(kind, external_id))
    }

    async fn max_surrogate_id(&self, kind: EntityKind) -> Result<Option<i64>, StoreError> {
        let mut g = self.lock();
        g.counts.max_id_queries += 1;
        g.take_fault(StoreOp::MaxId)?;
        Ok(g.max_id(kind))
    }

    async fn update_display_name(&self, kind: EntityKind, surrogate_id: i64, display_name: &str) -> Result<(), StoreError> {
        let mut g = self.lock();
        g.counts.updates += 1;
        g.take_fault(StoreOp::Update)?;
        match g.tables.get_mut(&kind).and_then(|t| t.get_mut(&surrogate_id)) {
            Some(r) => {
                r.display_name = display_name.to_string();
                Ok(())
            }
            None => Err(StoreError::statement(
                "update_display_name",
                format!("no {kind} with id {surrogate_id}"),
            )),
        }
    }

    async fn insert_if_absent(&self, entity: &NewEntity) -> Result<InsertOutcome, StoreError> {
        let mut g = self.lock();
        let kind = entity.kind();
        g.counts.inserts += 1;
        g.take_fault(StoreOp::Insert)?;

        if let Some(existing) = g.find(kind, &entity.external_id) {
            return Ok(InsertOutcome::Existing(existing));
        }

        let new_id = g.max_id(kind).unwrap_or(0) + 1;
        g.tables.entry(kind).or_default().insert(
            new_id,
            EntityRecord {
                surrogate_id: new_id,
                external_id: entity.external_id.clone(),
                display_name: entity.display_name.clone(),
                attrs: entity.attrs.clone(),
            },
        );
        Ok(InsertOutcome::Inserted(new_id))
    }

    async fn fetch(&self, kind: EntityKind, surrogate_id: i64) -> Result<Option<EntityRecord>, StoreError> {
        let mut g = self.lock();
        g.counts.fetches += 1;
        g.take_fault(StoreOp::Fetch)?;
        Ok(g.table(kind).and_then(|t| t.get(&surrogate_id)).cloned())
    }
}

// ---------------------------------------------------------------------------
// Payload fixtures
// ---------------------------------------------------------------------------

pub fn advertiser_payload(name: &str, source_id: &str) -> Value {
    serde_json::json!({
        "name": name,
        "sourceAdvertiserId": source_id,
    })
}

pub fn line_item_payload(name: &str, source_id: &str) -> Value {
    serde_json::json!({
        "name": name,
        "sourceLineitemId": source_id,
        "startDate": "2025-01-01 00:00",
        "endDate": "2025-01-31 23:59",
        "costType": "CPM",
        "quantity": "250000",
        "unitCost": "4.75",
    })
}

pub fn order_payload(name: &str, source_id: &str, advertiser_id: i64, lineitems: Vec<Value>) -> Value {
    serde_json::json!({
        "name": name,
        "sourceOrderId": source_id,
        "startDate": "2025-01-01 00:00",
        "endDate": "2025-01-31 23:59",
        "advertiserId": advertiser_id.to_string(),
        "salesPersonEmailId": "seller@example.com",
        "salesPersonName": "Sam Seller",
        "lineitems": lineitems,
    })
}
