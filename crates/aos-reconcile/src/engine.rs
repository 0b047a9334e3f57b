use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    Attributes, CreateAttrs, EntityKind, EntityStore, ExistingEntity, InsertOutcome, NewEntity,
    ReconcileError,
};

/// What a reconciliation call did to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Known external id, name already current. No write.
    Unchanged,
    /// Known external id, name corrected. One update.
    Renamed { previous: String },
    /// First sighting. One insert.
    Created,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Unchanged => "unchanged",
            Outcome::Renamed { .. } => "renamed",
            Outcome::Created => "created",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciled {
    pub surrogate_id: i64,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Maps external ids to surrogate ids, creating rows on first sight and
/// keeping display names current.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn EntityStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Reconcile one entity and return its surrogate id.
    ///
    /// `attrs` is only validated when the external id is unknown.
    pub async fn reconcile(
        &self,
        kind: EntityKind,
        external_id: &str,
        display_name: &str,
        attrs: &Attributes,
    ) -> Result<Reconciled, ReconcileError> {
        if let Some(existing) = self.store.lookup(kind, external_id).await? {
            return self.sync_name(kind, external_id, existing, display_name).await;
        }

        let entity = NewEntity {
            external_id: external_id.to_string(),
            display_name: display_name.to_string(),
            attrs: CreateAttrs::from_attributes(kind, attrs)?,
        };

        match self.store.insert_if_absent(&entity).await? {
            InsertOutcome::Inserted(surrogate_id) => {
                info!(%kind, surrogate_id, external_id, "new {kind} inserted");
                Ok(Reconciled {
                    surrogate_id,
                    outcome: Outcome::Created,
                })
            }
            InsertOutcome::Existing(existing) => {
                // Another caller created the row between our lookup and insert.
                debug!(%kind, external_id, surrogate_id = existing.surrogate_id, "insert found existing row");
                self.sync_name(kind, external_id, existing, display_name).await
            }
        }
    }

    async fn sync_name(
        &self,
        kind: EntityKind,
        external_id: &str,
        existing: ExistingEntity,
        display_name: &str,
    ) -> Result<Reconciled, ReconcileError> {
        let surrogate_id = existing.surrogate_id;

        if existing.display_name == display_name {
            debug!(%kind, surrogate_id, external_id, "{kind} found");
            return Ok(Reconciled {
                surrogate_id,
                outcome: Outcome::Unchanged,
            });
        }

        info!(
            %kind,
            surrogate_id,
            external_id,
            stored = %existing.display_name,
            incoming = %display_name,
            "{kind} name mismatch, updating"
        );
        self.store
            .update_display_name(kind, surrogate_id, display_name)
            .await?;

        Ok(Reconciled {
            surrogate_id,
            outcome: Outcome::Renamed {
                previous: existing.display_name,
            },
        })
    }
}
