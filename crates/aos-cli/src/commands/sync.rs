//! `aos sync advertiser|order`: one sync through the same code path the
//! daemon uses, against the configured database.

use std::sync::Arc;

use anyhow::{bail, Result};
use aos_db::PgEntityStore;
use aos_reconcile::sync::{self, SyncedEntity};
use aos_reconcile::{EntityKind, Reconciler};

use super::{connect_configured, load_payload};

pub async fn run(kind: EntityKind, payload: Option<String>, payload_file: Option<String>) -> Result<()> {
    // Parse before connecting so bad input never needs a database.
    let payload = load_payload(payload, payload_file)?;

    let pool = connect_configured().await?;
    let rec = Reconciler::new(Arc::new(PgEntityStore::new(pool.clone())));

    let (body, synced) = match kind {
        EntityKind::Advertiser => {
            let resp = sync::sync_advertiser(&rec, &payload).await?;
            (serde_json::to_string_pretty(&resp)?, resp.synced)
        }
        EntityKind::Order => {
            let resp = sync::sync_order(&rec, &payload).await?;
            (serde_json::to_string_pretty(&resp)?, resp.synced)
        }
        EntityKind::LineItem => bail!("line items sync as part of an order"),
    };
    pool.close().await;

    report(&synced);
    println!("{body}");
    Ok(())
}

fn report(synced: &[SyncedEntity]) {
    for s in synced {
        eprintln!(
            "synced kind={} external_id={} surrogate_id={} outcome={}",
            s.kind,
            s.external_id,
            s.reconciled.surrogate_id,
            s.reconciled.outcome.as_str()
        );
    }
}

