//! `aos entity`: read-only inspection of stored rows.

use anyhow::{Context, Result};
use aos_db::PgEntityStore;
use aos_reconcile::{EntityKind, EntityStore};

use super::connect_configured;

pub async fn max_id(kind: EntityKind) -> Result<()> {
    let pool = connect_configured().await?;
    let store = PgEntityStore::new(pool.clone());
    let max = store.max_surrogate_id(kind).await?;
    pool.close().await;

    match max {
        Some(id) => println!("kind={kind} max_id={id}"),
        None => println!("kind={kind} max_id=none"),
    }
    Ok(())
}

pub async fn show(kind: EntityKind, id: i64) -> Result<()> {
    let pool = connect_configured().await?;
    let store = PgEntityStore::new(pool.clone());
    let record = store.fetch(kind, id).await?;
    pool.close().await;

    let record = record.with_context(|| format!("no {kind} with id {id}"))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
