//! Postgres-backed [`EntityStore`].
//!
//! Values are always bound as statement parameters. Table names are
//! interpolated, but only from the closed [`EntityKind`] set.
//!
//! `insert_if_absent` takes a per-table transaction-scoped advisory lock so
//! that "read max id, insert max + 1" cannot interleave with another writer
//! of the same table. The unique constraint on `oms_id` backs this up for
//! writers that bypass the lock.

use aos_reconcile::{
    CreateAttrs, EntityKind, EntityRecord, EntityStore, ExistingEntity, InsertOutcome,
    LineItemAttrs, NewEntity, OrderAttrs, StoreError,
};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use tracing::debug;

#[derive(Clone)]
pub struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Advisory lock key for id allocation in one table.
fn allocation_lock_key(kind: EntityKind) -> i64 {
    // "AOS" in the high bytes keeps clear of other lock users.
    let base: i64 = 0x414f_5300;
    match kind {
        EntityKind::Advertiser => base + 1,
        EntityKind::Order => base + 2,
        EntityKind::LineItem => base + 3,
    }
}

/// Map a driver error onto the store taxonomy.
fn store_err(op: &'static str, e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(format!("{op}: {e}")),
        sqlx::Error::Database(ref db) if db.code().as_deref() == Some("23505") => StoreError::Conflict {
            op,
            message: db.message().to_string(),
        },
        other => StoreError::statement(op, other.to_string()),
    }
}

async fn lookup_on(
    conn: &mut PgConnection,
    kind: EntityKind,
    external_id: &str,
) -> Result<Option<ExistingEntity>, StoreError> {
    let sql = format!(
        "select id, name from {} where oms_id = $1 order by id limit 1",
        kind.table()
    );
    let row = sqlx::query(&sql)
        .bind(external_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| store_err("lookup", e))?;

    row.map(|r| {
        Ok(ExistingEntity {
            surrogate_id: r.try_get("id").map_err(|e| store_err("lookup", e))?,
            display_name: r.try_get("name").map_err(|e| store_err("lookup", e))?,
        })
    })
    .transpose()
}

async fn max_id_on(conn: &mut PgConnection, kind: EntityKind) -> Result<Option<i64>, StoreError> {
    let sql = format!("select max(id) from {}", kind.table());
    let (max,): (Option<i64>,) = sqlx::query_as::<_, (Option<i64>,)>(&sql)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| store_err("max_surrogate_id", e))?;
    Ok(max)
}

/// Insert with an explicit id. Returns `false` when a row with the same
/// `oms_id` already exists.
async fn insert_row(conn: &mut PgConnection, id: i64, entity: &NewEntity) -> Result<bool, StoreError> {
    let q = match &entity.attrs {
        CreateAttrs::Advertiser => sqlx::query(
            r#"
            insert into advertisers (id, name, oms_id)
            values ($1, $2, $3)
            on conflict (oms_id) do nothing
            returning id
            "#,
        )
        .bind(id)
        .bind(&entity.display_name)
        .bind(&entity.external_id),

        CreateAttrs::Order(o) => sqlx::query(
            r#"
            insert into orders (
              id, name, oms_id, start_date, end_date, advertiser_id,
              salesperson_email_id, salesperson_name
            ) values (
              $1, $2, $3, $4, $5, $6, $7, $8
            )
            on conflict (oms_id) do nothing
            returning id
            "#,
        )
        .bind(id)
        .bind(&entity.display_name)
        .bind(&entity.external_id)
        .bind(o.start_date)
        .bind(o.end_date)
        .bind(o.advertiser_id)
        .bind(&o.salesperson_email_id)
        .bind(&o.salesperson_name),

        CreateAttrs::LineItem(li) => sqlx::query(
            r#"
            insert into line_items (
              id, name, oms_id, start_date, end_date, cost_method, quantity, unit_cost
            ) values (
              $1, $2, $3, $4, $5, $6, $7, $8
            )
            on conflict (oms_id) do nothing
            returning id
            "#,
        )
        .bind(id)
        .bind(&entity.display_name)
        .bind(&entity.external_id)
        .bind(li.start_date)
        .bind(li.end_date)
        .bind(&li.cost_method)
        .bind(li.quantity)
        .bind(li.unit_cost),
    };

    let row = q
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| store_err("insert_if_absent", e))?;
    Ok(row.is_some())
}

fn record_from_row(kind: EntityKind, r: &PgRow) -> Result<EntityRecord, sqlx::Error> {
    let attrs = match kind {
        EntityKind::Advertiser => CreateAttrs::Advertiser,
        EntityKind::Order => CreateAttrs::Order(OrderAttrs {
            start_date: r.try_get("start_date")?,
            end_date: r.try_get("end_date")?,
            advertiser_id: r.try_get("advertiser_id")?,
            salesperson_email_id: r.try_get("salesperson_email_id")?,
            salesperson_name: r.try_get("salesperson_name")?,
        }),
        EntityKind::LineItem => CreateAttrs::LineItem(LineItemAttrs {
            start_date: r.try_get("start_date")?,
            end_date: r.try_get("end_date")?,
            cost_method: r.try_get("cost_method")?,
            quantity: r.try_get("quantity")?,
            unit_cost: r.try_get("unit_cost")?,
        }),
    };

    Ok(EntityRecord {
        surrogate_id: r.try_get("id")?,
        external_id: r.try_get("oms_id")?,
        display_name: r.try_get("name")?,
        attrs,
    })
}

#[async_trait::async_trait]
impl EntityStore for PgEntityStore {
    async fn lookup(&self, kind: EntityKind, external_id: &str) -> Result<Option<ExistingEntity>, StoreError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| store_err("lookup", e))?;
        lookup_on(&mut conn, kind, external_id).await
    }

    async fn max_surrogate_id(&self, kind: EntityKind) -> Result<Option<i64>, StoreError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| store_err("max_surrogate_id", e))?;
        max_id_on(&mut conn, kind).await
    }

    async fn update_display_name(&self, kind: EntityKind, surrogate_id: i64, display_name: &str) -> Result<(), StoreError> {
        let sql = format!("update {} set name = $1 where id = $2", kind.table());
        let res = sqlx::query(&sql)
            .bind(display_name)
            .bind(surrogate_id)
            .execute(&self.pool)
            .await
            .map_err(|e| store_err("update_display_name", e))?;

        if res.rows_affected() == 0 {
            return Err(StoreError::statement(
                "update_display_name",
                format!("no {kind} with id {surrogate_id}"),
            ));
        }
        Ok(())
    }

    async fn insert_if_absent(&self, entity: &NewEntity) -> Result<InsertOutcome, StoreError> {
        let kind = entity.kind();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_err("insert_if_absent", e))?;

        sqlx::query("select pg_advisory_xact_lock($1)")
            .bind(allocation_lock_key(kind))
            .execute(&mut *tx)
            .await
            .map_err(|e| store_err("insert_if_absent", e))?;

        // Re-check under the lock; the caller's lookup may be stale.
        if let Some(existing) = lookup_on(&mut tx, kind, &entity.external_id).await? {
            tx.commit().await.map_err(|e| store_err("insert_if_absent", e))?;
            return Ok(InsertOutcome::Existing(existing));
        }

        let new_id = max_id_on(&mut tx, kind).await?.unwrap_or(0) + 1;

        if !insert_row(&mut tx, new_id, entity).await? {
            // A writer outside the lock got there first.
            let existing = lookup_on(&mut tx, kind, &entity.external_id).await?;
            tx.commit().await.map_err(|e| store_err("insert_if_absent", e))?;
            return match existing {
                Some(e) => Ok(InsertOutcome::Existing(e)),
                None => Err(StoreError::Conflict {
                    op: "insert_if_absent",
                    message: format!("{kind} {} conflicted but is not visible", entity.external_id),
                }),
            };
        }

        tx.commit().await.map_err(|e| store_err("insert_if_absent", e))?;
        debug!(%kind, new_id, external_id = %entity.external_id, "row committed");
        Ok(InsertOutcome::Inserted(new_id))
    }

    async fn fetch(&self, kind: EntityKind, surrogate_id: i64) -> Result<Option<EntityRecord>, StoreError> {
        let sql = format!("select * from {} where id = $1", kind.table());
        let row = sqlx::query(&sql)
            .bind(surrogate_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_err("fetch", e))?;

        row.map(|r| record_from_row(kind, &r).map_err(|e| store_err("fetch", e)))
            .transpose()
    }
}
