use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;

use aos_reconcile::EntityKind;

mod entity_store;

pub use entity_store::PgEntityStore;
pub use sqlx::PgPool;

pub const ENV_DB_URL: &str = "AOS_DATABASE_URL";

/// Connect to Postgres eagerly; fails fast when the server is unreachable.
pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Read a database URL from the named environment variable.
pub fn database_url_from_env(env_name: &str) -> Result<String> {
    std::env::var(env_name).with_context(|| format!("missing env var {env_name}"))
}

/// Build a pool that opens connections on first use.
///
/// The daemon builds one of these at startup, probes it with [`status`],
/// shares it for the life of the process and closes it on shutdown.
pub fn connect_lazy(url: &str, max_connections: u32) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(10))
        .connect_lazy(url)
        .context("invalid Postgres connection url")
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Simple status query (connectivity + entity table presence).
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;
    let ok = one == 1;

    let mut missing_tables = Vec::new();
    for kind in EntityKind::ALL {
        let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
            r#"
            select exists (
                select 1
                from information_schema.tables
                where table_schema = current_schema() and table_name = $1
            )
            "#,
        )
        .bind(kind.table())
        .fetch_one(pool)
        .await
        .with_context(|| format!("status table-exists query failed: {}", kind.table()))?;

        if !exists {
            missing_tables.push(kind.table());
        }
    }

    Ok(DbStatus { ok, missing_tables })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub missing_tables: Vec<&'static str>,
}

impl DbStatus {
    pub fn has_entity_tables(&self) -> bool {
        self.missing_tables.is_empty()
    }
}

/// Row count for one entity table.
pub async fn count_entities(pool: &PgPool, kind: EntityKind) -> Result<i64> {
    let sql = format!("select count(*)::bigint from {}", kind.table());
    let (n,): (i64,) = sqlx::query_as::<_, (i64,)>(&sql)
        .fetch_one(pool)
        .await
        .with_context(|| format!("count_entities failed: {}", kind.table()))?;
    Ok(n)
}
