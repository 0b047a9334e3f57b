//! Scenario: `aos sync` and `aos entity` against a real database
//!
//! DB-backed test, skipped if AOS_DATABASE_URL is not set.

use predicates::prelude::*;
use uuid::Uuid;

#[allow(deprecated)]
#[tokio::test]
async fn sync_advertiser_then_show() -> anyhow::Result<()> {
    let url = match std::env::var(aos_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: AOS_DATABASE_URL not set");
            return Ok(());
        }
    };

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await?;
    aos_db::migrate(&pool).await?;

    // Unique source id avoids collisions with other tests / local runs.
    let src = format!("ADV-CLI-{}", Uuid::new_v4());
    let payload = serde_json::json!({"name": "Cli Co", "sourceAdvertiserId": src}).to_string();

    let mut cmd = assert_cmd::Command::cargo_bin("aos")?;
    cmd.env(aos_db::ENV_DB_URL, &url)
        .env_remove(aos_config::ENV_CONFIG_PATHS)
        .args(["sync", "advertiser", "--payload", &payload]);
    let out = cmd.assert().success().stderr(predicate::str::contains("outcome=created"));

    let resp: serde_json::Value = serde_json::from_slice(&out.get_output().stdout)?;
    assert_eq!(resp["sourceAdvertiserId"], src.as_str());
    let id = resp["advertiserId"].as_i64().expect("advertiserId");

    // Second run: same id, no write.
    let mut cmd = assert_cmd::Command::cargo_bin("aos")?;
    cmd.env(aos_db::ENV_DB_URL, &url)
        .env_remove(aos_config::ENV_CONFIG_PATHS)
        .args(["sync", "advertiser", "--payload", &payload]);
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("outcome=unchanged"))
        .stdout(predicate::str::contains(format!("\"advertiserId\": {id}")));

    let mut cmd = assert_cmd::Command::cargo_bin("aos")?;
    cmd.env(aos_db::ENV_DB_URL, &url)
        .env_remove(aos_config::ENV_CONFIG_PATHS)
        .args(["entity", "show", "--kind", "advertiser", "--id", &id.to_string()]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(src.as_str()))
        .stdout(predicate::str::contains("Cli Co"));

    Ok(())
}
