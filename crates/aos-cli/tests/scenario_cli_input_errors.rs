//! Scenario: bad CLI input fails before any database is needed
//!
//! These run without AOS_DATABASE_URL; the env var is cleared explicitly so
//! a configured developer shell cannot change the outcome.

use predicates::prelude::*;

#[allow(deprecated)]
#[test]
fn sync_rejects_invalid_payload_json() -> anyhow::Result<()> {
    let mut cmd = assert_cmd::Command::cargo_bin("aos")?;
    cmd.env_remove(aos_db::ENV_DB_URL)
        .args(["sync", "advertiser", "--payload", "{not json"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--payload must be valid JSON"));
    Ok(())
}

#[allow(deprecated)]
#[test]
fn sync_requires_a_payload() -> anyhow::Result<()> {
    let mut cmd = assert_cmd::Command::cargo_bin("aos")?;
    cmd.env_remove(aos_db::ENV_DB_URL).args(["sync", "order"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("must provide --payload or --payload-file"));
    Ok(())
}

#[allow(deprecated)]
#[test]
fn entity_rejects_unknown_kind() -> anyhow::Result<()> {
    let mut cmd = assert_cmd::Command::cargo_bin("aos")?;
    cmd.args(["entity", "max-id", "--kind", "campaign"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("unknown kind 'campaign'"));
    Ok(())
}

#[allow(deprecated)]
#[test]
fn db_status_without_url_names_the_env_var() -> anyhow::Result<()> {
    let mut cmd = assert_cmd::Command::cargo_bin("aos")?;
    cmd.env_remove(aos_db::ENV_DB_URL)
        .env_remove(aos_config::ENV_CONFIG_PATHS)
        .args(["db", "status"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("missing env var AOS_DATABASE_URL"));
    Ok(())
}

/// The tests above clear `aos_db::ENV_DB_URL`; the binary reads whatever
/// `ServiceConfig` names. Both must be the same variable.
#[test]
fn config_default_db_url_env_matches_db_crate() {
    assert_eq!(aos_config::DEFAULT_DB_URL_ENV, aos_db::ENV_DB_URL);
    assert_eq!(
        aos_config::ServiceConfig::default().db_url_env,
        aos_db::ENV_DB_URL
    );
}
