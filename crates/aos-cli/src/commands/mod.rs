//! Command handler modules for aos-cli.
//!
//! Shared utilities used by multiple command paths live here.

pub mod entity;
pub mod sync;

use std::fs;

use anyhow::{Context, Result};
use aos_db::PgPool;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Connect using the database settings from the `AOS_CONFIG` layers.
pub async fn connect_configured() -> Result<PgPool> {
    let loaded = aos_config::load_from_env()?;
    let cfg = loaded.service()?;
    let url = aos_db::database_url_from_env(&cfg.db_url_env)?;
    aos_db::connect(&url, cfg.db_max_connections).await
}

/// Load a payload from either an inline JSON string or a file path.
pub fn load_payload(payload: Option<String>, payload_file: Option<String>) -> Result<Value> {
    if let Some(p) = payload_file {
        let bytes = fs::read(&p).with_context(|| format!("read payload-file failed: {}", p))?;
        // Strip UTF-8 BOM if present.
        let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
        let raw = String::from_utf8(bytes.to_vec()).context("payload-file must be UTF-8 text")?;
        let v: Value =
            serde_json::from_str(raw.trim()).context("payload-file must contain valid JSON")?;
        return Ok(v);
    }

    let raw = payload.context("must provide --payload or --payload-file")?;
    let v: Value = serde_json::from_str(raw.trim()).context("--payload must be valid JSON")?;
    Ok(v)
}
