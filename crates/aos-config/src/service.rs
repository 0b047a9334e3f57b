use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
/// Env var NAME the database URL is read from unless `db.url_env` says otherwise.
pub const DEFAULT_DB_URL_ENV: &str = "AOS_DATABASE_URL";

/// Settings the daemon and CLI read from the merged config.
///
/// ```yaml
/// daemon:
///   bind_addr: "127.0.0.1:8899"
///   archive_root: "./var"        # optional; no archiving when absent
/// db:
///   url_env: "AOS_DATABASE_URL"  # NAME of the env var holding the URL
///   max_connections: 10
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub archive_root: Option<PathBuf>,
    pub db_url_env: String,
    pub db_max_connections: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8899)),
            archive_root: None,
            db_url_env: DEFAULT_DB_URL_ENV.to_string(),
            db_max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl ServiceConfig {
    pub fn from_config_json(v: &Value) -> Result<Self> {
        let mut cfg = Self::default();

        if let Some(raw) = str_at(v, "/daemon/bind_addr")? {
            cfg.bind_addr = raw
                .parse()
                .with_context(|| format!("CONFIG_INVALID /daemon/bind_addr: {raw}"))?;
        }

        if let Some(raw) = str_at(v, "/daemon/archive_root")? {
            if !raw.trim().is_empty() {
                cfg.archive_root = Some(PathBuf::from(raw));
            }
        }

        if let Some(raw) = str_at(v, "/db/url_env")? {
            if raw.trim().is_empty() {
                bail!("CONFIG_INVALID /db/url_env: must name an environment variable");
            }
            cfg.db_url_env = raw.to_string();
        }

        match v.pointer("/db/max_connections") {
            None | Some(Value::Null) => {}
            Some(n) => {
                let n = n
                    .as_u64()
                    .filter(|n| (1..=u64::from(u32::MAX)).contains(n))
                    .with_context(|| format!("CONFIG_INVALID /db/max_connections: {n}"))?;
                cfg.db_max_connections = n as u32;
            }
        }

        Ok(cfg)
    }
}

fn str_at<'a>(v: &'a Value, ptr: &str) -> Result<Option<&'a str>> {
    match v.pointer(ptr) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => bail!("CONFIG_INVALID {ptr}: expected string, got {other}"),
    }
}
