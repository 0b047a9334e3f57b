//! Request archive: every dispatched request is written to disk before it is
//! handled, one indented JSON file per request.
//!
//! Layout: `<root>/requests/request_<YYYY-MM-DD_HH-MM-SS>_<suffix>.json`
//! with body `{"path": ..., "headers": {...}, "json": ...}`. The suffix keeps
//! requests landing in the same second apart.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::http::HeaderMap;
use serde::Serialize;
use serde_json::Value;

pub const ARCHIVE_SUBDIR: &str = "requests";

#[derive(Debug, Clone)]
pub struct RequestArchive {
    root: PathBuf,
}

#[derive(Debug, Serialize)]
struct ArchivedRequest<'a> {
    path: &'a str,
    headers: BTreeMap<String, String>,
    json: &'a Value,
}

impl RequestArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn dir(&self) -> PathBuf {
        self.root.join(ARCHIVE_SUBDIR)
    }

    /// Write one request and return the file path.
    ///
    /// `json` is `null` when the body was not valid JSON.
    pub async fn save(&self, path: &str, headers: &HeaderMap, json: &Value) -> Result<PathBuf> {
        let dir = self.dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("create archive dir failed: {}", dir.display()))?;

        let record = ArchivedRequest {
            path,
            headers: header_map(headers),
            json,
        };
        let body = serde_json::to_string_pretty(&record).context("serialize archived request")?;

        let file = dir.join(file_name(chrono::Local::now().naive_local()));
        tokio::fs::write(&file, body)
            .await
            .with_context(|| format!("write archive file failed: {}", file.display()))?;
        Ok(file)
    }
}

fn file_name(now: chrono::NaiveDateTime) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("request_{}_{}.json", now.format("%Y-%m-%d_%H-%M-%S"), &suffix[..8])
}

/// Repeated headers are joined with ", ". Non-UTF-8 values are kept lossily.
fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let v = String::from_utf8_lossy(value.as_bytes()).into_owned();
        out.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&v);
            })
            .or_insert(v);
    }
    out
}
