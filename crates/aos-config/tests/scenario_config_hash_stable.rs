//! Scenario: the config hash identifies the effective configuration
//!
//! GREEN when:
//! - the same layers hash identically on every load;
//! - key order inside a YAML document does not change the hash;
//! - an overlay that changes a value changes the hash;
//! - later layers override earlier ones leaf by leaf.

use aos_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
daemon:
  bind_addr: "127.0.0.1:8899"
  archive_root: "./var"
db:
  url_env: "AOS_DATABASE_URL"
  max_connections: 10
"#;

const BASE_YAML_REORDERED: &str = r#"
db:
  max_connections: 10
  url_env: "AOS_DATABASE_URL"
daemon:
  archive_root: "./var"
  bind_addr: "127.0.0.1:8899"
"#;

const OVERLAY_YAML: &str = r#"
daemon:
  bind_addr: "0.0.0.0:9000"
db:
  max_connections: 4
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();

    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let original = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let reordered = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();

    assert_eq!(
        original.config_hash, reordered.config_hash,
        "reordering keys in YAML must not change the hash"
    );
    assert_eq!(original.canonical_json, reordered.canonical_json);
}

#[test]
fn overlay_changes_hash_and_values() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let merged = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();

    assert_ne!(base.config_hash, merged.config_hash);

    let svc = merged.service().unwrap();
    assert_eq!(svc.bind_addr.to_string(), "0.0.0.0:9000");
    assert_eq!(svc.db_max_connections, 4);
    // Untouched sibling survives the overlay.
    assert_eq!(svc.archive_root.as_deref(), Some(std::path::Path::new("./var")));
    assert_eq!(svc.db_url_env, "AOS_DATABASE_URL");
}

#[test]
fn hash_is_64_hex_chars() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();

    assert_eq!(loaded.config_hash.len(), 64);
    assert!(loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn empty_config_uses_service_defaults() {
    let a = load_layered_yaml_from_strings(&["{}"]).unwrap();
    let b = load_layered_yaml_from_strings(&[]).unwrap();

    assert_eq!(a.config_hash, b.config_hash, "empty layers hash like no layers");
    assert_eq!(a.service().unwrap(), aos_config::ServiceConfig::default());
}

#[test]
fn layered_files_load_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.yaml");
    let local = dir.path().join("local.yaml");
    std::fs::write(&base, BASE_YAML).unwrap();
    std::fs::write(&local, OVERLAY_YAML).unwrap();

    let from_files = aos_config::load_layered_yaml(&[
        base.to_str().unwrap(),
        local.to_str().unwrap(),
    ])
    .unwrap();
    let from_strings = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();

    assert_eq!(from_files.config_hash, from_strings.config_hash);
}

#[test]
fn missing_file_is_an_error() {
    let err = aos_config::load_layered_yaml(&["/definitely/not/here.yaml"]).unwrap_err();
    assert!(err.to_string().contains("failed to read yaml path"), "{err}");
}
