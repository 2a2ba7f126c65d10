use std::fs;

use tally::config::{Config, CONFIG_FILE};
use tally::storage::Storage;

#[test]
fn load_from_root_defaults_on_invalid_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join(CONFIG_FILE), "store = 123").expect("write invalid config");

    let cfg = Config::load_from_root(dir.path());
    assert_eq!(cfg.store.dir, ".tally");
    assert_eq!(cfg.stats.top_resources, 5);
}

#[test]
fn load_from_root_defaults_on_zero_lock_timeout() {
    let dir = tempfile::tempdir().expect("tempdir");
    let content = r#"
[store]
dir = "data"
lock_timeout_ms = 0
"#;
    fs::write(dir.path().join(CONFIG_FILE), content.trim()).expect("write config");

    let cfg = Config::load_from_root(dir.path());
    assert_eq!(cfg.store.dir, ".tally");
}

#[test]
fn storage_follows_configured_dir() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join(CONFIG_FILE), "[store]\ndir = \"records\"").expect("write config");

    let cfg = Config::load_from_root(dir.path());
    let storage = Storage::from_config(dir.path(), &cfg);
    storage.init().expect("init");

    assert!(dir.path().join("records").join("projects.json").exists());
    assert!(!dir.path().join(".tally").exists());
}
