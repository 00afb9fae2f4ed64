use std::fs;

use moat::config::{Config, CONFIG_FILE};
use moat::Error;

#[test]
fn config_defaults_when_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = Config::load_from_root(dir.path()).expect("defaults");

    assert_eq!(config.tasks.dedup_tolerance_px, 10.0);
    assert_eq!(config.markdown.title, "Moat Tasks");
    assert_eq!(config.markdown.comment_max_len, 60);
}

#[test]
fn config_overrides_from_toml() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let toml = r#"
[tasks]
dedup_tolerance_px = 0

[markdown]
title = "QA"
"#;
    fs::write(dir.path().join(CONFIG_FILE), toml)?;

    let config = Config::load_from_root(dir.path())?;
    assert_eq!(config.tasks.dedup_tolerance_px, 0.0);
    assert_eq!(config.markdown.title, "QA");
    assert_eq!(config.markdown.comment_max_len, 60);
    Ok(())
}

#[test]
fn malformed_toml_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join(CONFIG_FILE), "[tasks\n").expect("write");

    let err = Config::load_from_root(dir.path()).expect_err("malformed");
    assert!(matches!(err, Error::TomlParse(_)));
}
