//! Loading config files from disk

use moorage_config::{ConfigError, MoorageConfig};
use moorage_query::CoercionPolicy;
use std::io::Write;
use tempfile::{Builder, TempDir};

fn write_config(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = Builder::new()
        .prefix("moorage")
        .suffix(suffix)
        .tempfile()
        .expect("create temp config");
    file.write_all(content.as_bytes()).expect("write temp config");
    file
}

#[test]
fn test_load_toml_file() {
    let file = write_config(
        ".toml",
        r#"
[translate]
coercion = "strict"
native_key = "_key"
"#,
    );

    let config = MoorageConfig::from_file(file.path()).unwrap();
    assert_eq!(config.translate.coercion, CoercionPolicy::Strict);
    assert_eq!(config.translate.native_key, "_key");
}

#[test]
fn test_load_yaml_file() {
    let file = write_config(
        ".yaml",
        "translate:\n  like_case_insensitive: false\nlogging:\n  level: info\n",
    );

    let config = MoorageConfig::from_file(file.path()).unwrap();
    assert!(!config.translate.like_case_insensitive);
    assert_eq!(config.logging.level.as_deref(), Some("info"));
}

#[test]
fn test_load_json_file() {
    let file = write_config(".json", r#"{"logging": {"level": "warn"}}"#);

    let config = MoorageConfig::from_file(file.path()).unwrap();
    assert_eq!(config.logging.level.as_deref(), Some("warn"));
    assert_eq!(config.translate.coercion, CoercionPolicy::Permissive);
}

#[test]
fn test_unsupported_extension() {
    let file = write_config(".ini", "coercion=strict");

    let err = MoorageConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");

    let err = MoorageConfig::from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn test_invalid_toml() {
    let file = write_config(".toml", "[translate\ncoercion = ");

    let err = MoorageConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn test_empty_native_key_in_file() {
    let file = write_config(".toml", "[translate]\nnative_key = \"\"\n");

    let err = MoorageConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { .. }));
}
