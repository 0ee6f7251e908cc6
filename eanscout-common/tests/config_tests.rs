//! Tests for configuration loading and root folder resolution
//!
//! - Missing TOML file falls back to defaults
//! - Partial TOML files keep defaults for omitted fields
//! - Priority order for root folder resolution (CLI → ENV → TOML → default)
//!
//! Tests that touch process environment variables are marked #[serial].

use eanscout_common::config::{
    default_root_folder, load_toml_config, resolve_root_folder, CachePolicy, TomlConfig,
    MAX_IMAGES_ENV, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};

#[test]
fn test_missing_config_file_uses_defaults() {
    let config = load_toml_config(Path::new("/nonexistent/eanscout.toml")).unwrap();

    assert_eq!(config.port, 8000);
    assert_eq!(config.scraper.request_timeout_secs, 10);
    assert_eq!(config.scraper.celio_sites.len(), 4);
    assert_eq!(config.scraper.modov_domains.len(), 6);
    assert_eq!(config.images.max_images_per_product, 3);
    assert_eq!(config.tasks.retention_secs, 3600);
    assert_eq!(config.scraper.cache_policy, CachePolicy::Always);
}

#[test]
fn test_partial_config_keeps_defaults() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("eanscout.toml");
    std::fs::write(
        &path,
        r#"
port = 9100

[scraper]
cache_policy = "retry_unresolved"

[[scraper.modov_domains]]
domain = "ceneo.pl"
priority = 2

[[scraper.modov_domains]]
domain = "modov.sk"
priority = 1
"#,
    )
    .unwrap();

    let config = load_toml_config(&path).unwrap();

    assert_eq!(config.port, 9100);
    assert_eq!(config.scraper.cache_policy, CachePolicy::RetryUnresolved);
    // Celio list not given: defaults remain
    assert_eq!(config.scraper.celio_sites.len(), 4);

    let order: Vec<&str> = config
        .scraper
        .modov_by_priority()
        .iter()
        .map(|d| d.site_name.as_str())
        .collect();
    assert_eq!(order, vec!["modov.sk", "ceneo.pl"]);
}

#[test]
fn test_malformed_config_is_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("eanscout.toml");
    std::fs::write(&path, "port = \"not a number\"").unwrap();

    assert!(load_toml_config(&path).is_err());
}

#[test]
#[serial]
fn test_root_folder_cli_wins() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/from-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..TomlConfig::default()
    };

    let root = resolve_root_folder(Some(Path::new("/tmp/from-cli")), ROOT_FOLDER_ENV, &config);
    assert_eq!(root, PathBuf::from("/tmp/from-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_root_folder_env_before_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/from-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..TomlConfig::default()
    };

    let root = resolve_root_folder(None, ROOT_FOLDER_ENV, &config);
    assert_eq!(root, PathBuf::from("/tmp/from-env"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_root_folder_falls_back_to_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let from_toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..TomlConfig::default()
    };
    assert_eq!(
        resolve_root_folder(None, ROOT_FOLDER_ENV, &from_toml),
        PathBuf::from("/tmp/from-toml")
    );

    let root = resolve_root_folder(None, ROOT_FOLDER_ENV, &TomlConfig::default());
    assert_eq!(root, default_root_folder());
}

#[test]
#[serial]
fn test_image_cap_env_override() {
    env::set_var(MAX_IMAGES_ENV, "5");
    let mut config = TomlConfig::default();
    config.apply_env_overrides();
    assert_eq!(config.images.max_images_per_product, 5);

    env::set_var(MAX_IMAGES_ENV, "many");
    let mut config = TomlConfig::default();
    config.apply_env_overrides();
    assert_eq!(config.images.max_images_per_product, 3);

    env::remove_var(MAX_IMAGES_ENV);
}
