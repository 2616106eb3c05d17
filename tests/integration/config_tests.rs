use clap::Parser;
use dupelink::cli::{Cli, Commands};
use dupelink::config::Config;
use dupelink::duplicates::Criterion;
use figment::providers::{Format, Serialized, Toml};
use figment::Figment;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_config_load_defaults() {
    // Use figment directly without Env to avoid interference from other tests
    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .extract()
        .unwrap();

    assert!(config.distinguish.is_empty());
    assert_eq!(config.min_size, None);
    assert!(!config.strict);
    assert_eq!(config.partial_hash_size, 16 * 1024 * 1024);
}

#[test]
fn test_config_load_from_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let toml_content = r#"
distinguish = ["mtime", "p", "user"]
min_size = 4096
max_size = 1073741824
one_file_system = true
strict = true
partial_hash_size = 65536
"#;
    fs::write(&config_path, toml_content).unwrap();

    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&config_path))
        .extract()
        .unwrap();

    assert_eq!(
        config.distinguish,
        vec![Criterion::Mtime, Criterion::Mode, Criterion::User]
    );
    assert_eq!(config.min_size, Some(4096));
    assert_eq!(config.max_size, Some(1_073_741_824));
    assert!(config.one_file_system);
    assert!(config.strict);
    assert_eq!(config.partial_hash_size, 65536);

    let criteria = config.criteria();
    assert!(criteria.mtime && criteria.mode && criteria.user);
    assert!(!criteria.device);
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "strict = true\n").unwrap();

    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&config_path))
        .extract()
        .unwrap();

    assert!(config.strict);
    assert!(config.distinguish.is_empty());
    assert_eq!(config.partial_hash_size, 16 * 1024 * 1024);
}

#[test]
fn test_unknown_criterion_rejected() {
    let result: Result<Config, _> = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::string("distinguish = [\"colour\"]"))
        .extract();

    assert!(result.is_err());
}

#[test]
fn test_cli_flags_override_file() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "min_size = 100\ndistinguish = [\"mtime\"]\n").unwrap();

    let mut config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&config_path))
        .extract()
        .unwrap();

    let cli = Cli::try_parse_from(["dupelink", "list", "/p", "--min-size", "1KB", "-b", "d"])
        .unwrap();
    assert!(matches!(cli.command, Commands::List(_)));
    config.apply_scan_args(cli.command.scan_args()).unwrap();

    assert_eq!(config.min_size, Some(1024));
    assert_eq!(config.distinguish, vec![Criterion::Device]);
    assert_eq!(config.walker_config().min_size, Some(1024));
}
