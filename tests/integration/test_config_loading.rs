use patchrelay::core::config::{parse_port, ConfigLoader, PortValue};
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn clear_patchrelay_env() {
    for v in &[
        "PATCHRELAY_CONFIG",
        "PATCHRELAY_REPO_ROOT",
        "PATCHRELAY_KEEP_TEMP",
        "PATCHRELAY_BIND",
        "PATCHRELAY_PORT",
        "PATCHRELAY_COMMAND_TIMEOUT_SECS",
    ] {
        env::remove_var(v);
    }
}

const FULL_CONFIG: &str = r#"
[[ssh_keys]]
path = "~/.ssh/deploy"
label = "Deploy"
default = true

[[ssh_keys]]
path = "/keys/ci"

[[git_users]]
name = "Relay Bot"
email = "relay@example.com"
default = true

[server]
bind = "127.0.0.1"
port = "9090"

[runtime]
repo_root = "/srv/patchrelay/repos"
keep_temp = true
command_timeout_secs = 30
"#;

#[test]
#[serial]
fn test_full_config_file() {
    clear_patchrelay_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    fs::write(&path, FULL_CONFIG).unwrap();

    let config = ConfigLoader::load(&path).unwrap();
    assert_eq!(config.ssh_keys.len(), 2);
    assert_eq!(config.git_users[0].name, "Relay Bot");

    let summary = config.summary();
    assert_eq!(summary.ssh_keys[0].label, "Deploy");
    assert_eq!(summary.ssh_keys[1].label, "/keys/ci");
    assert_eq!(summary.default_ssh_key_index, Some(0));
    assert_eq!(summary.git_users[0].label, "Relay Bot <relay@example.com>");

    let settings = ConfigLoader::runtime_settings(&config).unwrap();
    assert_eq!(settings.repo_root, PathBuf::from("/srv/patchrelay/repos"));
    assert!(settings.keep_temp);
    assert_eq!(settings.command_timeout, Some(Duration::from_secs(30)));

    let bind = ConfigLoader::server_bind(&config, None, None).unwrap();
    assert_eq!(bind.bind, "127.0.0.1");
    assert_eq!(bind.port, 9090);
}

#[test]
#[serial]
fn test_missing_file_yields_defaults() {
    clear_patchrelay_env();
    let temp_dir = TempDir::new().unwrap();

    let config = ConfigLoader::load(&temp_dir.path().join("absent.toml")).unwrap();
    assert!(config.ssh_keys.is_empty());
    assert!(config.git_users.is_empty());

    let settings = ConfigLoader::runtime_settings(&config).unwrap();
    assert_eq!(settings.repo_root, PathBuf::from("repos"));
    assert!(!settings.keep_temp);
    assert_eq!(settings.command_timeout, Some(Duration::from_secs(600)));

    let bind = ConfigLoader::server_bind(&config, None, None).unwrap();
    assert_eq!(bind.bind, "0.0.0.0");
    assert_eq!(bind.port, 8080);
}

#[test]
#[serial]
fn test_env_overrides_file() {
    clear_patchrelay_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    fs::write(&path, FULL_CONFIG).unwrap();
    let config = ConfigLoader::load(&path).unwrap();

    env::set_var("PATCHRELAY_REPO_ROOT", "/var/cache/relay");
    env::set_var("PATCHRELAY_KEEP_TEMP", "off");
    env::set_var("PATCHRELAY_COMMAND_TIMEOUT_SECS", "0");
    env::set_var("PATCHRELAY_BIND", "::1");
    env::set_var("PATCHRELAY_PORT", "7000");

    let settings = ConfigLoader::runtime_settings(&config).unwrap();
    assert_eq!(settings.repo_root, PathBuf::from("/var/cache/relay"));
    assert!(!settings.keep_temp);
    assert_eq!(settings.command_timeout, None);

    let bind = ConfigLoader::server_bind(&config, None, None).unwrap();
    assert_eq!(bind.bind, "::1");
    assert_eq!(bind.port, 7000);

    let bind = ConfigLoader::server_bind(&config, Some("10.0.0.1"), Some(7100)).unwrap();
    assert_eq!(bind.bind, "10.0.0.1");
    assert_eq!(bind.port, 7100);

    clear_patchrelay_env();
}

#[test]
#[serial]
fn test_invalid_env_values_are_config_errors() {
    clear_patchrelay_env();
    let config = ConfigLoader::parse("").unwrap();

    env::set_var("PATCHRELAY_COMMAND_TIMEOUT_SECS", "soon");
    let err = ConfigLoader::runtime_settings(&config).unwrap_err();
    assert_eq!(err.code, "CFG-003");
    env::remove_var("PATCHRELAY_COMMAND_TIMEOUT_SECS");

    env::set_var("PATCHRELAY_PORT", "eighty");
    let err = ConfigLoader::server_bind(&config, None, None).unwrap_err();
    assert_eq!(err.code, "CFG-002");

    env::set_var("PATCHRELAY_PORT", "70000");
    assert!(ConfigLoader::server_bind(&config, None, None).is_err());

    clear_patchrelay_env();
}

#[test]
#[serial]
fn test_config_path_resolution() {
    clear_patchrelay_env();
    assert_eq!(ConfigLoader::config_path(None), PathBuf::from("config.toml"));

    env::set_var("PATCHRELAY_CONFIG", "/etc/patchrelay/relay.toml");
    assert_eq!(
        ConfigLoader::config_path(None),
        PathBuf::from("/etc/patchrelay/relay.toml")
    );
    assert_eq!(
        ConfigLoader::config_path(Some(PathBuf::from("local.toml").as_path())),
        PathBuf::from("local.toml")
    );

    clear_patchrelay_env();
}

#[test]
#[serial]
fn test_parse_errors_name_the_file() {
    clear_patchrelay_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    fs::write(&path, "[server\nport = 1").unwrap();

    let err = ConfigLoader::load(&path).unwrap_err();
    assert_eq!(err.code, "CFG-001");
    assert!(err.message.starts_with("Failed to parse configuration file"));
    assert!(err.message.contains("broken.toml"));
}

#[test]
#[serial]
fn test_port_values() {
    clear_patchrelay_env();
    assert_eq!(parse_port(&PortValue::Number(443)).unwrap(), 443);
    assert_eq!(parse_port(&PortValue::Text(" 8081 ".to_string())).unwrap(), 8081);
    assert!(parse_port(&PortValue::Number(0)).is_err());
    assert!(parse_port(&PortValue::Number(65536)).is_err());
    assert!(parse_port(&PortValue::Flag(true)).is_err());
    assert!(parse_port(&PortValue::Text(String::new())).is_err());

    let config = ConfigLoader::parse("[server]\nport = true\n").unwrap();
    assert!(ConfigLoader::server_bind(&config, None, None).is_err());
}
