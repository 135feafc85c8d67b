use std::fs;

use serial_test::serial;
use tempfile::TempDir;
use wisp_config::{ConfigError, ConfigLoader, ConfigOverrides, Mode, StageName};

const TOML: &str = r#"
[entry]
main = "./src/app.js"
result = "./src/result.js"

[output]
path = "dist"

[[module.rules]]
test = "\\.js$"
exclude = "node_modules"
use = ["downlevel"]

[[module.rules]]
test = "\\.png$"
use = ["asset"]
options = { limit = 5000, name = "[name].[ext]?[hash]", publicPath = "./dist/" }

[devServer]
port = 3000

[devServer.proxy]
"/api" = "http://localhost:3001"

[[devServer.mocks]]
path = "/api/user"
json = [{ id = 1, name = "silverbeen" }]

[profiles.production.optimization]
dropConsole = true
"#;

fn project(config: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("wisp.toml"), config).unwrap();
    dir
}

#[test]
#[serial]
fn loads_toml_with_defaults_filled_in() {
    unsafe { std::env::remove_var("NODE_ENV") };
    let dir = project(TOML);

    let config = ConfigLoader::new(dir.path())
        .load(&ConfigOverrides::default())
        .unwrap();

    assert_eq!(config.mode, Mode::Development);
    assert_eq!(config.context, dir.path());
    assert_eq!(config.entry.len(), 2);
    assert_eq!(config.module.rules[1].stages, vec![StageName::Asset]);
    assert_eq!(config.module.rules[1].options.limit, 5000);
    assert_eq!(config.dev_server.port, 3000);
    assert_eq!(config.dev_server.host, "127.0.0.1");
    assert_eq!(config.dev_server.mocks[0].method, "GET");
    assert_eq!(config.optimization.drop_console, None);
}

#[test]
#[serial]
fn node_env_selects_production_profile() {
    unsafe { std::env::set_var("NODE_ENV", "production") };
    let dir = project(TOML);

    let config = ConfigLoader::new(dir.path())
        .load(&ConfigOverrides::default())
        .unwrap();
    unsafe { std::env::remove_var("NODE_ENV") };

    assert_eq!(config.mode, Mode::Production);
    assert_eq!(config.optimization.drop_console, Some(true));
}

#[test]
#[serial]
fn cli_overrides_win_over_file_and_env() {
    unsafe { std::env::set_var("WISP_PORT", "4100") };
    let dir = project(TOML);

    let overrides = ConfigOverrides::default()
        .with_mode(Some(Mode::Production))
        .with_dev_server(None, Some(4200), Some(false));
    let config = ConfigLoader::new(dir.path()).load(&overrides).unwrap();
    unsafe { std::env::remove_var("WISP_PORT") };

    assert_eq!(config.mode, Mode::Production);
    assert_eq!(config.dev_server.port, 4200);
    assert!(!config.dev_server.hot);
}

#[test]
#[serial]
fn env_port_overrides_file() {
    unsafe { std::env::set_var("WISP_PORT", "4100") };
    let dir = project(TOML);

    let config = ConfigLoader::new(dir.path())
        .load(&ConfigOverrides::default())
        .unwrap();
    unsafe { std::env::remove_var("WISP_PORT") };

    assert_eq!(config.dev_server.port, 4100);
}

#[test]
#[serial]
fn unknown_field_is_a_configuration_error() {
    let dir = project("[entry]\nmain = \"a.js\"\n[devServer]\nprot = 1\n");

    let err = ConfigLoader::new(dir.path())
        .load(&ConfigOverrides::default())
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }));
}

#[test]
#[serial]
fn package_json_field_is_used() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("package.json"),
        r#"{ "name": "app", "wisp": { "entry": { "main": "./index.js" } } }"#,
    )
    .unwrap();

    let config = ConfigLoader::new(dir.path())
        .load(&ConfigOverrides::default())
        .unwrap();
    assert_eq!(config.entry["main"].to_str(), Some("./index.js"));
}

#[test]
#[serial]
fn missing_config_fails_validation() {
    let dir = TempDir::new().unwrap();
    let err = ConfigLoader::new(dir.path())
        .load(&ConfigOverrides::default())
        .unwrap_err();
    assert!(matches!(err, ConfigError::MissingField { .. }));
}
