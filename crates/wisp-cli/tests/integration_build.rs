//! End-to-end tests for `wisp build`.
//!
//! Projects are written to temporary directories and built through the
//! `wisp` binary, so exit codes and stderr are checked as users see them.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn wisp(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_wisp"));
    cmd.arg("--no-color")
        .env_remove("NODE_ENV")
        .env_remove("RUST_LOG")
        .env_remove("WISP_MODE")
        .env_remove("WISP_OUT_DIR")
        .env("NO_COLOR", "1")
        .current_dir(dir);
    cmd
}

fn project(config: &str, files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("wisp.json"), config).unwrap();
    for (name, content) in files {
        let path = dir.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    dir
}

#[test]
fn build_writes_the_output_directory() {
    let dir = project(
        r#"{ "entry": { "main": "./src/index.js" }, "html": { "title": "Demo" } }"#,
        &[
            ("src/index.js", "import { greet } from './greet';\ndocument.title = greet('wisp');\n"),
            ("src/greet.js", "export function greet(name) { return 'hello ' + name; }\n"),
        ],
    );

    wisp(dir.path())
        .arg("build")
        .assert()
        .success()
        .stderr(predicate::str::contains("Output written to"));

    let main = fs::read_to_string(dir.path().join("dist/main.js")).unwrap();
    assert!(main.contains("hello"));
    let html = fs::read_to_string(dir.path().join("dist/index.html")).unwrap();
    assert!(html.contains("<title>Demo</title>"));
    assert!(html.contains("main.js"));
    assert!(dir.path().join("dist/manifest.json").is_file());
}

#[test]
fn out_dir_and_cwd_flags() {
    let dir = project(
        r#"{ "entry": { "main": "./index.js" } }"#,
        &[("index.js", "console.log(1);\n")],
    );
    let elsewhere = TempDir::new().unwrap();

    wisp(elsewhere.path())
        .args(["build", "-C"])
        .arg(dir.path())
        .args(["--out-dir", "build"])
        .assert()
        .success();

    assert!(dir.path().join("build/main.js").is_file());
    assert!(!dir.path().join("dist").exists());
}

#[test]
fn production_output_is_not_larger_than_development() {
    let source = "// greeting helper\nexport function greet(name) {\n    console.log('greeting', name);\n    return 'hello ' + name;\n}\ngreet('x');\n";
    let dir = project(r#"{ "entry": { "main": "./index.js" } }"#, &[("index.js", source)]);

    wisp(dir.path()).args(["build", "--mode", "development", "-d", "dev"]).assert().success();
    wisp(dir.path()).args(["build", "--mode", "production", "-d", "prod"]).assert().success();

    let size = |sub: &str| fs::metadata(dir.path().join(sub).join("main.js")).unwrap().len();
    assert!(size("prod") <= size("dev"));
}

#[test]
fn unresolved_import_fails_the_build() {
    let dir = project(
        r#"{ "entry": { "main": "./index.js" } }"#,
        &[("index.js", "import './does-not-exist';\n")],
    );

    wisp(dir.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist"));

    assert!(!dir.path().join("dist/main.js").exists());
}

#[test]
fn invalid_configuration_exits_before_building() {
    let dir = project(
        r#"{ "entry": { "main": "./index.js" }, "devServer": { "proxy": { "api": "localhost:3001" } } }"#,
        &[("index.js", "console.log(1);\n")],
    );

    wisp(dir.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("proxy"));

    assert!(!dir.path().join("dist").exists());
}

#[test]
fn missing_entries_are_a_configuration_error() {
    let dir = project(r#"{ "entry": {} }"#, &[]);
    wisp(dir.path()).arg("build").assert().failure();
}

#[test]
fn unknown_mode_is_rejected_by_the_parser() {
    let dir = project(r#"{ "entry": { "main": "./index.js" } }"#, &[]);
    wisp(dir.path())
        .args(["build", "--mode", "staging"])
        .assert()
        .code(2);
}
