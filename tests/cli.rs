//! Binary smoke tests.

use assert_cmd::Command;
use std::io::Write;

fn wsync() -> Command {
    let mut cmd = Command::cargo_bin("wsync").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("WSYNC_CONFIG")
        .env_remove("WSYNC_DB")
        .env_remove("STACKADAPT_API_KEY")
        .env_remove("GOOGLE_ACCESS_TOKEN");
    cmd
}

fn config_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn status_reports_uncreated_warehouse() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("warehouse.db");
    let config = config_file(&format!(
        r#"{{"warehouse": {{"path": "{}"}}, "search_console": {{"table": "gsc.daily"}}}}"#,
        db.display()
    ));

    let output = wsync()
        .args(["status", "--json", "--config"])
        .arg(config.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["initialized"], false);
    assert_eq!(json["pipelines"][0]["pipeline"], "stackadapt");
    assert_eq!(json["pipelines"][1]["table"], "gsc.daily");
    assert!(json["pipelines"][1]["watermark"].is_null());
    // Status never creates the database.
    assert!(!db.exists());
}

#[test]
fn missing_config_file_exits_with_config_code() {
    let output = wsync()
        .args(["status", "--config", "/definitely/not/here.json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(7));

    let err: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(err["error"]["code"], "CONFIG_ERROR");
}

#[test]
fn missing_credentials_fail_before_touching_warehouse() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("warehouse.db");
    let config = config_file(&format!(r#"{{"warehouse": {{"path": "{}"}}}}"#, db.display()));

    let output = wsync()
        .arg("stackadapt")
        .arg("--config")
        .arg(config.path())
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(7));
    assert!(String::from_utf8_lossy(&output.stderr).contains("STACKADAPT_API_KEY"));
    assert!(!db.exists());
}

#[test]
fn version_prints_package_version() {
    let output = wsync().args(["version", "--json"]).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}
