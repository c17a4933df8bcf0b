//! Integration tests for `amlrun submit` against a mocked Azure ML endpoint.

use assert_cmd::Command;
use mockito::{Matcher, Server};
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const WS_PATH: &str =
    "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.MachineLearningServices/workspaces/ws";
const ARTIFACTS_PATH: &str =
    "/artifact/v2.0/subscriptions/sub/resourceGroups/rg/workspaces/ws/artifacts/origins/ExperimentRun/containers/dcid.run-e2e";

fn amlrun(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("amlrun").unwrap();
    cmd.current_dir(temp_dir.path())
        .env("HOME", temp_dir.path())
        .env_remove("AZURE_STORAGE_ACCOUNT_KEY");
    for (key, _) in std::env::vars() {
        if key.starts_with("AMLRUN_") {
            cmd.env_remove(key);
        }
    }
    cmd
}

fn write_workspace_config(temp_dir: &TempDir) -> std::path::PathBuf {
    let path = temp_dir.path().join("config.json");
    fs::write(&path, r#"{"subscription_id": "sub", "resource_group": "rg", "workspace_name": "ws"}"#).unwrap();
    path
}

fn write_training_source(temp_dir: &TempDir) {
    fs::write(temp_dir.path().join("main.py"), "print('train')\n").unwrap();
    fs::write(temp_dir.path().join(".amlignore"), "config.json\n").unwrap();
}

fn json_mock(server: &mut Server, method: &str, path: Matcher, body: &str) -> mockito::Mock {
    server
        .mock(method, path)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create()
}

#[test]
fn test_submit_requires_access_token() {
    let temp_dir = TempDir::new().unwrap();
    amlrun(&temp_dir)
        .env_remove("AZURE_ACCESS_TOKEN")
        .arg("submit")
        .assert()
        .failure()
        .stderr(predicate::str::contains("AZURE_ACCESS_TOKEN"));
}

#[test]
fn test_submit_fails_on_missing_workspace_config() {
    let temp_dir = TempDir::new().unwrap();
    amlrun(&temp_dir)
        .env("AZURE_ACCESS_TOKEN", "token")
        .args(["submit", "--config-path", "does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no workspace config found"));
}

#[test]
fn test_submit_registers_model_without_downloading() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_workspace_config(&temp_dir);
    write_training_source(&temp_dir);
    let mut server = Server::new();

    let _ws = json_mock(&mut server, "GET", WS_PATH.into(), r#"{"location": "westeurope", "properties": {}}"#);
    let _compute = json_mock(
        &mut server,
        "GET",
        format!("{WS_PATH}/computes/wsi-compute").as_str().into(),
        r#"{"id": "computes/wsi-compute", "name": "wsi-compute", "properties": {"provisioningState": "Succeeded"}}"#,
    );
    let create_compute = server
        .mock("PUT", format!("{WS_PATH}/computes/wsi-compute").as_str())
        .match_query(Matcher::Any)
        .expect(0)
        .create();
    let _env = json_mock(
        &mut server,
        "GET",
        format!("{WS_PATH}/environments/taming/versions").as_str().into(),
        r#"{"value": [{"id": "environments/taming/versions/2", "name": "2"}]}"#,
    );
    let code_version = format!("^{WS_PATH}/codes/amlrun-[0-9a-f]{{32}}/versions/1$");
    let _code_lookup = server
        .mock("GET", Matcher::Regex(code_version.clone()))
        .match_query(Matcher::Any)
        .with_status(404)
        .create();
    let server_url = server.url();
    let _start_upload = json_mock(
        &mut server,
        "POST",
        Matcher::Regex("startPendingUpload$".to_string()),
        &format!(
            r#"{{"blobReferenceForConsumption": {{"blobUri": "{0}/snapshots/e2e", "credential": {{"sasUri": "{0}/snapshots/e2e?sig=s"}}}}}}"#,
            server_url
        ),
    );
    let upload_script = server
        .mock("PUT", "/snapshots/e2e/main.py")
        .match_query(Matcher::Any)
        .with_status(201)
        .expect(1)
        .create();
    let upload_config = server
        .mock("PUT", "/snapshots/e2e/config.json")
        .match_query(Matcher::Any)
        .with_status(201)
        .expect(0)
        .create();
    let upload_ignore = server
        .mock("PUT", "/snapshots/e2e/.amlignore")
        .match_query(Matcher::Any)
        .with_status(201)
        .expect(1)
        .create();
    let _code_register = json_mock(
        &mut server,
        "PUT",
        Matcher::Regex(code_version),
        r#"{"id": "codes/amlrun-e2e/versions/1", "name": "1"}"#,
    );
    let submit = server
        .mock("PUT", Matcher::Regex(format!("^{WS_PATH}/jobs/[0-9a-f-]+$")))
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJsonString(
            r#"{"properties": {"codeId": "codes/amlrun-e2e/versions/1"}}"#.to_string(),
        ))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"name": "run-e2e", "properties": {"status": "NotStarted"}}"#)
        .create();
    let _status = json_mock(
        &mut server,
        "GET",
        format!("{WS_PATH}/jobs/run-e2e").as_str().into(),
        r#"{"name": "run-e2e", "properties": {"status": "Completed"}}"#,
    );
    let _artifacts = json_mock(
        &mut server,
        "GET",
        ARTIFACTS_PATH.into(),
        r#"{"value": [{"path": "outputs/models/runA/model.h5"}, {"path": "outputs/other/log.txt"}]}"#,
    );
    let content_info = server
        .mock("GET", Matcher::Regex("contentinfo".to_string()))
        .match_query(Matcher::Any)
        .expect(0)
        .create();
    let _versions = server
        .mock("GET", format!("{WS_PATH}/models/runA/versions").as_str())
        .match_query(Matcher::Any)
        .with_status(404)
        .create();
    let register = server
        .mock("PUT", format!("{WS_PATH}/models/runA/versions/1").as_str())
        .match_query(Matcher::Any)
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "models/runA/versions/1", "name": "1"}"#)
        .expect(1)
        .create();

    let output = amlrun(&temp_dir)
        .env("AZURE_ACCESS_TOKEN", "token")
        .env("AMLRUN_ARM_ENDPOINT", server.url())
        .env("AMLRUN_DATA_ENDPOINT", server.url())
        .arg("submit")
        .arg("--config-path")
        .arg(&config)
        .args(["--register-model", "--download-path", "", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["run_id"], "run-e2e");
    assert_eq!(report["models"].as_array().unwrap().len(), 1);
    assert_eq!(report["models"][0]["name"], "runA");
    assert!(report["downloads"].as_array().unwrap().is_empty());

    register.assert();
    content_info.assert();
    create_compute.assert();
    upload_script.assert();
    upload_config.assert();
    upload_ignore.assert();
    submit.assert();
}

#[test]
fn test_submit_requires_entry_script_in_source_dir() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_workspace_config(&temp_dir);
    let mut server = Server::new();

    let _ws = json_mock(&mut server, "GET", WS_PATH.into(), r#"{"location": "westeurope", "properties": {}}"#);
    let _compute = json_mock(
        &mut server,
        "GET",
        format!("{WS_PATH}/computes/wsi-compute").as_str().into(),
        r#"{"id": "computes/wsi-compute", "name": "wsi-compute", "properties": {"provisioningState": "Succeeded"}}"#,
    );
    let _env = json_mock(
        &mut server,
        "GET",
        format!("{WS_PATH}/environments/taming/versions").as_str().into(),
        r#"{"value": [{"id": "environments/taming/versions/2", "name": "2"}]}"#,
    );
    let submit = server
        .mock("PUT", Matcher::Regex("/jobs/".to_string()))
        .match_query(Matcher::Any)
        .expect(0)
        .create();

    amlrun(&temp_dir)
        .env("AZURE_ACCESS_TOKEN", "token")
        .env("AMLRUN_ARM_ENDPOINT", server.url())
        .env("AMLRUN_DATA_ENDPOINT", server.url())
        .arg("submit")
        .arg("--config-path")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("entry script main.py not found"));
    submit.assert();
}

#[test]
fn test_submit_reports_failed_run() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_workspace_config(&temp_dir);
    let mut server = Server::new();

    let _ws = json_mock(&mut server, "GET", WS_PATH.into(), r#"{"location": "westeurope", "properties": {}}"#);
    let _compute = json_mock(
        &mut server,
        "GET",
        format!("{WS_PATH}/computes/wsi-compute").as_str().into(),
        r#"{"id": "computes/wsi-compute", "name": "wsi-compute", "properties": {"provisioningState": "Succeeded"}}"#,
    );
    let _env = json_mock(
        &mut server,
        "GET",
        format!("{WS_PATH}/environments/taming/versions").as_str().into(),
        r#"{"value": [{"id": "environments/taming/versions/2", "name": "2"}]}"#,
    );
    let _submit = json_mock(
        &mut server,
        "PUT",
        Matcher::Regex(format!("^{WS_PATH}/jobs/[0-9a-f-]+$")),
        r#"{"name": "run-bad", "properties": {"status": "NotStarted"}}"#,
    );
    let _status = json_mock(
        &mut server,
        "GET",
        format!("{WS_PATH}/jobs/run-bad").as_str().into(),
        r#"{"name": "run-bad", "properties": {"status": "Failed"}}"#,
    );

    amlrun(&temp_dir)
        .env("AZURE_ACCESS_TOKEN", "token")
        .env("AMLRUN_ARM_ENDPOINT", server.url())
        .env("AMLRUN_DATA_ENDPOINT", server.url())
        .arg("submit")
        .arg("--config-path")
        .arg(&config)
        .args(["--code-asset-id", "codes/vqgan/versions/3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("run run-bad finished with status Failed"));
}
