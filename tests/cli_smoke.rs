use std::path::PathBuf;

use anyhow::Result;
use assert_cmd::Command;
use serde_json::{Value, json};
use tempfile::TempDir;

struct CliTest {
    _tmp: TempDir,
    config_dir: PathBuf,
    data_dir: PathBuf,
    log_dir: PathBuf,
}

impl CliTest {
    fn new() -> Result<Self> {
        let tmp = TempDir::new()?;
        let config_dir = tmp.path().join("config");
        let data_dir = tmp.path().join("data");
        let log_dir = tmp.path().join("logs");
        Ok(Self {
            _tmp: tmp,
            config_dir,
            data_dir,
            log_dir,
        })
    }

    fn command(&self) -> Result<Command> {
        let mut cmd = Command::cargo_bin("adpulse")?;
        cmd.env("ADPULSE_CONFIG_DIR", &self.config_dir)
            .env("ADPULSE_DATA_DIR", &self.data_dir)
            .env("ADPULSE_LOG_DIR", &self.log_dir);
        Ok(cmd)
    }
}

fn descriptor_json() -> String {
    json!({
        "creative_instance_id": "creative-1",
        "creative_set_id": "set-1",
        "value": 0.05
    })
    .to_string()
}

#[test]
fn fire_viewed_then_list_events() -> Result<()> {
    let cli = CliTest::new()?;

    cli.command()?
        .args([
            "fire",
            "--placement-id",
            "placement-1",
            "--event-type",
            "viewed",
            "--descriptor-json",
            &descriptor_json(),
        ])
        .assert()
        .success();

    let output = cli
        .command()?
        .args(["events", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let events: Value = serde_json::from_slice(&output)?;
    let events = events.as_array().expect("events array");
    assert_eq!(events.len(), 2, "viewed implies a preceding served");
    assert_eq!(events[0]["event_type"], "served");
    assert_eq!(events[1]["event_type"], "viewed");
    Ok(())
}

#[test]
fn second_viewed_fire_fails() -> Result<()> {
    let cli = CliTest::new()?;
    let fire = [
        "fire",
        "--placement-id",
        "placement-1",
        "--event-type",
        "viewed",
        "--descriptor-json",
    ];

    cli.command()?
        .args(fire)
        .arg(descriptor_json())
        .assert()
        .success();

    let output = cli
        .command()?
        .args(fire)
        .arg(descriptor_json())
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8_lossy(&output);
    assert!(stderr.contains("not permitted"), "stderr: {stderr}");
    Ok(())
}

#[test]
fn fire_requires_a_descriptor() -> Result<()> {
    let cli = CliTest::new()?;
    cli.command()?
        .args(["fire", "--placement-id", "placement-1"])
        .assert()
        .failure();
    Ok(())
}

#[test]
fn covariates_snapshot_is_complete() -> Result<()> {
    let cli = CliTest::new()?;

    cli.command()?
        .args(["activity", "record", "opened_new_tab"])
        .assert()
        .success();

    let output = cli
        .command()?
        .args(["covariates"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let covariates: Value = serde_json::from_slice(&output)?;
    let covariates = covariates.as_array().expect("covariate array");
    assert_eq!(covariates.len(), 22);
    let opened = covariates
        .iter()
        .find(|covariate| covariate["kind"] == "number_of_opened_new_tab_events")
        .expect("count covariate present");
    assert_eq!(opened["value"], "1");
    Ok(())
}

#[test]
fn status_reports_store_counts() -> Result<()> {
    let cli = CliTest::new()?;

    cli.command()?
        .args([
            "fire",
            "--placement-id",
            "placement-1",
            "--event-type",
            "viewed",
            "--descriptor-json",
            &descriptor_json(),
        ])
        .assert()
        .success();

    let output = cli
        .command()?
        .arg("status")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8_lossy(&output);
    assert!(stdout.contains("events:       2"), "stdout: {stdout}");
    assert!(stdout.contains("deposits:     1"), "stdout: {stdout}");
    Ok(())
}
