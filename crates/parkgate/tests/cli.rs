#![cfg(feature = "cli")]

use assert_cmd::Command;
use image::{Rgb, RgbImage};
use parkgate::ParkgateConfig;
use predicates::prelude::*;

fn parkgate() -> Command {
    Command::cargo_bin("parkgate").expect("binary built")
}

#[test]
fn init_config_writes_loadable_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("parkgate.toml");

    parkgate()
        .args(["init-config", "--out"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote default configuration"));

    let cfg = ParkgateConfig::load(&out).expect("load written config");
    assert_eq!(cfg, ParkgateConfig::default());

    parkgate()
        .args(["init-config", "--out"])
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    parkgate()
        .args(["init-config", "--force", "--out"])
        .arg(&out)
        .assert()
        .success();
}

#[test]
fn detect_on_blank_frame_finds_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let image = dir.path().join("blank.png");
    let annotated = dir.path().join("annotated.png");
    RgbImage::from_pixel(64, 48, Rgb([90, 90, 90]))
        .save(&image)
        .expect("write image");

    parkgate()
        .args(["--log-level", "off", "detect", "--image"])
        .arg(&image)
        .arg("--annotate")
        .arg(&annotated)
        .assert()
        .success()
        .stdout(predicate::str::contains("no plate found"));
    assert!(annotated.exists());

    let output = parkgate()
        .args(["detect", "--json", "--image"])
        .arg(&image)
        .output()
        .expect("run detect");
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json report");
    assert_eq!(report["plates"], serde_json::json!([]));
    assert_eq!(report["diagnostics"]["contours"], 0);
}

#[test]
fn bad_inputs_fail_cleanly() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("bad.toml");
    std::fs::write(&config, "[logging]\nlevel = \"loud\"\n").expect("write config");

    parkgate()
        .args(["serve", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("loud"));

    parkgate()
        .args(["detect", "--image"])
        .arg(dir.path().join("missing.png"))
        .assert()
        .failure();
}
