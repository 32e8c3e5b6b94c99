use std::path::Path;

use assert_cmd::Command;
use court_vision::calib::{CalibrationConfig, CalibrationReport};
use predicates::prelude::*;

fn cli() -> Command {
    Command::cargo_bin("court-vision").expect("binary built")
}

fn write_blank_frames(dir: &Path, n: usize) {
    for i in 0..n {
        image::GrayImage::from_pixel(64, 48, image::Luma([255]))
            .save(dir.join(format!("frame_{i:03}.png")))
            .expect("write frame");
    }
}

#[test]
fn resolve_prints_left_hoop_for_marker_fragment() {
    cli()
        .args(["resolve", "https://example.org/ar-experience.html?marker=left"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"left-hoop\""))
        .stdout(predicate::str::contains("\"fragment\""))
        .stdout(predicate::str::contains("Point B - Left Hoop"));
}

#[test]
fn resolve_accepts_bare_ids() {
    cli()
        .args(["resolve", "entrance"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"bare_id\""));
}

#[test]
fn resolve_fails_for_unknown_payload() {
    cli()
        .args(["resolve", "https://example.org/?marker=center"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no marker matches"));
}

#[test]
fn init_config_writes_loadable_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("cfg.json");
    cli()
        .args(["init-config", "--out"])
        .arg(&path)
        .assert()
        .success();

    let cfg = CalibrationConfig::load_json(&path).expect("load config");
    assert_eq!(cfg, CalibrationConfig::default());
}

#[test]
fn calibrate_without_markers_writes_incomplete_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let frames = dir.path().join("frames");
    std::fs::create_dir(&frames).expect("mkdir");
    write_blank_frames(&frames, 3);
    let out = dir.path().join("report.json");

    cli()
        .args(["--log-level", "warn", "calibrate", "--frames"])
        .arg(&frames)
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote report JSON"));

    let report = CalibrationReport::load_json(&out).expect("report");
    assert!(!report.is_complete());
    assert!(report.transform.is_none());
    assert!(report.markers.is_empty());
    assert_eq!(report.stats.frames_sampled, 3);
    let error = report.error.expect("incomplete error");
    assert!(error.contains("entrance"));
}

#[test]
fn calibrate_strict_fails_when_incomplete() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_blank_frames(dir.path(), 1);
    let out = dir.path().join("report.json");

    cli()
        .args(["calibrate", "--strict", "--frames"])
        .arg(dir.path())
        .arg("--out")
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("calibration incomplete"));
    assert!(out.exists());
}

#[test]
fn calibrate_rejects_missing_frames_dir() {
    let dir = tempfile::tempdir().expect("tempdir");
    cli()
        .args(["calibrate", "--frames"])
        .arg(dir.path().join("nope"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}
