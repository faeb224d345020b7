use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tictac_vision::{RunReport, TrackerConfig};

fn cli() -> Command {
    let mut cmd = Command::cargo_bin("tictac-vision").expect("binary built");
    cmd.args(["--log-level", "warn"]);
    cmd
}

fn render_frame(out: &Path, cells: &[&str]) {
    let mut cmd = cli();
    cmd.arg("render-frame").arg("--out").arg(out);
    for cell in cells {
        cmd.args(["--cell", cell]);
    }
    cmd.assert().success();
}

#[test]
fn default_config_round_trips_through_the_library() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.json");
    cli()
        .arg("default-config")
        .arg("--out")
        .arg(&path)
        .assert()
        .success();
    assert_eq!(
        TrackerConfig::load_json(&path).expect("load"),
        TrackerConfig::default()
    );
}

#[test]
fn calibrate_prints_nine_regions() {
    let dir = tempfile::tempdir().expect("tempdir");
    let frame = dir.path().join("frame.png");
    render_frame(&frame, &[]);

    let output = cli()
        .arg("calibrate")
        .arg("--frame")
        .arg(&frame)
        .output()
        .expect("run");
    assert!(output.status.success());
    let regions: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    let regions = regions.as_array().expect("array");
    assert_eq!(regions.len(), 9);
    assert!(regions[4]["area"].as_f64().expect("area") > 0.0);
}

#[test]
fn calibrate_fails_without_a_board() {
    let dir = tempfile::tempdir().expect("tempdir");
    let frame = dir.path().join("blank.png");
    image::RgbImage::from_pixel(64, 48, image::Rgb([230, 230, 230]))
        .save(&frame)
        .expect("save");

    cli()
        .arg("calibrate")
        .arg("--frame")
        .arg(&frame)
        .assert()
        .failure()
        .stderr(predicate::str::contains("boundary"));
}

#[test]
fn render_board_writes_a_portrait_page() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("board.png");
    cli()
        .args(["render-board", "--dpi", "50", "--out"])
        .arg(&out)
        .assert()
        .success();
    let img = image::open(&out).expect("decode").to_rgb8();
    assert!(img.height() > img.width());
}

#[test]
fn malformed_cell_argument_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    cli()
        .arg("render-frame")
        .arg("--out")
        .arg(dir.path().join("f.png"))
        .args(["--cell", "9=a"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
}

#[test]
fn run_tracks_a_short_game_and_drives_the_actuator() {
    let dir = tempfile::tempdir().expect("tempdir");
    let frames = dir.path().join("frames");
    std::fs::create_dir(&frames).expect("mkdir");
    render_frame(&frames.join("000.png"), &[]);
    render_frame(&frames.join("001.png"), &["4=a"]);
    render_frame(&frames.join("002.png"), &["4=a", "0=b"]);
    render_frame(&frames.join("003.png"), &["4=a", "0=b"]);

    let actuator = dir.path().join("actuator.bin");
    std::fs::write(&actuator, b"").expect("device stand-in");
    let report_path = dir.path().join("report.json");
    cli()
        .arg("run")
        .arg("--frames")
        .arg(&frames)
        .arg("--actuator")
        .arg(&actuator)
        .arg("--report")
        .arg(&report_path)
        .assert()
        .success();

    assert_eq!(std::fs::read(&actuator).expect("actuator bytes"), vec![1, 5]);
    let report = RunReport::load_json(&report_path).expect("report");
    assert_eq!(report.calibration.as_ref().map(|c| c.attempts), Some(1));
    assert_eq!(report.ticks.len(), 3);
    assert_eq!(report.commands_sent, vec![vec![1, 5]]);
    assert_eq!(report.violations(), 0);
    let board = report.final_board.expect("board");
    assert_eq!(board.render(), "B..\n.A.\n...");
    assert_eq!(board.frame, 3);
}

#[test]
fn run_without_the_actuator_device_keeps_tracking() {
    let dir = tempfile::tempdir().expect("tempdir");
    let frames = dir.path().join("frames");
    std::fs::create_dir(&frames).expect("mkdir");
    render_frame(&frames.join("000.png"), &[]);
    render_frame(&frames.join("001.png"), &["4=a"]);

    let missing = dir.path().join("no-such-dir").join("ttyUSB0");
    let report_path = dir.path().join("report.json");
    cli()
        .arg("run")
        .arg("--frames")
        .arg(&frames)
        .arg("--actuator")
        .arg(&missing)
        .arg("--report")
        .arg(&report_path)
        .assert()
        .success()
        .stderr(predicate::str::contains("unavailable"));

    assert!(!missing.exists());
    let report = RunReport::load_json(&report_path).expect("report");
    assert!(report.commands_sent.is_empty());
    assert_eq!(report.ticks.len(), 1);
    assert_eq!(report.turn_record, Some(tictac_vision::MarkerKind::A));
    assert_eq!(report.ticks[0].sent, None);
}

#[test]
fn unknown_log_level_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    Command::cargo_bin("tictac-vision")
        .expect("binary built")
        .args(["--log-level", "loud", "default-config", "--out"])
        .arg(dir.path().join("c.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown log level 'loud'"));
}

#[test]
fn run_on_an_empty_directory_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    cli()
        .arg("run")
        .arg("--frames")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("exhausted"));
}
