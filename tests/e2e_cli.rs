//! CLI end-to-end tests
//!
//! None of these need ffmpeg: they cover argument parsing, configuration
//! and sequencing.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the slidereel binary
#[allow(deprecated)]
fn slidereel_cmd() -> Command {
    let mut cmd = Command::cargo_bin("slidereel").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_no_args_shows_help() {
    slidereel_cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_command() {
    slidereel_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("slidereel "));
}

#[test]
fn test_cli_render_help() {
    slidereel_cmd()
        .args(["render", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--job-id"))
        .stdout(predicate::str::contains("--file-id"));
}

#[test]
fn test_cli_validate_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("slidereel.toml");
    fs::write(
        &path,
        r#"
[profile.video]
width = 1280
height = 720
frame_rate = 25

[notify]
webhook_url = "https://hooks.example.com/video"
"#,
    )
    .unwrap();

    slidereel_cmd()
        .arg("validate")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("1280x720 @ 25 fps, libx264 yuv420p"))
        .stdout(predicate::str::contains("Audio: aac"))
        .stdout(predicate::str::contains("https://hooks.example.com/video"));
}

#[test]
fn test_cli_validate_rejects_zero_frame_rate() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[profile.video]\nframe_rate = 0\n").unwrap();

    slidereel_cmd()
        .arg("validate")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("frame_rate"));
}

#[test]
fn test_cli_validate_rejects_malformed_toml() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[profile.video\nwidth = ").unwrap();

    slidereel_cmd()
        .arg("validate")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config file"));
}

#[test]
fn test_cli_plan_orders_by_slide_index() {
    let dir = tempdir().unwrap();
    let visuals = dir.path().join("slides");
    let audio = dir.path().join("tts");
    fs::create_dir_all(&visuals).unwrap();
    fs::create_dir_all(&audio).unwrap();
    for name in ["slide_10.png", "slide_2.png", "slide_1.png", "slide_3.png"] {
        fs::write(visuals.join(name), b"png").unwrap();
    }
    for name in ["slide_1.mp3", "slide_2.mp3", "slide_10.mp3"] {
        fs::write(audio.join(name), b"mp3").unwrap();
    }

    let output = slidereel_cmd()
        .current_dir(dir.path())
        .args(["plan", "--json", "--visual-dir"])
        .arg(&visuals)
        .arg("--audio-dir")
        .arg(&audio)
        .output()
        .unwrap();
    assert!(output.status.success());

    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let indices: Vec<u64> = plan["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["index"].as_u64().unwrap())
        .collect();
    assert_eq!(indices, vec![1, 2, 10]);
    assert_eq!(plan["skipped"][0]["index"], 3);
    assert_eq!(plan["skipped"][0]["reason"], "static_image_without_audio");
}

#[test]
fn test_cli_plan_without_narration_fails() {
    let dir = tempdir().unwrap();
    let visuals = dir.path().join("slides");
    fs::create_dir_all(&visuals).unwrap();
    fs::write(visuals.join("slide_1.png"), b"png").unwrap();

    slidereel_cmd()
        .current_dir(dir.path())
        .args(["plan", "--visual-dir"])
        .arg(&visuals)
        .arg("--audio-dir")
        .arg(dir.path().join("missing"))
        .assert()
        .failure();
}

#[test]
fn test_cli_render_rejects_unsafe_job_id() {
    let dir = tempdir().unwrap();
    slidereel_cmd()
        .current_dir(dir.path())
        .args(["render", "--job-id", "../escape", "--file-id", "f-1"])
        .assert()
        .failure();
}
