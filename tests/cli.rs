use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn harvest() -> Command {
    let mut cmd = Command::cargo_bin("harvest").unwrap();
    cmd.env_remove("HARVEST_CONFIG").env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &Path) -> std::path::PathBuf {
    let config = format!(
        "pipeline:\n  output_dir: {out}\n  pacing_ms: 0\n  pacing_jitter_ms: [0, 0]\n\
         reports:\n  summary_json: {json}\n  summary_txt: {txt}\n  failures_csv: {csv}\n",
        out = dir.join("t").display(),
        json = dir.join("summary.json").display(),
        txt = dir.join("summary.txt").display(),
        csv = dir.join("failures.csv").display(),
    );
    let path = dir.join("harvest.yaml");
    std::fs::write(&path, config).unwrap();
    path
}

#[test]
fn help_lists_subcommands() {
    harvest()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("check"));
}

#[test]
fn run_without_list_fails() {
    harvest().arg("run").assert().failure();
}

#[test]
fn run_reports_unparseable_lines() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    let list = dir.path().join("videos.txt");
    std::fs::write(&list, "# comment\nno link on this line\n\nBroken, \"quoted\" | https://example.com/clip\n").unwrap();

    harvest()
        .arg("run")
        .arg(&list)
        .arg("--config")
        .arg(&config)
        .arg("--quiet")
        .assert()
        .success()
        .stdout(predicate::str::contains("Failed: 2"));

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("summary.json")).unwrap()).unwrap();
    assert_eq!(summary["total_in_list"], 2);
    assert_eq!(summary["attempted"], 2);
    assert_eq!(summary["transcribed_ok"], 0);
    assert_eq!(summary["failed"], 2);
    assert_eq!(summary["failure_breakdown"]["parse_error"], 2);

    let csv = std::fs::read_to_string(dir.path().join("failures.csv")).unwrap();
    assert!(csv.starts_with("video_id,title,url,reason"));
    assert!(csv.contains("\"Broken, \"\"quoted\"\"\""));

    let text = std::fs::read_to_string(dir.path().join("summary.txt")).unwrap();
    assert!(text.contains("parse_error: 2"));
    assert!(dir.path().join("t").is_dir());
}

#[test]
fn limit_caps_the_batch() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    let list = dir.path().join("videos.txt");
    std::fs::write(&list, "one\ntwo\nthree\n").unwrap();

    harvest()
        .args(["run", "--quiet", "--limit", "1", "--config"])
        .arg(&config)
        .arg(&list)
        .assert()
        .success();

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("summary.json")).unwrap()).unwrap();
    assert_eq!(summary["total_in_list"], 3);
    assert_eq!(summary["attempted"], 1);
}

#[cfg(not(feature = "whisper"))]
#[test]
fn audio_requires_speech_backend() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    let list = dir.path().join("videos.txt");
    std::fs::write(&list, "one\n").unwrap();

    harvest()
        .args(["run", "--quiet", "--audio", "--config"])
        .arg(&config)
        .arg(&list)
        .assert()
        .failure()
        .stderr(predicate::str::contains("speech-to-text"));
}

#[test]
fn config_show_prints_settings() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    harvest()
        .args(["config", "--show", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Audio Fallback: disabled"));
}

#[test]
fn invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.yaml");
    std::fs::write(&path, "audio:\n  beam_size: 0\n").unwrap();

    harvest()
        .args(["config", "--show", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("beam_size"));
}
