use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

const CONFIG: &str = r#"
providers:
  default_language: en
  enable_alternative: true
llm:
  base_url: http://127.0.0.1:9/v1
  model: test-model
  api_key: sk-test-abcd9876
cache:
  ttl_secs: 600
  sweep_interval_secs: 30
"#;

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, content).unwrap();
    path
}

fn transcriptor(config: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("transcriptor").unwrap();
    cmd.arg("--config")
        .arg(config)
        .arg("--quiet")
        .env_remove("GEMINI_API_KEY")
        .env_remove("TRANSCRIPTOR_LLM_API_KEY")
        .env_remove("CACHE_TTL")
        .env_remove("APP_ENV")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn health_reports_ok() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, CONFIG);

    transcriptor(&config)
        .arg("health")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"{"status":"ok"}"#));
}

#[test]
fn config_show_masks_api_key() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, CONFIG);

    transcriptor(&config)
        .args(["config", "--show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("LLM Model: test-model"))
        .stdout(predicate::str::contains("Cache TTL: 600s"))
        .stdout(predicate::str::contains("****9876"))
        .stdout(predicate::str::contains("sk-test-abcd9876").not());
}

#[test]
fn env_overrides_cache_ttl() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, CONFIG);

    transcriptor(&config)
        .env("CACHE_TTL", "42")
        .args(["config", "--show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cache TTL: 42s"));
}

#[test]
fn oversized_cache_ttl_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, CONFIG);

    transcriptor(&config)
        .env("CACHE_TTL", "18446744073709551615")
        .args(["config", "--show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cache.ttl_secs must be at most"));
}

#[test]
fn api_rejects_invalid_url() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, CONFIG);

    transcriptor(&config)
        .args([
            "api",
            "POST",
            "/api/transcript",
            r#"{"url": "https://example.com/not-a-video"}"#,
        ])
        .assert()
        .failure()
        .stdout(predicate::str::starts_with("400"))
        .stdout(predicate::str::contains("Could not extract a video id"));
}

#[test]
fn api_unknown_route_is_404() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, CONFIG);

    transcriptor(&config)
        .args(["api", "GET", "/api/unknown"])
        .assert()
        .failure()
        .stdout(predicate::str::starts_with("404"));
}

#[test]
fn providers_lists_fallback_order() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, CONFIG);

    transcriptor(&config)
        .arg("providers")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"(?s)1\. .*timedtext.*2\. .*watch-page").unwrap());

    let single = write_config(
        &dir,
        "providers:\n  enable_alternative: false\nllm:\n  base_url: http://127.0.0.1:9/v1\n",
    );
    transcriptor(&single)
        .arg("providers")
        .assert()
        .success()
        .stdout(predicate::str::contains("watch-page").not());
}

#[test]
fn blog_rejects_short_transcript() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, CONFIG);

    transcriptor(&config)
        .args(["blog", "--video-id", "dQw4w9WgXcQ", "--text", "too short"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("too short to compose an article"));
}

#[test]
fn missing_config_file_fails() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.yaml");

    transcriptor(&missing)
        .arg("health")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn invalid_youtube_url_is_rejected_by_process() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, CONFIG);

    transcriptor(&config)
        .args(["process", "not a url"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not extract a video id"));
}
