#![cfg(all(unix, feature = "cli"))]

use std::io::{BufRead, BufReader};
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Command, Stdio};

const SAMPLE: &[u8] = &[
    0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0x00, 0x1F, // SPS
    0x00, 0x00, 0x01, 0x68, 0xCE, 0x3C, 0x80, // PPS
    0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x84, // IDR slice, unterminated
];

fn unique_temp_file(tag: &str, contents: &[u8]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "portal-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    let path = dir.join("sample.h264");
    std::fs::write(&path, contents).expect("sample should be writable");
    path
}

fn portal() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_portal"));
    command.arg("--log-level").arg("error").env_remove("RUST_LOG");
    command
}

fn json_lines(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("stdout line should be JSON"))
        .collect()
}

#[test]
fn version_prints_package_version() {
    let output = portal().arg("version").output().expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("portal {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn inspect_prints_terminated_units() {
    let path = unique_temp_file("inspect", SAMPLE);

    let output = portal()
        .args(["--format", "json", "inspect"])
        .arg(&path)
        .output()
        .expect("inspect should run");

    assert!(output.status.success());
    let units = json_lines(&output.stdout);
    assert_eq!(units.len(), 2);
    assert_eq!(units[0]["kind"], 101);
    assert_eq!(units[0]["kind_name"], "VIDEO");
    assert_eq!(units[0]["size"], 8);
    assert_eq!(units[0]["head"], "67 42 00 1f");
    assert_eq!(units[1]["index"], 1);
    assert_eq!(units[1]["size"], 8);

    let _ = std::fs::remove_dir_all(path.parent().expect("sample has a parent"));
}

#[test]
fn inspect_flush_emits_final_unit() {
    let path = unique_temp_file("flush", SAMPLE);

    let output = portal()
        .args(["--format", "json", "inspect", "--flush", "--chunk-size", "3"])
        .arg(&path)
        .output()
        .expect("inspect should run");

    assert!(output.status.success());
    let units = json_lines(&output.stdout);
    assert_eq!(units.len(), 3);
    assert_eq!(units[2]["head"], "65 88 84");

    let _ = std::fs::remove_dir_all(path.parent().expect("sample has a parent"));
}

#[test]
fn inspect_summary_counts_trailing_bytes() {
    let path = unique_temp_file("summary", SAMPLE);

    let output = portal()
        .args(["--format", "json", "inspect", "--summary"])
        .arg(&path)
        .output()
        .expect("inspect should run");

    assert!(output.status.success());
    let lines = json_lines(&output.stdout);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["units"], 2);
    assert_eq!(lines[0]["unit_bytes"], 8);
    assert_eq!(lines[0]["trailing_bytes"], 7);

    let _ = std::fs::remove_dir_all(path.parent().expect("sample has a parent"));
}

#[test]
fn inspect_raw_normalizes_start_codes() {
    let path = unique_temp_file("raw", SAMPLE);

    let output = portal()
        .args(["--format", "raw", "inspect"])
        .arg(&path)
        .output()
        .expect("inspect should run");

    assert!(output.status.success());
    assert_eq!(
        output.stdout,
        vec![0, 0, 0, 1, 0x67, 0x42, 0x00, 0x1F, 0, 0, 0, 1, 0x68, 0xCE, 0x3C, 0x80]
    );

    let _ = std::fs::remove_dir_all(path.parent().expect("sample has a parent"));
}

#[test]
fn inspect_missing_file_returns_66() {
    let output = portal()
        .args(["inspect", "/nonexistent/portal/sample.h264"])
        .output()
        .expect("inspect should run");

    assert_eq!(output.status.code(), Some(66));
}

#[test]
fn watch_rejects_malformed_host_with_usage_code() {
    let output = portal()
        .args(["watch", "--host", "999.1.1.1", "--port", "2019"])
        .output()
        .expect("watch should run");

    assert_eq!(output.status.code(), Some(64));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid device address"));
}

#[test]
fn watch_unreachable_device_returns_124() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
        listener.local_addr().expect("local addr").port()
    };

    let output = portal()
        .args(["watch", "--host", "127.0.0.1", "--deadline", "150ms", "--port"])
        .arg(port.to_string())
        .output()
        .expect("watch should run");

    assert_eq!(output.status.code(), Some(124));
}

#[test]
fn watch_reads_units_from_replay() {
    let mut sample = SAMPLE.to_vec();
    sample.extend_from_slice(&[0x00, 0x00, 0x01, 0x41, 0x9A]);
    let path = unique_temp_file("replay", &sample);

    let mut replay = portal()
        .args(["--format", "json", "replay", "--chunk-size", "5", "--linger"])
        .arg(&path)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("replay should start");

    let mut replay_out = BufReader::new(replay.stdout.take().expect("replay stdout"));
    let mut first = String::new();
    replay_out
        .read_line(&mut first)
        .expect("replay should announce its address");
    let announced: serde_json::Value =
        serde_json::from_str(first.trim()).expect("announcement should be JSON");
    assert_eq!(announced["event"], "listening");
    let addr = announced["addr"].as_str().expect("addr is a string");
    let port = addr.rsplit(':').next().expect("addr has a port");

    let output = portal()
        .args([
            "--format",
            "json",
            "watch",
            "--host",
            "127.0.0.1",
            "--count",
            "3",
            "--timeout",
            "5s",
            "--poll-timeout",
            "100ms",
            "--port",
        ])
        .arg(port)
        .output()
        .expect("watch should run");

    assert!(
        output.status.success(),
        "watch failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let units = json_lines(&output.stdout);
    assert_eq!(units.len(), 3);
    assert_eq!(units[0]["head"], "67 42 00 1f");
    assert_eq!(units[1]["head"], "68 ce 3c 80");
    assert_eq!(units[2]["head"], "65 88 84");

    let status = replay.wait().expect("replay should exit");
    assert!(status.success());

    let _ = std::fs::remove_dir_all(path.parent().expect("sample has a parent"));
}

#[test]
fn replay_missing_file_fails_before_listening() {
    let output = portal()
        .args(["replay", "/nonexistent/portal/sample.h264"])
        .output()
        .expect("replay should run");

    assert_eq!(output.status.code(), Some(66));
    assert!(output.stdout.is_empty());
}
