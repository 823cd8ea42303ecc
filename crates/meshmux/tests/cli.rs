#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/meshmux-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

/// Wait for the listener's socket file. Connecting to probe would use up
/// the single connection `listen` accepts.
fn wait_for_socket(path: &Path, timeout: Duration) {
    let start = Instant::now();
    while !path.exists() {
        if start.elapsed() >= timeout {
            panic!("listener socket never appeared at {}", path.display());
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn meshmux() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_meshmux"));
    cmd.arg("--log-level").arg("error");
    cmd
}

fn unix_addr(path: &Path) -> String {
    format!("unix://{}", path.display())
}

fn wait_with_deadline(mut child: std::process::Child, timeout: Duration) -> Output {
    let start = Instant::now();
    loop {
        if child
            .try_wait()
            .expect("child status should be readable")
            .is_some()
        {
            return child.wait_with_output().expect("child output");
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            panic!("child did not exit within {timeout:?}");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

#[test]
fn version_prints_package_version() {
    let output = meshmux().arg("version").output().expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("meshmux "));
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn initiator_client_data_arrives_on_responder_server() {
    let dir = unique_temp_dir("listen");
    let sock_path = dir.join("mux.sock");

    let listener = meshmux()
        .arg("--format")
        .arg("json")
        .arg("listen")
        .arg(unix_addr(&sock_path))
        .arg("--count")
        .arg("1")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("listen should start");

    wait_for_socket(&sock_path, Duration::from_secs(3));

    let send = meshmux()
        .arg("send")
        .arg(unix_addr(&sock_path))
        .arg("--role")
        .arg("client")
        .arg("--data")
        .arg("hello")
        .output()
        .expect("send should run");
    assert!(send.status.success(), "send failed: {send:?}");

    let output = wait_with_deadline(listener, Duration::from_secs(5));
    assert!(output.status.success(), "listen failed: {output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let line: serde_json::Value =
        serde_json::from_str(stdout.lines().next().expect("one chunk printed"))
            .expect("chunk output should be json");
    assert_eq!(line["role"], "server");
    assert_eq!(line["prefix"], 0);
    assert_eq!(line["payload"], "hello");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn echo_listener_answers_on_the_sending_role() {
    let dir = unique_temp_dir("echo");
    let sock_path = dir.join("mux.sock");

    let listener = meshmux()
        .arg("--format")
        .arg("pretty")
        .arg("listen")
        .arg(unix_addr(&sock_path))
        .arg("--echo")
        .arg("--count")
        .arg("1")
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .expect("listen should start");

    wait_for_socket(&sock_path, Duration::from_secs(3));

    let send = meshmux()
        .arg("--format")
        .arg("json")
        .arg("send")
        .arg(unix_addr(&sock_path))
        .arg("--role")
        .arg("server")
        .arg("--json")
        .arg(r#"{"ping":true}"#)
        .arg("--wait")
        .arg("--wait-timeout")
        .arg("3s")
        .output()
        .expect("send should run");

    assert!(send.status.success(), "send failed: {send:?}");
    let stdout = String::from_utf8_lossy(&send.stdout);
    let line: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("response output should be json");
    assert_eq!(line["role"], "server");
    assert_eq!(line["prefix"], 1);
    assert_eq!(line["payload"], r#"{"ping":true}"#);

    let _ = wait_with_deadline(listener, Duration::from_secs(5));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_to_missing_socket_fails() {
    let dir = unique_temp_dir("missing");
    let output = meshmux()
        .arg("send")
        .arg(unix_addr(&dir.join("absent.sock")))
        .arg("--data")
        .arg("x")
        .output()
        .expect("send should run");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("connect failed"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn invalid_json_payload_is_usage_error() {
    let output = meshmux()
        .arg("send")
        .arg("tcp://127.0.0.1:9")
        .arg("--json")
        .arg("{not json")
        .output()
        .expect("send should run");

    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn forward_rule_encodes_and_decodes() {
    let encoded = meshmux()
        .arg("--format")
        .arg("json")
        .arg("rule")
        .arg("forward")
        .arg("--route-id")
        .arg("2")
        .arg("--transport-id")
        .arg("67e55044-10b1-426f-9247-bb680e5fe0c8")
        .output()
        .expect("rule forward should run");
    assert!(encoded.status.success());
    let json: serde_json::Value =
        serde_json::from_slice(&encoded.stdout).expect("rule output should be json");
    assert_eq!(json["kind"], "forward");
    assert_eq!(json["route_id"], 2);
    let hex = json["encoded"].as_str().expect("encoded hex").to_string();
    assert_eq!(hex.len(), 29 * 2);

    let decoded = meshmux()
        .arg("--format")
        .arg("json")
        .arg("rule")
        .arg("decode")
        .arg(&hex)
        .output()
        .expect("rule decode should run");
    assert!(decoded.status.success());
    let json: serde_json::Value =
        serde_json::from_slice(&decoded.stdout).expect("decode output should be json");
    assert_eq!(
        json["transport_id"],
        "67e55044-10b1-426f-9247-bb680e5fe0c8"
    );
}

#[test]
fn truncated_rule_is_data_invalid() {
    let output = meshmux()
        .arg("rule")
        .arg("decode")
        .arg("00000000")
        .output()
        .expect("rule decode should run");
    assert_eq!(output.status.code(), Some(60));
}
