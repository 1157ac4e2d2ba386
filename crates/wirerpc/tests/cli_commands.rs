#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use wirerpc::channel::{ConnectionListener, DispatchTable};
use wirerpc::transport::Address;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/wirerpc-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn wait_for_socket(path: &Path, timeout: Duration) {
    let start = Instant::now();
    while !path.exists() {
        assert!(
            start.elapsed() < timeout,
            "socket {} did not appear",
            path.display()
        );
        thread::sleep(Duration::from_millis(25));
    }
}

fn spawn_server(sock_path: &Path, count: usize) -> Child {
    let child = Command::new(env!("CARGO_BIN_EXE_wirerpc"))
        .arg("--log-level")
        .arg("error")
        .arg("serve")
        .arg(format!("unix:{}", sock_path.display()))
        .arg("--count")
        .arg(count.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .expect("serve command should start");
    wait_for_socket(sock_path, Duration::from_secs(3));
    child
}

fn run_call(sock_path: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_wirerpc"))
        .arg("--log-level")
        .arg("error")
        .arg("call")
        .arg(format!("unix:{}", sock_path.display()))
        .args(args)
        .output()
        .expect("call command should run")
}

#[test]
fn call_echo_prints_json_reply() {
    let dir = unique_temp_dir("echo");
    let sock_path = dir.join("rpc.sock");
    let mut server = spawn_server(&sock_path, 1);

    let output = run_call(&sock_path, &["echo", "--data", "hello", "--format", "json"]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let reply: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be json");
    assert_eq!(reply["method"], "echo");
    assert_eq!(reply["response"], "hello");
    assert_eq!(reply["response_size"], 5);

    let status = server.wait().expect("server should exit after one connection");
    assert!(status.success());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn call_ping_raw_prints_body_only() {
    let dir = unique_temp_dir("ping");
    let sock_path = dir.join("rpc.sock");
    let mut server = spawn_server(&sock_path, 1);

    let output = run_call(&sock_path, &["ping", "--format", "raw"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(output.stdout, b"pong");

    let _ = server.wait();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn remote_error_exits_1_with_message() {
    let dir = unique_temp_dir("fail");
    let sock_path = dir.join("rpc.sock");
    let mut server = spawn_server(&sock_path, 2);

    let output = run_call(&sock_path, &["fail", "--data", "boom"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("remote error: boom"), "stderr: {stderr}");

    let output = run_call(&sock_path, &["nosuch"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown method: nosuch"), "stderr: {stderr}");

    let _ = server.wait();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn call_without_server_returns_3() {
    let dir = unique_temp_dir("refused");
    let output = run_call(&dir.join("missing.sock"), &["ping"]);
    assert_eq!(output.status.code(), Some(3));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn call_timeout_returns_124() {
    let dir = unique_temp_dir("timeout");
    let sock_path = dir.join("rpc.sock");

    let mut table = DispatchTable::new();
    table.register("never", |_ctx, _body: Bytes| Ok(()));
    let listener = ConnectionListener::bind(&Address::unix(&sock_path), table)
        .expect("listener should bind");
    let server = thread::spawn(move || {
        listener.accept().expect("listener should accept").join();
    });

    let output = run_call(&sock_path, &["never", "--timeout", "200ms"]);
    assert_eq!(output.status.code(), Some(124));

    server.join().expect("server thread should finish");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn version_reports_name() {
    let output = Command::new(env!("CARGO_BIN_EXE_wirerpc"))
        .arg("version")
        .output()
        .expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("wirerpc "));
}
