//! Sandbox client and executor against a canned HTTP responder.

use std::path::PathBuf;
use std::time::Duration;

use aifix_core::{ProjectKind, RuntimeEnv, TestExecutor, TestRunRequest};
use aifix_exec::{ExecError, RunTestsRequest, SandboxClient, SandboxExecutor};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Accept one connection, answer with `status` and `body`, and hand back the
/// raw request text.
async fn serve_once(status: &'static str, body: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let handle = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.expect("accept");
        let request = read_request(&mut sock).await;
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        sock.write_all(response.as_bytes()).await.expect("write");
        let _ = sock.shutdown().await;
        request
    });
    (format!("http://{addr}"), handle)
}

async fn read_request(sock: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = sock.read(&mut chunk).await.expect("read");
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

fn request(repo: &str) -> TestRunRequest {
    TestRunRequest {
        repo_path: PathBuf::from(repo),
        repo_url: "https://example.com/team/calc.git".into(),
        branch: "TEAM_LEAD_AI_FIX".into(),
        project_kind: ProjectKind::Python,
        env: RuntimeEnv::ambient(),
        timeout: Duration::from_secs(120),
    }
}

#[tokio::test]
async fn test_run_tests_sends_token_and_body() {
    let reply = serde_json::json!({
        "stdout": "collected 1 item",
        "stderr": "",
        "returncode": 1,
        "timed_out": false,
        "project_type": "python"
    });
    let (url, server) = serve_once("200 OK", reply.to_string()).await;
    let client = SandboxClient::new(&url, Some("s3cret")).unwrap();

    let body = RunTestsRequest {
        repo_url: "https://example.com/r.git".into(),
        branch: Some("B_AI_FIX".into()),
        timeout_sec: 120,
    };
    let response = client
        .run_tests(&body, Duration::from_secs(5))
        .await
        .expect("run_tests");
    assert_eq!(response.stdout, "collected 1 item");
    assert_eq!(response.returncode, Some(1));

    let raw = server.await.unwrap();
    let lowered = raw.to_lowercase();
    assert!(raw.starts_with("POST /run-tests "));
    assert!(lowered.contains("x-sandbox-token: s3cret"));
    assert!(raw.contains(r#""branch":"B_AI_FIX""#));
    assert!(raw.contains(r#""timeout_sec":120"#));
}

#[tokio::test]
async fn test_health_ok() {
    let (url, server) = serve_once("200 OK", r#"{"status":"ok"}"#.to_string()).await;
    let client = SandboxClient::new(&url, None).unwrap();

    let health = client.health().await.expect("health");
    assert!(health.is_ok());

    let raw = server.await.unwrap();
    assert!(raw.starts_with("GET /health "));
    assert!(!raw.to_lowercase().contains("x-sandbox-token"));
}

#[tokio::test]
async fn test_unauthorized_is_status_error() {
    let (url, _server) =
        serve_once("401 Unauthorized", r#"{"detail":"Unauthorized"}"#.to_string()).await;
    let client = SandboxClient::new(&url, Some("wrong")).unwrap();

    let err = client.health().await.unwrap_err();
    match err {
        ExecError::Status { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("Unauthorized"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_executor_rewrites_sandbox_paths() {
    let reply = serde_json::json!({
        "stdout": "/tmp/agent-workspace-ab12/repo/app/calc.py:3: in add\nE   NameError: name 'c' is not defined",
        "stderr": "",
        "returncode": 1,
        "timed_out": false,
        "project_type": "python"
    });
    let (url, _server) = serve_once("200 OK", reply.to_string()).await;
    let exec = SandboxExecutor::new(SandboxClient::new(&url, None).unwrap());

    let out = exec.run_tests(&request("/w/calc")).await;
    assert!(!out.timed_out);
    assert_eq!(out.exit_code, Some(1));
    assert!(out.output.starts_with("/w/calc/app/calc.py:3: in add"));
}

#[tokio::test]
async fn test_executor_maps_remote_timeout() {
    let reply = serde_json::json!({
        "stdout": "",
        "stderr": "test execution timed out",
        "returncode": 1,
        "timed_out": true,
        "project_type": "python"
    });
    let (url, _server) = serve_once("200 OK", reply.to_string()).await;
    let exec = SandboxExecutor::new(SandboxClient::new(&url, None).unwrap());

    let out = exec.run_tests(&request("/w/calc")).await;
    assert!(out.timed_out);
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_executor_unreachable_sandbox_is_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let exec = SandboxExecutor::new(SandboxClient::new(&format!("http://{addr}"), None).unwrap());
    let out = exec.run_tests(&request("/w/calc")).await;
    assert!(!out.timed_out);
    assert!(out.is_empty());
    assert_eq!(out.exit_code, None);
}
