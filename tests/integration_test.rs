// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! End-to-end tests: the bridge runtime driving the real HTTP transport
//! against a mock proxy on a local TCP socket.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use tether_bridge::{handlers, session, Client, Transcript};
use tether_shell::{CommandOutput, ShellBackend, ShellError};
use tether_transport::HttpClient;

/// Request observed by the mock proxy.
#[derive(Debug, Clone)]
struct Seen {
    method: String,
    path: String,
    api_key: Option<String>,
    body: String,
}

/// A tiny HTTP/1.1 proxy: one connection per request, canned JSON bodies
/// per path, every request recorded.
struct MockProxy {
    port: u16,
    seen: Arc<Mutex<Vec<Seen>>>,
    responses: Arc<Mutex<HashMap<String, VecDeque<String>>>>,
}

impl MockProxy {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let seen: Arc<Mutex<Vec<Seen>>> = Arc::default();
        let responses: Arc<Mutex<HashMap<String, VecDeque<String>>>> = Arc::default();

        let seen_bg = seen.clone();
        let responses_bg = responses.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut sock, _)) = listener.accept().await else {
                    break;
                };
                let seen = seen_bg.clone();
                let responses = responses_bg.clone();
                tokio::spawn(async move {
                    let Some(request) = read_request(&mut sock).await else {
                        return;
                    };
                    let path_key = request
                        .path
                        .split('?')
                        .next()
                        .unwrap_or_default()
                        .to_string();
                    seen.lock().unwrap().push(request);

                    let body = responses
                        .lock()
                        .unwrap()
                        .get_mut(&path_key)
                        .and_then(VecDeque::pop_front)
                        .unwrap_or_else(|| "{}".to_string());
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = sock.write_all(response.as_bytes()).await;
                    let _ = sock.shutdown().await;
                });
            }
        });

        Self {
            port,
            seen,
            responses,
        }
    }

    fn respond(&self, path: &str, body: &str) {
        self.responses
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(body.to_string());
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

async fn read_request(sock: &mut tokio::net::TcpStream) -> Option<Seen> {
    let mut raw = Vec::new();
    let mut chunk = [0u8; 2048];
    let header_end = loop {
        let n = sock.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        raw.extend_from_slice(&chunk[..n]);
        if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&raw[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split(' ');
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();

    let mut api_key = None;
    let mut content_length = 0usize;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "x-api-key" => api_key = Some(value.trim().to_string()),
                "content-length" => content_length = value.trim().parse().unwrap_or(0),
                _ => {}
            }
        }
    }

    let mut body = raw[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = sock.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(Seen {
        method,
        path,
        api_key,
        body: String::from_utf8_lossy(&body).to_string(),
    })
}

/// Stand-in shell so command flow is testable on any host.
struct EchoShell;

#[async_trait]
impl ShellBackend for EchoShell {
    async fn run(
        &self,
        command: &str,
        _workdir: Option<&Path>,
    ) -> Result<CommandOutput, ShellError> {
        Ok(CommandOutput {
            output: format!("ran: {command}\n"),
            exit_code: 0,
        })
    }

    fn program(&self) -> &'static str {
        "echo"
    }
}

fn client_for(proxy: &MockProxy, root: &Path) -> Arc<Client> {
    let http = Arc::new(HttpClient::with_limits(
        "127.0.0.1",
        proxy.port,
        "integration-key",
        Duration::from_millis(500),
        32 * 1024,
    ));
    Client::new(
        http,
        Arc::new(EchoShell),
        Arc::new(Transcript::new(root.join("transcript.log"))),
        root.to_path_buf(),
        "Windows 98",
        false,
    )
}

#[tokio::test]
async fn session_start_carries_api_key_and_version() {
    let proxy = MockProxy::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = client_for(&proxy, dir.path());

    proxy.respond("/start", "{\"session_id\":\"it-1\"}");
    session::connect(&client, Some("C:\\work")).await;

    assert_eq!(client.session_id().as_deref(), Some("it-1"));

    let seen = proxy.seen();
    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[0].path, "/start");
    assert_eq!(seen[0].api_key.as_deref(), Some("integration-key"));

    let body: serde_json::Value = serde_json::from_str(&seen[0].body).unwrap();
    assert_eq!(body["windows_version"], "Windows 98");
    assert_eq!(body["working_directory"], "C:\\work");
}

#[tokio::test]
async fn fs_write_round_trips_over_real_http() {
    let proxy = MockProxy::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = client_for(&proxy, dir.path());

    let op = "{\"has_pending\":true,\"op_id\":\"A\",\"operation\":\"write\",\
               \"path\":\"/x.txt\",\"content\":\"hello\"}";
    proxy.respond("/fs/poll", op);
    assert!(handlers::handle_fileop(&client).await);

    assert_eq!(
        std::fs::read_to_string(dir.path().join("x.txt")).unwrap(),
        "hello"
    );

    // Same op id again: replay, no re-execution.
    std::fs::remove_file(dir.path().join("x.txt")).unwrap();
    proxy.respond("/fs/poll", op);
    assert!(handlers::handle_fileop(&client).await);
    assert!(!dir.path().join("x.txt").exists());

    let results: Vec<Seen> = proxy
        .seen()
        .into_iter()
        .filter(|s| s.path == "/fs/result")
        .collect();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].body, results[1].body);
    let body: serde_json::Value = serde_json::from_str(&results[0].body).unwrap();
    assert_eq!(body["op_id"], "A");
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn command_round_trips_over_real_http() {
    let proxy = MockProxy::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = client_for(&proxy, dir.path());

    proxy.respond(
        "/cmd/poll",
        "{\"has_pending\":true,\"cmd_id\":\"C1\",\"command\":\"type C:/autoexec.bat\"}",
    );
    assert!(handlers::handle_command(&client).await);

    let results: Vec<Seen> = proxy
        .seen()
        .into_iter()
        .filter(|s| s.path == "/cmd/result")
        .collect();
    let body: serde_json::Value = serde_json::from_str(&results[0].body).unwrap();
    assert_eq!(body["command_id"], "C1");
    // Slash conversion happened before the shell saw the command.
    assert_eq!(body["stdout"], "ran: type C:\\autoexec.bat\n");
    assert_eq!(body["exit_code"], 0);
    assert_eq!(body["stderr"], "");
}

#[tokio::test]
async fn read_of_written_file_returns_same_bytes() {
    let proxy = MockProxy::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = client_for(&proxy, dir.path());

    proxy.respond(
        "/fs/poll",
        "{\"has_pending\":true,\"op_id\":\"W\",\"operation\":\"write\",\
         \"path\":\"roundtrip.txt\",\"content\":\"line one\\nline two\\n\"}",
    );
    assert!(handlers::handle_fileop(&client).await);

    proxy.respond(
        "/fs/poll",
        "{\"has_pending\":true,\"op_id\":\"R\",\"operation\":\"read\",\
         \"path\":\"roundtrip.txt\"}",
    );
    assert!(handlers::handle_fileop(&client).await);

    let results: Vec<Seen> = proxy
        .seen()
        .into_iter()
        .filter(|s| s.path == "/fs/result")
        .collect();
    let body: serde_json::Value = serde_json::from_str(&results[1].body).unwrap();
    assert_eq!(body["content"], "line one\nline two\n");
}
