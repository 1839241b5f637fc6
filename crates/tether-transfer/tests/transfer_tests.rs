// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Transfer protocol tests against mock TCP file servers.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use tether_transfer::{TransferClient, TransferError};

const TEST_TIMEOUT: Duration = Duration::from_millis(500);

fn sink(_: &str) {}

/// Deterministic test payload.
fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// Mock download server: validates the two header lines, then serves
/// `response_header` and `body`.
async fn download_server(
    expected_key: &'static str,
    expected_path: &'static str,
    response_header: String,
    body: Vec<u8>,
) -> (u16, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        let mut reader = BufReader::new(sock);

        let mut key = String::new();
        reader.read_line(&mut key).await.unwrap();
        assert_eq!(key.trim_end(), expected_key);

        let mut path = String::new();
        reader.read_line(&mut path).await.unwrap();
        assert_eq!(path.trim_end(), expected_path);

        let mut sock = reader.into_inner();
        sock.write_all(response_header.as_bytes()).await.unwrap();
        sock.write_all(&body).await.unwrap();
        sock.shutdown().await.unwrap();
    });
    (port, handle)
}

/// Mock upload server: reads the three header lines and the declared
/// byte count, replies with `reply`, and returns the received bytes.
async fn upload_server(reply: &'static str) -> (u16, JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        let mut reader = BufReader::new(sock);

        let mut key = String::new();
        reader.read_line(&mut key).await.unwrap();
        let mut path = String::new();
        reader.read_line(&mut path).await.unwrap();
        let mut size = String::new();
        reader.read_line(&mut size).await.unwrap();
        let size: usize = size.trim_end().parse().unwrap();

        let mut body = vec![0u8; size];
        reader.read_exact(&mut body).await.unwrap();

        let mut sock = reader.into_inner();
        sock.write_all(reply.as_bytes()).await.unwrap();
        sock.shutdown().await.unwrap();
        body
    });
    (port, handle)
}

fn client(download_port: u16, upload_port: u16) -> TransferClient {
    TransferClient::new("127.0.0.1", "xfer-key").with_ports(
        download_port,
        upload_port,
        TEST_TIMEOUT,
    )
}

// ── Download ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn download_writes_exact_bytes() {
    let body = payload(100 * 1024);
    let (port, server) = download_server(
        "xfer-key",
        "reports/out.bin",
        format!("OK {}\n", body.len()),
        body.clone(),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("out.bin");
    let got = client(port, 0)
        .download("reports/out.bin", &local, sink)
        .await
        .unwrap();

    assert_eq!(got, body.len() as u64);
    assert_eq!(std::fs::read(&local).unwrap(), body);
    server.await.unwrap();
}

#[tokio::test]
async fn download_server_error_is_surfaced() {
    let (port, _server) = download_server(
        "xfer-key",
        "nope.txt",
        "ERROR No such file\n".to_string(),
        Vec::new(),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let err = client(port, 0)
        .download("nope.txt", &dir.path().join("x"), sink)
        .await
        .unwrap_err();
    assert_eq!(err, TransferError::Server("No such file".into()));
}

#[tokio::test]
async fn download_rejects_zero_size() {
    let (port, _server) =
        download_server("xfer-key", "z", "OK 0\n".to_string(), Vec::new()).await;

    let dir = tempfile::tempdir().unwrap();
    let err = client(port, 0)
        .download("z", &dir.path().join("x"), sink)
        .await
        .unwrap_err();
    assert_eq!(err, TransferError::BadSize);
}

#[tokio::test]
async fn download_rejects_malformed_header() {
    let (port, _server) =
        download_server("xfer-key", "m", "HELLO\n".to_string(), Vec::new()).await;

    let dir = tempfile::tempdir().unwrap();
    let err = client(port, 0)
        .download("m", &dir.path().join("x"), sink)
        .await
        .unwrap_err();
    assert_eq!(err, TransferError::BadResponse);
}

#[tokio::test]
async fn short_download_is_incomplete() {
    let body = payload(512);
    let (port, _server) =
        download_server("xfer-key", "s", "OK 1024\n".to_string(), body).await;

    let dir = tempfile::tempdir().unwrap();
    let err = client(port, 0)
        .download("s", &dir.path().join("x"), sink)
        .await
        .unwrap_err();
    assert_eq!(err, TransferError::Incomplete { got: 512, want: 1024 });
}

#[tokio::test]
async fn download_refused_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let dir = tempfile::tempdir().unwrap();
    let err = client(port, 0)
        .download("x", &dir.path().join("x"), sink)
        .await
        .unwrap_err();
    assert_eq!(err, TransferError::Connect);
}

// ── Upload ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upload_streams_exact_bytes() {
    let body = payload(64 * 1024);
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("in.bin");
    std::fs::write(&local, &body).unwrap();

    let (port, server) = upload_server("OK\n").await;
    let sent = client(0, port)
        .upload(&local, "in.bin", sink)
        .await
        .unwrap();

    assert_eq!(sent, body.len() as u64);
    assert_eq!(server.await.unwrap(), body);
}

#[tokio::test]
async fn upload_server_error_is_surfaced() {
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("in.bin");
    std::fs::write(&local, b"data").unwrap();

    let (port, _server) = upload_server("ERROR disk full\n").await;
    let err = client(0, port)
        .upload(&local, "in.bin", sink)
        .await
        .unwrap_err();
    assert_eq!(err, TransferError::Server("disk full".into()));
}

#[tokio::test]
async fn upload_missing_local_file() {
    let err = client(0, 1)
        .upload(std::path::Path::new("/tmp/tether_missing_upload.bin"), "x", sink)
        .await
        .unwrap_err();
    assert_eq!(err, TransferError::OpenLocal);
}

// ── Round trip ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upload_then_download_is_byte_identical() {
    let body = payload(2 * 1024 * 1024);
    let dir = tempfile::tempdir().unwrap();
    let original = dir.path().join("original.bin");
    std::fs::write(&original, &body).unwrap();

    // Upload to the mock, capturing what the server stored.
    let (up_port, up_server) = upload_server("OK\n").await;
    client(0, up_port)
        .upload(&original, "blob.bin", sink)
        .await
        .unwrap();
    let stored = up_server.await.unwrap();

    // Serve the stored bytes back and download them.
    let (down_port, down_server) = download_server(
        "xfer-key",
        "blob.bin",
        format!("OK {}\n", stored.len()),
        stored,
    )
    .await;
    let fetched = dir.path().join("fetched.bin");
    client(down_port, 0)
        .download("blob.bin", &fetched, sink)
        .await
        .unwrap();
    down_server.await.unwrap();

    assert_eq!(std::fs::read(&fetched).unwrap(), body);
}
