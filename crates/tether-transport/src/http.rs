// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::TransportError;

/// Per-call timeout: bounds the connect and every individual read.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Fixed response buffer.  Anything the control plane says fits in here;
/// bulk bytes go over the transfer ports instead.
pub const RESPONSE_BUFFER: usize = 32 * 1024;

/// Upper bound on a composed request (headers + body).
const REQUEST_MAX: usize = 256 * 1024;

/// Capability interface the tool handlers and session layer depend on.
///
/// `body = None` issues a bare request; `Some(json)` adds
/// `Content-Type: application/json` and a `Content-Length` header.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<&str>,
    ) -> Result<String, TransportError>;

    /// Human-readable endpoint for status lines.
    fn endpoint_label(&self) -> String {
        String::new()
    }
}

/// The production transport: one TCP connection per call.
pub struct HttpClient {
    endpoint: Mutex<(String, u16)>,
    api_key: String,
    timeout: Duration,
    max_response: usize,
}

impl HttpClient {
    pub fn new(host: impl Into<String>, port: u16, api_key: impl Into<String>) -> Self {
        Self::with_limits(host, port, api_key, HTTP_TIMEOUT, RESPONSE_BUFFER)
    }

    /// Constructor with explicit limits, used by tests to keep timeouts
    /// short and buffers small.
    pub fn with_limits(
        host: impl Into<String>,
        port: u16,
        api_key: impl Into<String>,
        timeout: Duration,
        max_response: usize,
    ) -> Self {
        Self {
            endpoint: Mutex::new((host.into(), port)),
            api_key: api_key.into(),
            timeout,
            max_response,
        }
    }

    /// Point the transport at a different proxy (`/server ip:port`).
    pub fn set_endpoint(&self, host: impl Into<String>, port: u16) {
        let mut ep = self.endpoint.lock().unwrap_or_else(|e| e.into_inner());
        *ep = (host.into(), port);
    }

    pub fn endpoint(&self) -> (String, u16) {
        self.endpoint.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn compose(&self, method: &str, path: &str, body: Option<&str>, host: &str, port: u16) -> String {
        match body {
            Some(body) => format!(
                "{method} {path} HTTP/1.1\r\n\
                 Host: {host}:{port}\r\n\
                 X-API-Key: {key}\r\n\
                 Content-Type: application/json\r\n\
                 Content-Length: {len}\r\n\
                 Connection: close\r\n\
                 \r\n\
                 {body}",
                key = self.api_key,
                len = body.len(),
            ),
            None => format!(
                "{method} {path} HTTP/1.1\r\n\
                 Host: {host}:{port}\r\n\
                 X-API-Key: {key}\r\n\
                 Connection: close\r\n\
                 \r\n",
                key = self.api_key,
            ),
        }
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<&str>,
    ) -> Result<String, TransportError> {
        let (host, port) = self.endpoint();

        let request = self.compose(method, path, body, &host, port);
        if request.len() > REQUEST_MAX {
            return Err(TransportError::Overflow);
        }

        trace!(method, path, "http request");

        let mut stream = match timeout(self.timeout, TcpStream::connect((host.as_str(), port))).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                debug!(error = %e, host = %host, port, "connect failed");
                return Err(TransportError::Connect);
            }
            Err(_) => return Err(TransportError::Connect),
        };

        if stream.write_all(request.as_bytes()).await.is_err() {
            return Err(TransportError::Send);
        }

        // Read until the server closes, a read times out, or the buffer
        // fills.  The final byte of the buffer is reserved so a completely
        // full read is distinguishable from a fitting one.
        let mut buf = vec![0u8; self.max_response];
        let mut total = 0usize;
        while total < self.max_response - 1 {
            match timeout(self.timeout, stream.read(&mut buf[total..self.max_response - 1])).await
            {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => total += n,
                Ok(Err(_)) => break,
                Err(_) => break,
            }
        }

        if total == 0 {
            return Err(TransportError::Timeout);
        }

        let raw = &buf[..total];

        let status = parse_status(raw);
        if !(200..300).contains(&status) {
            return Err(TransportError::Server(status));
        }

        let Some(header_end) = find_header_end(raw) else {
            return Err(TransportError::NoBody);
        };
        let headers = String::from_utf8_lossy(&raw[..header_end]);
        let body_bytes = &raw[header_end + 4..];

        if let Some(declared) = parse_content_length(&headers) {
            if declared >= self.max_response {
                return Err(TransportError::ResponseTooLarge);
            }
            if body_bytes.len() < declared {
                return Err(TransportError::Truncated);
            }
        } else if total >= self.max_response - 1 {
            // No declared length and the buffer filled: the tail may have
            // been cut off, so the body cannot be trusted.
            return Err(TransportError::Truncated);
        }

        Ok(String::from_utf8_lossy(body_bytes).into_owned())
    }

    fn endpoint_label(&self) -> String {
        let (host, port) = self.endpoint();
        format!("{host}:{port}")
    }
}

/// Parse the status integer out of an `HTTP/1.x NNN reason` status line.
/// Anything unparseable yields 0, which callers reject as a server error.
fn parse_status(raw: &[u8]) -> u16 {
    if !raw.starts_with(b"HTTP/") {
        return 0;
    }
    let text = String::from_utf8_lossy(&raw[..raw.len().min(64)]);
    let Some(rest) = text.split_once(' ').map(|(_, r)| r) else {
        return 0;
    };
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

/// Byte offset of the `\r\n\r\n` separator, if any.
fn find_header_end(raw: &[u8]) -> Option<usize> {
    raw.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Case-insensitive `Content-Length` lookup in the header block.
fn parse_content_length(headers: &str) -> Option<usize> {
    for line in headers.lines() {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("content-length") {
            return value.trim().parse().ok();
        }
    }
    None
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
