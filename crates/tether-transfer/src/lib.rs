// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Bulk file transfer.
//!
//! Uploads and downloads bypass the control plane entirely: two
//! dedicated TCP ports speak a newline-delimited ASCII header followed
//! by raw bytes.  This keeps multi-megabyte bodies away from the
//! control link's tight response buffer.
//!
//! Download: send `"<key>\n<remote>\n"`, receive `"OK <size>\n"` (or
//! `"ERROR <msg>\n"`) followed by exactly `<size>` bytes.
//! Upload: send `"<key>\n<remote>\n<size>\n"` and the bytes, receive a
//! single `"OK"` or `"ERROR <msg>"` line.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Dedicated download port on the proxy.
pub const PORT_DOWNLOAD: u16 = 5001;

/// Dedicated upload port on the proxy.
pub const PORT_UPLOAD: u16 = 5002;

/// Per-read timeout during a transfer.
pub const TRANSFER_TIMEOUT: Duration = Duration::from_secs(30);

const CHUNK: usize = 4096;
const HEADER_MAX: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransferError {
    #[error("Could not connect to file server")]
    Connect,

    #[error("Failed to send header")]
    SendHeader,

    #[error("Failed to send data")]
    SendData,

    #[error("Timeout waiting for server response")]
    HeaderTimeout,

    #[error("{0}")]
    Server(String),

    #[error("Unexpected response from server")]
    BadResponse,

    #[error("Invalid file size")]
    BadSize,

    #[error("Could not create local file")]
    CreateLocal,

    #[error("Could not open local file")]
    OpenLocal,

    #[error("Failed to write to file")]
    WriteLocal,

    #[error("Timeout during transfer")]
    TransferTimeout,

    #[error("Incomplete transfer {got} / {want} bytes")]
    Incomplete { got: u64, want: u64 },
}

/// Client half of the transfer protocol.  `console` callbacks receive
/// progress text exactly as it should appear on screen.
pub struct TransferClient {
    host: String,
    api_key: String,
    download_port: u16,
    upload_port: u16,
    timeout: Duration,
}

impl TransferClient {
    pub fn new(host: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            api_key: api_key.into(),
            download_port: PORT_DOWNLOAD,
            upload_port: PORT_UPLOAD,
            timeout: TRANSFER_TIMEOUT,
        }
    }

    /// Override ports and timeout (tests, nonstandard deployments).
    pub fn with_ports(mut self, download: u16, upload: u16, timeout: Duration) -> Self {
        self.download_port = download;
        self.upload_port = upload;
        self.timeout = timeout;
        self
    }

    /// Fetch `remote` into `local`.  Success requires the received byte
    /// count to match the declared size exactly.
    pub async fn download(
        &self,
        remote: &str,
        local: &Path,
        console: impl Fn(&str),
    ) -> Result<u64, TransferError> {
        console(&format!(
            "[Downloading {remote} -> {}]\n",
            local.display()
        ));

        let mut stream = self.connect(self.download_port).await?;

        let request = format!("{}\n{remote}\n", self.api_key);
        stream
            .write_all(request.as_bytes())
            .await
            .map_err(|_| TransferError::SendHeader)?;

        let header = self.read_line(&mut stream).await?;
        if let Some(message) = header.strip_prefix("ERROR ") {
            return Err(TransferError::Server(message.to_string()));
        }
        let Some(size_text) = header.strip_prefix("OK ") else {
            return Err(TransferError::BadResponse);
        };
        let file_size: u64 = size_text.trim().parse().map_err(|_| TransferError::BadSize)?;
        if file_size == 0 {
            return Err(TransferError::BadSize);
        }

        console(&format!("[File size: {file_size} bytes]\n"));

        let mut file = File::create(local)
            .await
            .map_err(|_| TransferError::CreateLocal)?;

        let mut buffer = [0u8; CHUNK];
        let mut total: u64 = 0;
        while total < file_size {
            let want = CHUNK.min((file_size - total) as usize);
            let received = match timeout(self.timeout, stream.read(&mut buffer[..want])).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => n,
                Ok(Err(_)) => break,
                Err(_) => return Err(TransferError::TransferTimeout),
            };

            file.write_all(&buffer[..received])
                .await
                .map_err(|_| TransferError::WriteLocal)?;
            total += received as u64;

            console(&format!(
                "\r[{total} / {file_size} bytes ({}%)]",
                total / (file_size / 100 + 1)
            ));
        }

        file.flush().await.map_err(|_| TransferError::WriteLocal)?;

        if total == file_size {
            console(&format!(
                "\r[Downloaded {total} bytes to {}]              \n",
                local.display()
            ));
            Ok(total)
        } else {
            Err(TransferError::Incomplete {
                got: total,
                want: file_size,
            })
        }
    }

    /// Push `local` to the proxy as `remote`.
    pub async fn upload(
        &self,
        local: &Path,
        remote: &str,
        console: impl Fn(&str),
    ) -> Result<u64, TransferError> {
        let mut file = File::open(local).await.map_err(|_| TransferError::OpenLocal)?;
        let file_size = file
            .metadata()
            .await
            .map_err(|_| TransferError::OpenLocal)?
            .len();

        console(&format!(
            "[Uploading {} ({file_size} bytes) -> {remote}]\n",
            local.display()
        ));

        let mut stream = self.connect(self.upload_port).await?;

        let header = format!("{}\n{remote}\n{file_size}\n", self.api_key);
        stream
            .write_all(header.as_bytes())
            .await
            .map_err(|_| TransferError::SendHeader)?;

        let mut buffer = [0u8; CHUNK];
        let mut total: u64 = 0;
        loop {
            let read = file
                .read(&mut buffer)
                .await
                .map_err(|_| TransferError::OpenLocal)?;
            if read == 0 {
                break;
            }
            stream
                .write_all(&buffer[..read])
                .await
                .map_err(|_| TransferError::SendData)?;
            total += read as u64;

            console(&format!(
                "\r[Sent {total} / {file_size} bytes ({}%)]",
                total / (file_size / 100 + 1)
            ));
        }

        let reply = self.read_line(&mut stream).await.inspect_err(|_| {
            debug!("no reply after upload");
        })?;

        if let Some(message) = reply.strip_prefix("ERROR ") {
            return Err(TransferError::Server(message.to_string()));
        }
        if reply.trim_end() != "OK" {
            return Err(TransferError::BadResponse);
        }

        console(&format!(
            "\r[Uploaded {total} bytes to {remote}]              \n"
        ));
        Ok(total)
    }

    async fn connect(&self, port: u16) -> Result<TcpStream, TransferError> {
        match timeout(self.timeout, TcpStream::connect((self.host.as_str(), port))).await {
            Ok(Ok(stream)) => Ok(stream),
            _ => Err(TransferError::Connect),
        }
    }

    /// Read one `\n`-terminated ASCII header line, byte at a time, each
    /// read bounded by the transfer timeout.
    async fn read_line(&self, stream: &mut TcpStream) -> Result<String, TransferError> {
        let mut line = Vec::with_capacity(64);
        let mut byte = [0u8; 1];
        while line.len() < HEADER_MAX - 1 {
            match timeout(self.timeout, stream.read(&mut byte)).await {
                Ok(Ok(1)) => {
                    if byte[0] == b'\n' {
                        break;
                    }
                    line.push(byte[0]);
                }
                _ => return Err(TransferError::HeaderTimeout),
            }
        }
        Ok(String::from_utf8_lossy(&line).into_owned())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
