// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

/// Everything a single-shot request can fail with.
///
/// Poll loops treat any of these as "back off and let the server retry";
/// result posts log them and move on (the idempotency cache makes the
/// replay safe).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Could not create socket")]
    Socket,

    #[error("Could not connect to server")]
    Connect,

    #[error("Request too large")]
    Overflow,

    #[error("Failed to send request")]
    Send,

    #[error("Request timed out")]
    Timeout,

    #[error("No response body")]
    NoBody,

    #[error("Server returned error status {0}")]
    Server(u16),

    #[error("Response truncated")]
    Truncated,

    #[error("Response Content-Length exceeds buffer size")]
    ResponseTooLarge,
}
