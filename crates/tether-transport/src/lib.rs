// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Control-plane HTTP transport.
//!
//! One TCP connection per request, `Connection: close`, and a fixed-size
//! response buffer.  The proxy lives on the same LAN as the client and the
//! client runs on TCP stacks where keep-alive state machines are more
//! liability than optimization, so every request is a single bounded
//! exchange: connect, send, read until close or the buffer fills, parse.

mod error;
mod http;

pub use error::TransportError;
pub use http::{HttpClient, Transport, HTTP_TIMEOUT, RESPONSE_BUFFER};
