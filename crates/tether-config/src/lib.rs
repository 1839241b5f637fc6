// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Configuration for the tether client.
//!
//! The config file is a small INI dialect understood by every proxy
//! deployment this client talks to:
//!
//! ```ini
//! ; comment
//! [server]
//! ip=192.168.2.1
//! port=5000
//! skip_permissions=false
//! ```
//!
//! Unknown keys and keys outside the `[server]` section are ignored.

mod loader;
mod schema;

pub use loader::{load, parse_ini};
pub use schema::{Config, ServerConfig, DEFAULT_API_KEY, DEFAULT_IP, DEFAULT_PORT};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "tether.ini";

/// Default transcript log path (`/log on`).
pub const LOG_FILE: &str = "tether.log";
