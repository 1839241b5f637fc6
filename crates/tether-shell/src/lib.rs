// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Shell command execution.
//!
//! Two incompatible process backends cover the host spread this client
//! runs on: NT-generation hosts get `cmd.exe` with a stdout pipe and
//! stderr merged via `2>&1`; the 9x generation has no usable pipes, so
//! `command.com` output is captured through a temp-file redirection.
//! The backend is probed and selected once at startup.

mod backend;
mod host;
mod legacy;
mod modern;

pub use backend::{CommandOutput, ShellBackend, ShellError, OUTPUT_LIMIT};
pub use host::{detect, select_backend, HostGeneration, HostInfo};
pub use legacy::LegacyShell;
pub use modern::ModernShell;
