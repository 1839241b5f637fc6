// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

/// Byte cap on captured command output (combined stdout + stderr).
pub const OUTPUT_LIMIT: usize = 128 * 1024;

/// Captured result of one shell command.
///
/// `output` is the merged stream; the protocol's `stderr` field is always
/// empty because neither backend can separate the streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub output: String,
    pub exit_code: i32,
}

/// Execution failures that never reach the child process.
///
/// Display strings are part of the wire surface: the handler forwards
/// them verbatim as the command's stdout with exit code -1.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShellError {
    #[error("Command too long")]
    TooLong,

    #[error("Failed to execute command")]
    Spawn,
}

/// One of the two process backends.
#[async_trait]
pub trait ShellBackend: Send + Sync {
    /// Run `command` through the host shell, capturing merged output and
    /// the exit code.  `workdir`, when given, is the directory the child
    /// runs in; the client process's own directory is never touched.
    async fn run(&self, command: &str, workdir: Option<&Path>)
        -> Result<CommandOutput, ShellError>;

    /// Shell program name, for status display.
    fn program(&self) -> &'static str;
}

/// Append bytes to `buf` without growing past `limit`.  Returns how many
/// bytes were actually kept.
pub(crate) fn push_capped(buf: &mut Vec<u8>, chunk: &[u8], limit: usize) -> usize {
    let room = limit.saturating_sub(buf.len());
    let take = room.min(chunk.len());
    buf.extend_from_slice(&chunk[..take]);
    take
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
