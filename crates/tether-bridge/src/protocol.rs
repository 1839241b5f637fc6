// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Wire types for the control-plane endpoints.
//!
//! Field names are part of the protocol; note the asymmetry on the cmd
//! stream, which polls `cmd_id` but posts `command_id` back.

use serde::{Deserialize, Serialize};

// ── Session control ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct StartRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    pub windows_version: String,
}

#[derive(Debug, Deserialize)]
pub struct StartResponse {
    pub session_id: Option<String>,
    pub error: Option<String>,
}

/// Body for `/stop` and `/heartbeat`.
#[derive(Debug, Serialize)]
pub struct SessionRef {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct InputRequest {
    pub session_id: String,
    pub text: String,
}

/// Responses that only ever carry an optional error.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OutputResponse {
    pub output: Option<String>,
    /// `"stopped"` terminates the session.
    pub status: Option<String>,
}

// ── Filesystem stream ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FsPoll {
    #[serde(default)]
    pub has_pending: bool,
    pub op_id: Option<String>,
    pub operation: Option<String>,
    pub path: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Low 32 bits of the file size; directories report 0.
    pub size: u32,
}

#[derive(Debug, Serialize)]
pub struct FsResult {
    pub op_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<DirEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl FsResult {
    pub fn ok(op_id: impl Into<String>) -> Self {
        Self {
            op_id: op_id.into(),
            error: None,
            entries: None,
            content: None,
        }
    }

    pub fn err(op_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::ok(op_id)
        }
    }
}

// ── Command stream ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CmdPoll {
    #[serde(default)]
    pub has_pending: bool,
    pub cmd_id: Option<String>,
    pub command: Option<String>,
    pub working_directory: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CmdResult {
    pub command_id: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

// ── Approval stream ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ApprovalPoll {
    #[serde(default)]
    pub has_pending: bool,
    pub approval_id: Option<String>,
    pub tool_name: Option<String>,
    pub tool_input: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApprovalResponse {
    pub approval_id: String,
    pub approved: bool,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
