// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Tool handlers.
//!
//! One handler call is one poll iteration: fetch a pending request,
//! execute it exactly once, post the result, report whether work was
//! done so the caller can drain a burst before sleeping.
//!
//! Before any side-effecting operation the handler consults its stream's
//! idempotency cache; a hit replays the stored body without touching the
//! disk or spawning a process.  Poll failures back off and return "no
//! work" — the proxy retries.  Result-post failures are logged and NOT
//! retried here: the proxy re-polls, and the cache turns the retry into
//! a replay.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::debug;

use tether_shell::{CommandOutput, ShellBackend as _};
use tether_transport::Transport as _;

use crate::path::build_full_path;
use crate::protocol::{
    ApprovalPoll, ApprovalResponse, CmdPoll, CmdResult, DirEntry, EntryKind, FsPoll, FsResult,
};
use crate::state::{ApprovalPrompt, Client, PendingApproval};
use crate::{convert_slashes, POLL_BACKOFF, READ_LIMIT};

// ── Filesystem stream ─────────────────────────────────────────────────────────

/// One fs poll iteration.  Returns `true` when a request was processed
/// (including a cache replay).
pub async fn handle_fileop(client: &Client) -> bool {
    let body = match client.transport.request("GET", "/fs/poll", None).await {
        Ok(body) => body,
        Err(e) => {
            debug!(error = %e, "fs poll failed");
            tokio::time::sleep(POLL_BACKOFF).await;
            return false;
        }
    };

    let Ok(poll) = serde_json::from_str::<FsPoll>(&body) else {
        return false;
    };
    if !poll.has_pending {
        return false;
    }

    let (Some(op_id), Some(operation), Some(path)) = (poll.op_id, poll.operation, poll.path)
    else {
        client
            .transcript
            .error("fs", "malformed file operation request");
        return false;
    };

    let cached = {
        let cache = client.fs_cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.lookup(&op_id).map(str::to_string)
    };
    if let Some(result) = cached {
        client
            .transcript
            .line(&format!("[FS: replaying cached result for {op_id}]"));
        post_result(client, "/fs/result", "fs", &result).await;
        return true;
    }

    client
        .transcript
        .line(&format!("[FS: {operation} {path}]"));

    let full_path = match build_full_path(&path) {
        Ok(p) => p,
        Err(_) => {
            client
                .transcript
                .error("fs", "path too long or traversal rejected");
            return false;
        }
    };
    let local = full_path.to_local(&client.fs_root);

    let result = match operation.as_str() {
        "list" => op_list(&op_id, &local).await,
        "read" => op_read(&op_id, &local).await,
        "write" => op_write(&op_id, &local, poll.content.as_deref()).await,
        "mkdir" => op_mkdir(&op_id, &local).await,
        _ => FsResult::err(&op_id, "Unknown operation"),
    };

    if let Ok(body) = serde_json::to_string(&result) {
        client
            .fs_cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .store(&op_id, &body);
        post_result(client, "/fs/result", "fs", &body).await;
    }
    true
}

async fn op_list(op_id: &str, local: &Path) -> FsResult {
    let mut read_dir = match tokio::fs::read_dir(local).await {
        Ok(rd) => rd,
        Err(_) => return FsResult::err(op_id, "Directory not found"),
    };

    let mut entries = Vec::new();
    while let Ok(Some(entry)) = read_dir.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        let meta = match entry.metadata().await {
            Ok(meta) => meta,
            Err(_) => continue,
        };
        if meta.is_dir() {
            entries.push(DirEntry {
                name,
                kind: EntryKind::Dir,
                size: 0,
            });
        } else {
            entries.push(DirEntry {
                name,
                kind: EntryKind::File,
                // Low dword only; the wire format predates 4 GiB files.
                size: meta.len() as u32,
            });
        }
    }

    FsResult {
        entries: Some(entries),
        ..FsResult::ok(op_id)
    }
}

async fn op_read(op_id: &str, local: &Path) -> FsResult {
    let mut bytes = match tokio::fs::read(local).await {
        Ok(bytes) => bytes,
        Err(_) => return FsResult::err(op_id, "File not found"),
    };
    bytes.truncate(READ_LIMIT - 1);
    // The content travels as a JSON string; binary files are cut at the
    // first NUL.  Known limitation of the read operation.
    if let Some(nul) = bytes.iter().position(|&b| b == 0) {
        bytes.truncate(nul);
    }
    FsResult {
        content: Some(String::from_utf8_lossy(&bytes).into_owned()),
        ..FsResult::ok(op_id)
    }
}

async fn op_write(op_id: &str, local: &Path, content: Option<&str>) -> FsResult {
    let Some(content) = content else {
        return FsResult::err(op_id, "No content provided");
    };

    let mut file = match tokio::fs::File::create(local).await {
        Ok(file) => file,
        Err(_) => return FsResult::err(op_id, "Could not create file"),
    };

    let written = file.write_all(content.as_bytes()).await;
    let flushed = file.flush().await.and(file.shutdown().await);
    if written.is_err() || flushed.is_err() {
        return FsResult::err(op_id, "Write failed");
    }
    FsResult::ok(op_id)
}

async fn op_mkdir(op_id: &str, local: &Path) -> FsResult {
    match tokio::fs::create_dir(local).await {
        Ok(()) => FsResult::ok(op_id),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => FsResult::ok(op_id),
        Err(_) => FsResult::err(op_id, "Could not create directory"),
    }
}

// ── Command stream ────────────────────────────────────────────────────────────

/// One cmd poll iteration.
pub async fn handle_command(client: &Client) -> bool {
    let body = match client.transport.request("GET", "/cmd/poll", None).await {
        Ok(body) => body,
        Err(e) => {
            debug!(error = %e, "cmd poll failed");
            tokio::time::sleep(POLL_BACKOFF).await;
            return false;
        }
    };

    let Ok(poll) = serde_json::from_str::<CmdPoll>(&body) else {
        return false;
    };
    if !poll.has_pending {
        return false;
    }

    let (Some(cmd_id), Some(command)) = (poll.cmd_id, poll.command) else {
        client.transcript.error("cmd", "malformed command request");
        return false;
    };

    let cached = {
        let cache = client.cmd_cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.lookup(&cmd_id).map(str::to_string)
    };
    if let Some(result) = cached {
        client
            .transcript
            .line(&format!("[CMD: replaying cached result for {cmd_id}]"));
        post_result(client, "/cmd/result", "cmd", &result).await;
        return true;
    }

    let workdir = resolve_workdir(client, poll.working_directory.as_deref());

    let command = convert_slashes(&command);
    client.transcript.line(&format!("[CMD: {command}]"));

    let output = match client.shell.run(&command, workdir.as_deref()).await {
        Ok(output) => output,
        Err(e) => CommandOutput {
            output: e.to_string(),
            exit_code: -1,
        },
    };

    if !output.output.is_empty() {
        client.transcript.console(&output.output);
        if !output.output.ends_with('\n') {
            client.transcript.console("\n");
        }
    }

    let result = CmdResult {
        command_id: cmd_id.clone(),
        stdout: output.output,
        stderr: String::new(),
        exit_code: output.exit_code,
    };
    if let Ok(body) = serde_json::to_string(&result) {
        client
            .cmd_cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .store(&cmd_id, &body);
        post_result(client, "/cmd/result", "cmd", &body).await;
    }
    true
}

/// Normalize the requested working directory.  An unusable directory is
/// reported but does not abort the command: it just runs from the
/// client's own directory.
fn resolve_workdir(client: &Client, requested: Option<&str>) -> Option<PathBuf> {
    let requested = requested.filter(|w| !w.is_empty())?;
    let full = build_full_path(requested).ok()?;
    let local = full.to_local(&client.fs_root);
    if local.is_dir() {
        client.transcript.line(&format!("[CD: {}]", full.display()));
        Some(local)
    } else {
        client
            .transcript
            .error("cmd", "Could not change directory");
        None
    }
}

// ── Approval stream ───────────────────────────────────────────────────────────

/// Scheduler-side approval poll: latch at most one pending approval into
/// shared state.  Never latches while a previous approval is still
/// latched or being prompted.
pub async fn poll_approval(client: &Client) -> bool {
    if !client.approval_idle() {
        return false;
    }
    let Some(session_id) = client.session_id() else {
        return false;
    };

    let path = format!("/approval/poll?session_id={session_id}");
    let body = match client.transport.request("GET", &path, None).await {
        Ok(body) => body,
        Err(e) => {
            debug!(error = %e, "approval poll failed");
            tokio::time::sleep(POLL_BACKOFF).await;
            return false;
        }
    };

    let Ok(poll) = serde_json::from_str::<ApprovalPoll>(&body) else {
        return false;
    };
    if !poll.has_pending {
        return false;
    }

    client.latch_approval(PendingApproval {
        approval_id: poll.approval_id.unwrap_or_default(),
        tool_name: poll.tool_name.unwrap_or_else(|| "unknown".to_string()),
        tool_input: poll.tool_input.unwrap_or_default(),
    })
}

/// UI-side approval step: move a latched approval to prompting, get the
/// verdict (auto-approving when `skip_permissions` is set), post the
/// response, and return to idle.
pub async fn process_approval(client: &Client, prompt: &dyn ApprovalPrompt) -> bool {
    let Some(approval) = client.take_approval() else {
        return false;
    };

    let approved = if client.skip_permissions() {
        client
            .transcript
            .line(&format!("[Auto-approving: {}]", approval.tool_name));
        true
    } else {
        prompt.decide(&approval)
    };

    if !approval.approval_id.is_empty() {
        let body = ApprovalResponse {
            approval_id: approval.approval_id.clone(),
            approved,
        };
        if let Ok(body) = serde_json::to_string(&body) {
            if client
                .transport
                .request("POST", "/approval/respond", Some(&body))
                .await
                .is_ok()
            {
                client
                    .transcript
                    .line(if approved { "[Approved]" } else { "[Rejected]" });
            }
        }
    }

    client.transcript.line("========================================");
    client.transcript.line("");

    client.finish_approval();
    true
}

// ── Shared ────────────────────────────────────────────────────────────────────

/// POST a serialized result; failures are logged, never retried here.
async fn post_result(client: &Client, path: &str, context: &str, body: &str) {
    if let Err(e) = client.transport.request("POST", path, Some(body)).await {
        client.transcript.error(context, &e.to_string());
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
