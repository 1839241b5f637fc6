// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Poll scheduler.
//!
//! One background task drives all four poll streams while a session is
//! live.  Within a cycle the ordering is fixed: filesystem requests are
//! fully drained before commands, commands before approval latching, and
//! agent output is fetched last — a command that depends on a fresh file
//! write can never race it, and handler progress lines are not
//! interleaved with agent output mid-cycle.
//!
//! When the client runs in synchronous mode instead, the same handler
//! entry points are driven inline from the input loop's idle ticks, so
//! both modes behave identically.

use std::sync::Arc;

use tracing::debug;

use tether_transport::Transport as _;

use crate::handlers;
use crate::protocol::OutputResponse;
use crate::state::{ApprovalPrompt, Client};
use crate::POLL_SLEEP;

/// Start the background scheduler.  The returned handle is awaited
/// during cleanup; the loop exits at the next sleep boundary after
/// [`Client::shutdown`].
pub fn spawn(client: &Arc<Client>) -> tokio::task::JoinHandle<()> {
    client.set_background_active(true);
    let client = Arc::clone(client);
    tokio::spawn(async move {
        debug!("poll scheduler started");
        while client.is_running() {
            // Work off a copy of the session id; the lock never spans a
            // network call.
            if let Some(session_id) = client.session_id() {
                background_cycle(&client, &session_id).await;
            }
            tokio::time::sleep(POLL_SLEEP).await;
        }
        debug!("poll scheduler stopped");
    })
}

/// One full scheduler cycle: drain fs, drain cmd, latch an approval,
/// fetch output into shared state.
pub async fn background_cycle(client: &Client, session_id: &str) {
    while handlers::handle_fileop(client).await {}
    while handlers::handle_command(client).await {}
    handlers::poll_approval(client).await;

    let path = format!("/output?session_id={session_id}");
    if let Ok(body) = client.transport.request("GET", &path, None).await {
        if let Ok(response) = serde_json::from_str::<OutputResponse>(&body) {
            if let Some(output) = response.output.filter(|o| !o.is_empty()) {
                client.stash_output(output);
            }
            if response.status.as_deref() == Some("stopped") {
                client.mark_stopped();
            }
        }
    }
}

/// Synchronous-mode poll, run from the input loop's idle tick.  Performs
/// the same work as a scheduler cycle but surfaces output and approvals
/// directly, since no other task will.  Returns `true` when output was
/// printed.
pub async fn sync_poll(client: &Client, prompt: &dyn ApprovalPrompt) -> bool {
    if client.session_id().is_none() {
        return false;
    }

    while handlers::handle_fileop(client).await {}
    while handlers::handle_command(client).await {}
    if handlers::poll_approval(client).await {
        handlers::process_approval(client, prompt).await;
    }

    let Some(session_id) = client.session_id() else {
        return false;
    };
    let path = format!("/output?session_id={session_id}");
    let mut had_output = false;
    if let Ok(body) = client.transport.request("GET", &path, None).await {
        if let Ok(response) = serde_json::from_str::<OutputResponse>(&body) {
            if let Some(output) = response.output.filter(|o| !o.is_empty()) {
                client.transcript.console("\r                              \r");
                client.transcript.print_output(&output);
                had_output = true;
            }
        }
    }
    had_output
}

/// Background-mode check run from the input loop: print output stashed
/// by the scheduler and surface a server-signalled stop.  Returns `true`
/// when anything was surfaced (the caller reprints its prompt).
pub fn consume_pending(client: &Client) -> bool {
    let mut surfaced = false;

    if let Some(output) = client.take_output() {
        client.transcript.console("\r                              \r");
        client.transcript.print_output(&output);
        surfaced = true;
    }

    if client.take_stopped() {
        client.transcript.line("\n[Session ended]");
        surfaced = true;
    }

    surfaced
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
