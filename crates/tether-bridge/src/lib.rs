// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The agent bridge runtime.
//!
//! A remote coding agent behind an HTTP proxy issues tool calls —
//! filesystem operations, shell commands, approval requests — and this
//! crate polls for them, executes them locally, and posts results back.
//! Four independent request streams share one endpoint: agent output,
//! approvals, filesystem ops, and commands.  Side-effecting operations
//! are guarded by per-stream idempotency caches so a replayed poll never
//! executes twice, and every remote-supplied path goes through the
//! traversal-safe normalizer before it touches disk.

use std::time::Duration;

pub mod cache;
pub mod handlers;
pub mod path;
pub mod protocol;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod transcript;

#[cfg(test)]
pub(crate) mod testutil;

pub use cache::IdempotencyCache;
pub use path::{build_full_path, convert_slashes, PathError, VirtualPath};
pub use state::{ApprovalPrompt, ApprovalState, Client, KeyProbe, PendingApproval};
pub use transcript::Transcript;

/// Poll cadence of the scheduler and the foreground output loop.
pub const POLL_SLEEP: Duration = Duration::from_millis(1000);

/// Backoff after a failed poll request.
pub const POLL_BACKOFF: Duration = Duration::from_millis(2000);

/// Keyboard sampling cadence of the line editor.
pub const INPUT_SLEEP: Duration = Duration::from_millis(100);

/// In synchronous mode, poll once every this many input-sleep ticks.
pub const POLL_INTERVAL_CYCLES: u32 = 5;

/// Foreground output loop gives up after this many idle cycles.
pub const POLL_TIMEOUT_CYCLES: u32 = 120;

/// Heartbeat cadence while a session is live.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Slots per idempotency cache.
pub const CACHE_SLOTS: usize = 16;

/// Byte cap on a single `read` operation's content.
pub const READ_LIMIT: usize = 64 * 1024;

/// Longest accepted line of user input.
pub const MAX_INPUT: usize = 1024;
