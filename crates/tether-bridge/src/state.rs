// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Client state.
//!
//! One `Client` value carries everything the handlers, the session layer
//! and the scheduler share.  Mutable session state sits behind a single
//! mutex with short, copy-out critical sections; the lock is never held
//! across a network call.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tether_shell::ShellBackend;
use tether_transport::Transport;

use crate::cache::IdempotencyCache;
use crate::transcript::Transcript;
use crate::CACHE_SLOTS;

/// An approval request staged for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingApproval {
    pub approval_id: String,
    pub tool_name: String,
    pub tool_input: String,
}

/// The approval state machine.
///
/// `Idle → Latched → Prompting → Idle`; latching is only legal from
/// `Idle`, which is what stops a repeated server poll from staging the
/// same approval twice while the user is still deciding.
#[derive(Debug, Default)]
pub enum ApprovalState {
    #[default]
    Idle,
    Latched(PendingApproval),
    Prompting,
}

#[derive(Debug, Default)]
pub struct SessionState {
    pub session_id: Option<String>,
    pub connected: bool,
    pub session_stopped: bool,
    pub pending_output: Option<String>,
    pub approval: ApprovalState,
    pub last_heartbeat: Option<Instant>,
}

/// Non-blocking keyboard probe, supplied by the UI layer.
pub trait KeyProbe: Send + Sync {
    /// Consume a pending keypress, if any.
    fn key_pressed(&self) -> bool;
}

/// User-interaction half of an approval: show the request, return the
/// verdict.  Supplied by the UI layer.
pub trait ApprovalPrompt: Send + Sync {
    fn decide(&self, approval: &PendingApproval) -> bool;
}

pub struct Client {
    pub transport: Arc<dyn Transport>,
    pub shell: Arc<dyn ShellBackend>,
    pub transcript: Arc<Transcript>,

    /// Local directory backing the virtual `C:\` root for fs operations.
    pub fs_root: PathBuf,
    /// Host description reported in `/start`.
    pub host_version: String,

    session: Mutex<SessionState>,
    pub fs_cache: Mutex<IdempotencyCache>,
    pub cmd_cache: Mutex<IdempotencyCache>,

    running: AtomicBool,
    skip_permissions: AtomicBool,
    background_active: AtomicBool,
}

impl Client {
    pub fn new(
        transport: Arc<dyn Transport>,
        shell: Arc<dyn ShellBackend>,
        transcript: Arc<Transcript>,
        fs_root: PathBuf,
        host_version: impl Into<String>,
        skip_permissions: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            transport,
            shell,
            transcript,
            fs_root,
            host_version: host_version.into(),
            session: Mutex::new(SessionState::default()),
            fs_cache: Mutex::new(IdempotencyCache::new("fs", CACHE_SLOTS)),
            cmd_cache: Mutex::new(IdempotencyCache::new("cmd", CACHE_SLOTS)),
            running: AtomicBool::new(true),
            skip_permissions: AtomicBool::new(skip_permissions),
            background_active: AtomicBool::new(false),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── Run / mode flags ──────────────────────────────────────────────────────

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn skip_permissions(&self) -> bool {
        self.skip_permissions.load(Ordering::Relaxed)
    }

    pub fn set_background_active(&self, active: bool) {
        self.background_active.store(active, Ordering::SeqCst);
    }

    /// Whether the background scheduler owns polling (vs. the synchronous
    /// fallback run from the input loop).
    pub fn background_active(&self) -> bool {
        self.background_active.load(Ordering::SeqCst)
    }

    // ── Session identity ──────────────────────────────────────────────────────

    /// Copy of the current session id, taken under the lock.  Callers use
    /// the copy for network requests so the lock never spans a call.
    pub fn session_id(&self) -> Option<String> {
        self.lock().session_id.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    pub fn open_session(&self, id: impl Into<String>) {
        let mut s = self.lock();
        s.session_id = Some(id.into());
        s.connected = true;
        s.session_stopped = false;
        s.last_heartbeat = Some(Instant::now());
    }

    /// Drop the session identity and connection flag together.
    pub fn clear_session(&self) {
        let mut s = self.lock();
        s.session_id = None;
        s.connected = false;
    }

    // ── Heartbeat bookkeeping ─────────────────────────────────────────────────

    pub fn heartbeat_due(&self, interval: std::time::Duration) -> Option<String> {
        let s = self.lock();
        let id = s.session_id.clone()?;
        match s.last_heartbeat {
            Some(last) if last.elapsed() < interval => None,
            _ => Some(id),
        }
    }

    pub fn mark_heartbeat(&self) {
        self.lock().last_heartbeat = Some(Instant::now());
    }

    /// Pretend the last heartbeat happened `by` ago.
    #[cfg(test)]
    pub(crate) fn rewind_heartbeat(&self, by: std::time::Duration) {
        self.lock().last_heartbeat = Instant::now().checked_sub(by);
    }

    // ── Pending output ────────────────────────────────────────────────────────

    pub fn stash_output(&self, text: String) {
        self.lock().pending_output = Some(text);
    }

    pub fn take_output(&self) -> Option<String> {
        self.lock().pending_output.take()
    }

    pub fn mark_stopped(&self) {
        self.lock().session_stopped = true;
    }

    /// Consume a server-signalled stop: clears the stop flag and the
    /// session identity in one critical section.
    pub fn take_stopped(&self) -> bool {
        let mut s = self.lock();
        if !s.session_stopped {
            return false;
        }
        s.session_stopped = false;
        s.session_id = None;
        s.connected = false;
        true
    }

    // ── Approval state machine ────────────────────────────────────────────────

    /// `Idle → Latched`.  Refused (returning `false`) in any other state.
    pub fn latch_approval(&self, approval: PendingApproval) -> bool {
        let mut s = self.lock();
        match s.approval {
            ApprovalState::Idle => {
                s.approval = ApprovalState::Latched(approval);
                true
            }
            _ => false,
        }
    }

    /// `Latched → Prompting`, handing the record to the UI.
    pub fn take_approval(&self) -> Option<PendingApproval> {
        let mut s = self.lock();
        match std::mem::replace(&mut s.approval, ApprovalState::Prompting) {
            ApprovalState::Latched(approval) => Some(approval),
            other => {
                // Not latched: put the original state back.
                s.approval = other;
                None
            }
        }
    }

    /// `Prompting → Idle`.
    pub fn finish_approval(&self) {
        let mut s = self.lock();
        if matches!(s.approval, ApprovalState::Prompting) {
            s.approval = ApprovalState::Idle;
        }
    }

    pub fn approval_idle(&self) -> bool {
        matches!(self.lock().approval, ApprovalState::Idle)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
