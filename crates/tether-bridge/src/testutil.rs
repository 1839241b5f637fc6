// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Shared test doubles: a scripted transport, a recording shell backend,
//! and canned UI callbacks.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use tether_shell::{CommandOutput, ShellBackend, ShellError};
use tether_transport::{Transport, TransportError};

use crate::state::{ApprovalPrompt, Client, KeyProbe, PendingApproval};
use crate::transcript::Transcript;

/// Transport double: scripted responses per path (query string ignored),
/// with every request recorded.  Paths with no queued response return
/// `{}`, which every poll parser reads as "nothing pending".
#[derive(Default)]
pub(crate) struct MockTransport {
    responses: Mutex<HashMap<String, VecDeque<Result<String, TransportError>>>>,
    requests: Mutex<Vec<(String, String, Option<String>)>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn enqueue(&self, path: &str, body: &str) {
        self.responses
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(Ok(body.to_string()));
    }

    pub fn enqueue_err(&self, path: &str, err: TransportError) {
        self.responses
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(Err(err));
    }

    /// All `(method, path, body)` requests seen so far.
    pub fn requests(&self) -> Vec<(String, String, Option<String>)> {
        self.requests.lock().unwrap().clone()
    }

    /// Only the POSTs, as `(path, body)`.
    pub fn posts(&self) -> Vec<(String, String)> {
        self.requests()
            .into_iter()
            .filter(|(m, _, _)| m == "POST")
            .map(|(_, p, b)| (p, b.unwrap_or_default()))
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<&str>,
    ) -> Result<String, TransportError> {
        let key = path.split('?').next().unwrap_or(path).to_string();
        self.requests.lock().unwrap().push((
            method.to_string(),
            key.clone(),
            body.map(str::to_string),
        ));
        if let Some(queue) = self.responses.lock().unwrap().get_mut(&key) {
            if let Some(result) = queue.pop_front() {
                return result;
            }
        }
        Ok("{}".to_string())
    }
}

/// Shell double that records invocations and returns a fixed result.
pub(crate) struct MockShell {
    pub calls: Mutex<Vec<(String, Option<PathBuf>)>>,
    pub result: Mutex<Result<CommandOutput, ShellError>>,
}

impl Default for MockShell {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            result: Mutex::new(Ok(CommandOutput {
                output: "hi\n".to_string(),
                exit_code: 0,
            })),
        }
    }
}

impl MockShell {
    pub fn set_result(&self, result: Result<CommandOutput, ShellError>) {
        *self.result.lock().unwrap() = result;
    }

    pub fn calls(&self) -> Vec<(String, Option<PathBuf>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ShellBackend for MockShell {
    async fn run(
        &self,
        command: &str,
        workdir: Option<&Path>,
    ) -> Result<CommandOutput, ShellError> {
        self.calls
            .lock()
            .unwrap()
            .push((command.to_string(), workdir.map(Path::to_path_buf)));
        self.result.lock().unwrap().clone()
    }

    fn program(&self) -> &'static str {
        "mock"
    }
}

/// Keyboard that never reports a keypress.
pub(crate) struct NoKeys;

impl KeyProbe for NoKeys {
    fn key_pressed(&self) -> bool {
        false
    }
}

/// Prompt that answers with a fixed verdict and records what it saw.
pub(crate) struct CannedPrompt {
    pub approve: bool,
    pub seen: Mutex<Vec<PendingApproval>>,
}

impl CannedPrompt {
    pub fn approving() -> Self {
        Self {
            approve: true,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn denying() -> Self {
        Self {
            approve: false,
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl ApprovalPrompt for CannedPrompt {
    fn decide(&self, approval: &PendingApproval) -> bool {
        self.seen.lock().unwrap().push(approval.clone());
        self.approve
    }
}

/// Everything a handler/session test needs, with a temp dir backing the
/// virtual root.
pub(crate) struct Rig {
    pub client: Arc<Client>,
    pub transport: Arc<MockTransport>,
    pub shell: Arc<MockShell>,
    pub dir: tempfile::TempDir,
}

pub(crate) fn rig() -> Rig {
    rig_with(false)
}

pub(crate) fn rig_with(skip_permissions: bool) -> Rig {
    let transport = MockTransport::new();
    let shell = Arc::new(MockShell::default());
    let dir = tempfile::tempdir().unwrap();
    let transcript = Arc::new(Transcript::new(dir.path().join("transcript.log")));
    let client = Client::new(
        transport.clone(),
        shell.clone(),
        transcript,
        dir.path().to_path_buf(),
        "Windows 98",
        skip_permissions,
    );
    Rig {
        client,
        transport,
        shell,
        dir,
    }
}
