// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Session lifecycle: connect, disconnect, user input, heartbeat, and
//! the foreground output loop that follows a message until the agent
//! goes quiet.

use tracing::debug;

use tether_transport::Transport as _;

use crate::handlers;
use crate::protocol::{
    ErrorResponse, InputRequest, OutputResponse, SessionRef, StartRequest, StartResponse,
};
use crate::state::{ApprovalPrompt, Client, KeyProbe};
use crate::{HEARTBEAT_INTERVAL, POLL_BACKOFF, POLL_SLEEP, POLL_TIMEOUT_CYCLES};

/// Width of the spinner line, for clean overwrites.
const SPINNER_CLEAR: &str = "\r                              \r";
const SPINNER_CHARS: [char; 4] = ['|', '/', '-', '\\'];

/// Start a session (`/connect`).
pub async fn connect(client: &Client, working_dir: Option<&str>) {
    if client.session_id().is_some() {
        client
            .transcript
            .line("[Already connected. Use /disconnect first]");
        return;
    }

    client
        .transcript
        .line(&format!("[Client: {}]", client.host_version));
    client.transcript.line(&format!(
        "[Connecting to {}...]",
        client.transport.endpoint_label()
    ));

    let request = StartRequest {
        working_directory: working_dir.filter(|d| !d.is_empty()).map(str::to_string),
        windows_version: client.host_version.clone(),
    };
    let Ok(body) = serde_json::to_string(&request) else {
        return;
    };

    let response = match client.transport.request("POST", "/start", Some(&body)).await {
        Ok(response) => response,
        Err(e) => {
            client.transcript.error("session", &e.to_string());
            return;
        }
    };

    let Ok(start) = serde_json::from_str::<StartResponse>(&response) else {
        client
            .transcript
            .error("session", "Invalid response from server");
        return;
    };
    if let Some(error) = start.error {
        client.transcript.error("session", &error);
        return;
    }
    let Some(session_id) = start.session_id else {
        client
            .transcript
            .error("session", "No session ID returned");
        return;
    };

    client.open_session(&session_id);
    client
        .transcript
        .line(&format!("[Connected! Session: {session_id}]"));
    client
        .transcript
        .line("[Ready - type a message to start chatting]");
    client.transcript.line("");
}

/// Stop the session (`/disconnect`).  The `/stop` post is best-effort.
pub async fn disconnect(client: &Client) {
    let Some(session_id) = client.session_id() else {
        client.transcript.line("[Not connected]");
        return;
    };

    if let Ok(body) = serde_json::to_string(&SessionRef { session_id }) {
        let _ = client.transport.request("POST", "/stop", Some(&body)).await;
    }

    client.clear_session();
    client.transcript.line("[Disconnected]");
}

/// Post a heartbeat when one is due.
pub async fn heartbeat(client: &Client) {
    let Some(session_id) = client.heartbeat_due(HEARTBEAT_INTERVAL) else {
        return;
    };

    let Ok(body) = serde_json::to_string(&SessionRef { session_id }) else {
        return;
    };
    if client
        .transport
        .request("POST", "/heartbeat", Some(&body))
        .await
        .is_ok()
    {
        client.mark_heartbeat();
    }
}

/// Send a line of user text to the agent, then follow the output until
/// the agent goes idle.
pub async fn send_input(
    client: &Client,
    text: &str,
    keys: &dyn KeyProbe,
    prompt: &dyn ApprovalPrompt,
) {
    let Some(session_id) = client.session_id() else {
        client.transcript.line("[Not connected. Use /connect first]");
        return;
    };

    client.transcript.log_input(text);

    let request = InputRequest {
        session_id,
        text: format!("{text}\n"),
    };
    let Ok(body) = serde_json::to_string(&request) else {
        return;
    };

    match client.transport.request("POST", "/input", Some(&body)).await {
        Ok(response) => {
            if let Ok(parsed) = serde_json::from_str::<ErrorResponse>(&response) {
                if let Some(error) = parsed.error {
                    client.transcript.error("input", &error);
                    return;
                }
            }
        }
        Err(e) => {
            client.transcript.error("input", &e.to_string());
            return;
        }
    }

    poll_output_loop(client, keys, prompt).await;
}

/// One-shot output check (`/poll`).
pub async fn poll_once(client: &Client) {
    let Some(session_id) = client.session_id() else {
        client.transcript.line("[Not connected]");
        return;
    };

    let path = format!("/output?session_id={session_id}");
    match client.transport.request("GET", &path, None).await {
        Ok(body) => {
            let Ok(response) = serde_json::from_str::<OutputResponse>(&body) else {
                return;
            };
            match response.output.as_deref() {
                Some(output) if !output.is_empty() => client.transcript.print_output(output),
                _ => client.transcript.line("[No new output]"),
            }
            if response.status.as_deref() == Some("stopped") {
                client.transcript.line("\n[Session ended]");
                client.clear_session();
            }
        }
        Err(_) => client.transcript.error("poll", "Failed to get output"),
    }
}

/// Agent output that only narrates session bookkeeping, not a reply.
fn is_substantive(output: &str) -> bool {
    !output.starts_with("[Session") && !output.starts_with("[Using tool")
}

/// Follow the conversation until a key interrupts it, the session stops,
/// or idleness exceeds policy: once real output has been seen, two idle
/// cycles end the loop; with no output at all, [`POLL_TIMEOUT_CYCLES`]
/// cycles report a timeout.  A spinner runs until the first substantive
/// output.
pub async fn poll_output_loop(client: &Client, keys: &dyn KeyProbe, prompt: &dyn ApprovalPrompt) {
    let mut idle_count: u32 = 0;
    let mut ever_got_output = false;
    let mut spinner = 0usize;

    while let Some(session_id) = client.session_id() {
        if keys.key_pressed() {
            client.transcript.console(SPINNER_CLEAR);
            client.transcript.line("[Interrupted]");
            break;
        }

        let mut got_output = false;

        if client.background_active() {
            heartbeat(client).await;

            if handlers::process_approval(client, prompt).await {
                continue;
            }

            if let Some(output) = client.take_output() {
                if !ever_got_output {
                    client.transcript.console(SPINNER_CLEAR);
                }
                client.transcript.print_output(&output);
                got_output = true;
                if is_substantive(&output) {
                    ever_got_output = true;
                }
                idle_count = 0;
            }

            if client.take_stopped() {
                client.transcript.line("\n[Session ended]");
                break;
            }
        } else {
            heartbeat(client).await;

            while handlers::handle_fileop(client).await {}
            while handlers::handle_command(client).await {}
            if handlers::poll_approval(client).await {
                handlers::process_approval(client, prompt).await;
            }

            let path = format!("/output?session_id={session_id}");
            match client.transport.request("GET", &path, None).await {
                Ok(body) => {
                    if let Ok(response) = serde_json::from_str::<OutputResponse>(&body) {
                        if let Some(output) =
                            response.output.as_deref().filter(|o| !o.is_empty())
                        {
                            if !ever_got_output {
                                client.transcript.console(SPINNER_CLEAR);
                            }
                            client.transcript.print_output(output);
                            got_output = true;
                            if is_substantive(output) {
                                ever_got_output = true;
                            }
                            idle_count = 0;
                        }
                        if response.status.as_deref() == Some("stopped") {
                            client.transcript.line("\n[Session ended]");
                            client.clear_session();
                            break;
                        }
                    }
                }
                Err(e) => {
                    debug!(error = %e, "output poll failed");
                    tokio::time::sleep(POLL_BACKOFF).await;
                }
            }
        }

        if !ever_got_output {
            client.transcript.console(&format!(
                "\r[{}] Waiting for agent...  ",
                SPINNER_CHARS[spinner % SPINNER_CHARS.len()]
            ));
            spinner += 1;
        }

        if !got_output {
            idle_count += 1;

            if ever_got_output && idle_count >= 2 {
                break;
            }
            if idle_count > POLL_TIMEOUT_CYCLES {
                client.transcript.console(SPINNER_CLEAR);
                client.transcript.line("[Timeout waiting for response]");
                break;
            }
        }

        tokio::time::sleep(POLL_SLEEP).await;
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
