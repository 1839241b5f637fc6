// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Keyboard plumbing: the character-at-a-time line editor, the
//! non-blocking key probe used to interrupt output polling, and the
//! console approval prompt.

use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};

use tether_bridge::state::{ApprovalPrompt, KeyProbe, PendingApproval};
use tether_bridge::{handlers, scheduler, Transcript, INPUT_SLEEP, MAX_INPUT, POLL_INTERVAL_CYCLES};

use crate::commands::App;

/// Crossterm-backed key probe: consumes one pending event, reports
/// whether it was a keypress.
pub struct Keys;

impl KeyProbe for Keys {
    fn key_pressed(&self) -> bool {
        match event::poll(Duration::ZERO) {
            Ok(true) => matches!(
                event::read(),
                Ok(Event::Key(k)) if k.kind != KeyEventKind::Release
            ),
            _ => false,
        }
    }
}

/// Block until a character key is pressed.  Non-character keys answer a
/// y/n question with "no".
fn wait_for_char() -> char {
    loop {
        if let Ok(true) = event::poll(Duration::from_millis(100)) {
            match event::read() {
                Ok(Event::Key(k)) if k.kind != KeyEventKind::Release => match k.code {
                    KeyCode::Char(c) => return c,
                    KeyCode::Esc | KeyCode::Enter => return 'n',
                    _ => {}
                },
                _ => {}
            }
        }
    }
}

/// Interactive approval prompt.
pub struct ConsolePrompt {
    pub transcript: Arc<Transcript>,
}

impl ApprovalPrompt for ConsolePrompt {
    fn decide(&self, approval: &PendingApproval) -> bool {
        let t = &self.transcript;
        t.line("");
        t.line("========================================");
        t.line("  TOOL APPROVAL REQUIRED");
        t.line("========================================");
        t.line(&format!("Tool: {}", approval.tool_name));
        if !approval.tool_input.is_empty() {
            t.line(&format!("Input: {}", approval.tool_input));
        }
        t.line("----------------------------------------");
        t.console("Allow this tool? (Y/N): ");

        let key = wait_for_char();
        t.line(&key.to_string());
        matches!(key, 'y' | 'Y')
    }
}

/// Read one line of input, polling for agent activity while idle.
///
/// With the background scheduler running, every idle tick surfaces
/// pending approvals and stashed output.  In synchronous mode the full
/// poll cycle runs inline every [`POLL_INTERVAL_CYCLES`] ticks.  Either
/// way the prompt is reprinted after anything interrupts it.
pub async fn read_line(app: &App, prompt: &ConsolePrompt) -> String {
    let client = &app.client;
    let transcript = &client.transcript;
    let mut buf = String::new();
    let mut prompted = false;
    let mut poll_counter = 0u32;

    while client.is_running() {
        if !prompted {
            transcript.console("> ");
            prompted = true;
        }

        if client.background_active() {
            if handlers::process_approval(client, prompt).await {
                prompted = false;
            }
            if scheduler::consume_pending(client) {
                prompted = false;
            }
        } else {
            poll_counter += 1;
            if poll_counter >= POLL_INTERVAL_CYCLES {
                poll_counter = 0;
                if scheduler::sync_poll(client, prompt).await {
                    prompted = false;
                }
            }
        }

        let has_event = event::poll(Duration::ZERO).unwrap_or(false);
        if !has_event {
            tokio::time::sleep(INPUT_SLEEP).await;
            continue;
        }

        let Ok(Event::Key(key)) = event::read() else {
            continue;
        };
        if key.kind == KeyEventKind::Release {
            continue;
        }

        match key.code {
            KeyCode::Enter => {
                transcript.console("\n");
                return buf;
            }
            KeyCode::Backspace => {
                if buf.pop().is_some() {
                    transcript.console("\u{8} \u{8}");
                }
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                transcript.console("\n");
                transcript.line("[Use /quit to exit]");
                buf.clear();
                prompted = false;
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                if (c.is_ascii_graphic() || c == ' ') && buf.len() < MAX_INPUT - 1 {
                    buf.push(c);
                    transcript.console(&c.to_string());
                }
            }
            _ => {}
        }
    }

    String::new()
}
