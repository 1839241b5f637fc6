// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Console output and the user-facing transcript logfile.
//!
//! All user-visible text funnels through here: agent output and errors
//! are mirrored to the logfile when `/log on` is active, progress lines
//! are console-only.  The console writer converts `\n` to `\r\n` while
//! the terminal is in raw mode, so the rest of the codebase can print
//! plain text without caring.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing::warn;

pub struct Transcript {
    path: PathBuf,
    file: Mutex<Option<File>>,
    raw_mode: AtomicBool,
}

impl Transcript {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
            raw_mode: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Tell the console writer whether the terminal is in raw mode.
    pub fn set_raw_mode(&self, raw: bool) {
        self.raw_mode.store(raw, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.file.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    /// Start logging (`/log on`).  Returns `false` when already enabled.
    pub fn enable(&self) -> std::io::Result<bool> {
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if file.is_some() {
            return Ok(false);
        }
        let mut f = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let _ = writeln!(f, "\n=== Session started ===");
        *file = Some(f);
        Ok(true)
    }

    /// Stop logging (`/log off`).  Returns `false` when already disabled.
    pub fn disable(&self) -> bool {
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        match file.take() {
            Some(mut f) => {
                let _ = writeln!(f, "=== Session ended ===\n");
                true
            }
            None => false,
        }
    }

    /// Raw console write, no logfile mirror.  Used for spinner frames and
    /// progress lines.
    pub fn console(&self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        if self.raw_mode.load(Ordering::Relaxed) {
            let _ = stdout.write_all(text.replace('\n', "\r\n").as_bytes());
        } else {
            let _ = stdout.write_all(text.as_bytes());
        }
        let _ = stdout.flush();
    }

    /// Console line with trailing newline, no logfile mirror.
    pub fn line(&self, text: &str) {
        self.console(text);
        self.console("\n");
    }

    /// Agent output: console plus logfile mirror.
    pub fn print_output(&self, text: &str) {
        self.console(text);
        self.mirror(text);
    }

    /// Record a line of user input in the logfile only.
    pub fn log_input(&self, text: &str) {
        self.mirror(&format!("\n> {text}\n"));
    }

    /// User-visible error line, mirrored to the logfile.
    pub fn error(&self, context: &str, message: &str) {
        let line = format!("[Error: {context}: {message}]");
        warn!(context, message, "reported to user");
        self.line(&line);
        self.mirror(&format!("{line}\n"));
    }

    fn mirror(&self, text: &str) {
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(f) = file.as_mut() {
            if f.write_all(text.as_bytes()).and_then(|_| f.flush()).is_err() {
                warn!("transcript write failed");
            }
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
