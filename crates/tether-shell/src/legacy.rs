// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::backend::{CommandOutput, ShellBackend, ShellError, OUTPUT_LIMIT};

/// Composed command-line buffer on the 9x shell.
const CMDLINE_BUFFER: usize = 2048;
const PREFIX: &str = "command.com /c ";
const REDIRECT: &str = " > ";

/// Shown to the caller when the redirection file cannot be read back.
const CAPTURE_FAILED: &str = "Error: Could not capture output";

/// 9x-generation backend: `command.com /c <command> > <tempfile>`.
///
/// The 9x console subsystem cannot pipe a child's stdout, and stderr
/// capture does not exist at all, so output goes through a temp file that
/// is read back and deleted after the child exits.
pub struct LegacyShell {
    pub output_limit: usize,
}

impl Default for LegacyShell {
    fn default() -> Self {
        Self {
            output_limit: OUTPUT_LIMIT,
        }
    }
}

impl LegacyShell {
    /// Temp file for output redirection: `%TEMP%`, then `%TMP%`, then the
    /// drive root.
    fn temp_file() -> String {
        let dir = resolve_temp_dir(|name| std::env::var(name).ok());
        format!("{dir}\\CMDOUT.TMP")
    }

    fn compose(command: &str, temp_file: &str) -> Result<String, ShellError> {
        let max_command = CMDLINE_BUFFER - PREFIX.len() - REDIRECT.len() - temp_file.len() - 1;
        if command.len() > max_command {
            return Err(ShellError::TooLong);
        }
        // The command text is not escaped: an embedded `>` in it becomes a
        // second redirection and command.com hands the capture file an
        // empty stream.  Known limitation of the 9x capture scheme.
        Ok(format!("{PREFIX}{command}{REDIRECT}{temp_file}"))
    }
}

pub(crate) fn resolve_temp_dir(get: impl Fn(&str) -> Option<String>) -> String {
    get("TEMP")
        .or_else(|| get("TMP"))
        .unwrap_or_else(|| "C:".to_string())
}

#[async_trait]
impl ShellBackend for LegacyShell {
    async fn run(
        &self,
        command: &str,
        workdir: Option<&Path>,
    ) -> Result<CommandOutput, ShellError> {
        let temp_file = Self::temp_file();
        let cmdline = Self::compose(command, &temp_file)?;
        debug!(cmdline = %cmdline, "spawning legacy shell");

        let mut cmd = Command::new("command.com");
        #[cfg(windows)]
        cmd.raw_arg(format!("/c {command}{REDIRECT}{temp_file}"));
        #[cfg(not(windows))]
        cmd.arg("/c").arg(format!("{command}{REDIRECT}{temp_file}"));

        cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
        if let Some(dir) = workdir {
            cmd.current_dir(dir);
        }

        let exit_code = match cmd.status().await {
            Ok(status) => status.code().unwrap_or(-1),
            Err(_) => return Err(ShellError::Spawn),
        };

        let output = match tokio::fs::read(&temp_file).await {
            Ok(mut bytes) => {
                bytes.truncate(self.output_limit);
                let _ = tokio::fs::remove_file(&temp_file).await;
                String::from_utf8_lossy(&bytes).into_owned()
            }
            Err(e) => {
                warn!(temp_file = %temp_file, error = %e, "could not read capture file");
                CAPTURE_FAILED.to_string()
            }
        };

        Ok(CommandOutput { output, exit_code })
    }

    fn program(&self) -> &'static str {
        "command.com"
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
