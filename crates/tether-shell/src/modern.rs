// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::debug;

use crate::backend::{push_capped, CommandOutput, ShellBackend, ShellError, OUTPUT_LIMIT};

/// Composed command-line buffer on the NT shell.
const CMDLINE_BUFFER: usize = 1024;
const PREFIX: &str = "cmd.exe /c ";
const SUFFIX: &str = " 2>&1";

/// Longest raw command that still fits the composed line.
pub const MAX_COMMAND: usize = CMDLINE_BUFFER - PREFIX.len() - SUFFIX.len() - 1;

/// NT-generation backend: `cmd.exe /c <command> 2>&1` with a stdout pipe.
pub struct ModernShell {
    pub output_limit: usize,
}

impl Default for ModernShell {
    fn default() -> Self {
        Self {
            output_limit: OUTPUT_LIMIT,
        }
    }
}

impl ModernShell {
    fn compose(command: &str) -> Result<String, ShellError> {
        if command.len() > MAX_COMMAND {
            return Err(ShellError::TooLong);
        }
        Ok(format!("{PREFIX}{command}{SUFFIX}"))
    }
}

#[async_trait]
impl ShellBackend for ModernShell {
    async fn run(
        &self,
        command: &str,
        workdir: Option<&Path>,
    ) -> Result<CommandOutput, ShellError> {
        let cmdline = Self::compose(command)?;
        debug!(cmdline = %cmdline, "spawning modern shell");

        let mut cmd = Command::new("cmd.exe");
        // cmd.exe has its own quoting rules; the composed tail must reach
        // it as a single unparsed string.
        #[cfg(windows)]
        cmd.raw_arg(format!("/c {command} 2>&1"));
        #[cfg(not(windows))]
        cmd.arg("/c").arg(format!("{command} 2>&1"));

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = workdir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|_| ShellError::Spawn)?;
        let mut stdout = child.stdout.take().ok_or(ShellError::Spawn)?;

        // Stream to EOF even once the cap is hit, so the child never
        // stalls on a full pipe waiting for a reader that gave up.
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            match stdout.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    push_capped(&mut buf, &chunk[..n], self.output_limit);
                }
            }
        }

        let exit_code = match child.wait().await {
            Ok(status) => status.code().unwrap_or(-1),
            Err(_) => -1,
        };

        Ok(CommandOutput {
            output: String::from_utf8_lossy(&buf).into_owned(),
            exit_code,
        })
    }

    fn program(&self) -> &'static str {
        "cmd.exe"
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_merges_stderr() {
        let line = ModernShell::compose("dir C:\\").unwrap();
        assert_eq!(line, "cmd.exe /c dir C:\\ 2>&1");
    }

    #[test]
    fn command_at_limit_is_accepted() {
        let cmd = "x".repeat(MAX_COMMAND);
        assert!(ModernShell::compose(&cmd).is_ok());
    }

    #[test]
    fn command_over_limit_is_rejected() {
        let cmd = "x".repeat(MAX_COMMAND + 1);
        assert_eq!(ModernShell::compose(&cmd), Err(ShellError::TooLong));
    }

    #[cfg(windows)]
    #[tokio::test]
    async fn echo_round_trip() {
        let shell = ModernShell::default();
        let out = shell.run("echo hi", None).await.unwrap();
        assert_eq!(out.exit_code, 0);
        assert!(out.output.contains("hi"));
    }

    #[cfg(windows)]
    #[tokio::test]
    async fn workdir_is_honoured() {
        let shell = ModernShell::default();
        let out = shell.run("cd", Some(Path::new("C:\\"))).await.unwrap();
        assert!(out.output.trim_end().ends_with("C:\\"));
    }
}
