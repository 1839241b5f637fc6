// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use tracing::info;

use crate::{LegacyShell, ModernShell, ShellBackend};

/// Which process backend the host needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostGeneration {
    /// NT lineage (2000/XP and later): `cmd.exe` with working pipes.
    Modern,
    /// 9x lineage (95/98/ME): `command.com`, temp-file capture only.
    Legacy,
}

#[derive(Debug, Clone)]
pub struct HostInfo {
    /// Human-readable host description, reported to the proxy in `/start`.
    pub version: String,
    pub generation: HostGeneration,
}

/// Probe the host once at startup.
pub fn detect() -> HostInfo {
    let info = os_info::get();

    if cfg!(windows) {
        if let os_info::Version::Semantic(major, minor, build) = info.version() {
            return HostInfo {
                version: describe_windows(*major, *minor, *build),
                generation: if *major >= 5 {
                    HostGeneration::Modern
                } else {
                    HostGeneration::Legacy
                },
            };
        }
    }

    // Non-Windows hosts (development) and unparseable versions run the
    // modern backend; the proxy only uses the string for display.
    HostInfo {
        version: format!("{} {}", info.os_type(), info.version()),
        generation: HostGeneration::Modern,
    }
}

/// Map a Windows version triple to its marketing name.
fn describe_windows(major: u64, minor: u64, build: u64) -> String {
    match (major, minor) {
        (4, 0) => "Windows 95".to_string(),
        (4, 10) => "Windows 98".to_string(),
        (4, 90) => "Windows ME".to_string(),
        (5, 0) => format!("Windows 2000 (Build {build})"),
        (5, 1) => format!("Windows XP (Build {build})"),
        (5, 2) => format!("Windows Server 2003 (Build {build})"),
        (6, 0) => format!("Windows Vista (Build {build})"),
        (6, 1) => format!("Windows 7 (Build {build})"),
        _ => format!("Windows {major}.{minor} (Build {build})"),
    }
}

/// Instantiate the backend for the probed generation.
pub fn select_backend(generation: HostGeneration) -> Arc<dyn ShellBackend> {
    match generation {
        HostGeneration::Modern => {
            info!("shell backend: cmd.exe (pipe capture)");
            Arc::new(ModernShell::default())
        }
        HostGeneration::Legacy => {
            info!("shell backend: command.com (temp-file capture)");
            Arc::new(LegacyShell::default())
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
