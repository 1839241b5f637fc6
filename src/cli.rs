// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "tether",
    version,
    about = "Terminal client bridging this machine to a remote AI coding agent"
)]
pub struct Cli {
    /// Config file (INI).  Defaults to tether.ini in the working directory.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Proxy address as ip[:port], overriding the config file.
    #[arg(short, long)]
    pub server: Option<String>,

    /// Auto-approve every tool request instead of prompting.
    #[arg(long)]
    pub skip_permissions: bool,

    /// Run without the background scheduler; poll inline from the input
    /// loop instead.
    #[arg(long)]
    pub sync_poll: bool,

    /// Transcript log file used by /log.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Verbose diagnostics on stderr (repeat for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
