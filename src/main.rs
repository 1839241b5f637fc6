// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;
mod commands;
mod input;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use tether_bridge::{scheduler, Client, Transcript};
use tether_config::{CONFIG_FILE, LOG_FILE};
use tether_transport::{HttpClient, Transport as _};

use cli::Cli;
use commands::App;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Mirrors the old exit contract: nothing runs without a working
    // network runtime.
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("[Error: Failed to initialize network runtime: {e}]");
            return ExitCode::from(1);
        }
    };

    runtime.block_on(run(cli));
    ExitCode::SUCCESS
}

async fn run(cli: Cli) {
    let config_path = cli.config.clone().unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let config = match tether_config::load(&config_path) {
        Ok(config) => {
            if config_path.is_file() {
                println!("[Loading config from {}]", config_path.display());
            }
            config
        }
        Err(e) => {
            eprintln!("[Error: config: {e}]");
            tether_config::Config::default()
        }
    };

    let (mut host, mut port) = (config.server.ip.clone(), config.server.port);
    if let Some(addr) = &cli.server {
        (host, port) = commands::parse_server_addr(addr);
    }
    let skip_permissions = cli.skip_permissions || config.server.skip_permissions;

    let host_info = tether_shell::detect();
    let shell = tether_shell::select_backend(host_info.generation);
    let http = Arc::new(HttpClient::new(host, port, config.server.api_key.clone()));
    let transcript = Arc::new(Transcript::new(
        cli.log_file.clone().unwrap_or_else(|| PathBuf::from(LOG_FILE)),
    ));

    let fs_root = fs_root();
    let client = Client::new(
        http.clone(),
        shell,
        transcript.clone(),
        fs_root,
        host_info.version,
        skip_permissions,
    );

    print_banner(&transcript, &http.endpoint_label());

    let raw = crossterm::terminal::enable_raw_mode().is_ok();
    transcript.set_raw_mode(raw);

    let scheduler_handle = if cli.sync_poll {
        transcript.line("[Note: Using synchronous polling mode]");
        None
    } else {
        Some(scheduler::spawn(&client))
    };

    let app = App {
        client: client.clone(),
        http,
        api_key: config.server.api_key,
    };
    let keys = input::Keys;
    let prompt = input::ConsolePrompt {
        transcript: transcript.clone(),
    };

    while client.is_running() {
        let line = input::read_line(&app, &prompt).await;
        if !line.is_empty() {
            commands::process_input(&app, &line, &keys, &prompt).await;
        }
    }

    // Cooperative shutdown: the scheduler notices `running` at its next
    // sleep boundary; per-call timeouts bound any in-flight request.
    client.shutdown();
    if let Some(handle) = scheduler_handle {
        let _ = handle.await;
    }
    transcript.disable();

    if raw {
        let _ = crossterm::terminal::disable_raw_mode();
    }
}

fn print_banner(transcript: &Transcript, endpoint: &str) {
    transcript.line("==================================================");
    transcript.line("  Tether - remote agent client for legacy Windows");
    transcript.line("  Type /help for commands");
    transcript.line("==================================================");
    transcript.line("");
    transcript.line(&format!("Server: {endpoint}"));
    transcript.line("Status: Not connected. Type /connect to start.");
    transcript.line("");
}

/// Local directory backing the virtual `C:\` root.
fn fs_root() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("C:\\")
    } else {
        // Development hosts serve the working directory instead of `/`.
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }
}

/// Diagnostics policy: the console is an interactive raw-mode surface,
/// so tracing output is suppressed unless it goes to a file
/// (TETHER_LOG_FILE) or the caller explicitly asks for stderr noise
/// with --verbose.
fn init_logging(verbosity: u8) {
    if let Ok(log_path) = std::env::var("TETHER_LOG_FILE") {
        use std::sync::Mutex;
        if let Ok(file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
        {
            let filter =
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
            let _ = tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .with(filter)
                .try_init();
            return;
        }
    }

    if verbosity == 0 {
        let _ = tracing_subscriber::registry()
            .with(tracing_subscriber::filter::LevelFilter::OFF)
            .try_init();
        return;
    }

    let level = match verbosity {
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
