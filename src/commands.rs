// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! User command dispatch: everything typed at the prompt that starts
//! with `/`, plus plain text forwarded to the agent.

use std::path::Path;
use std::sync::Arc;

use tether_bridge::state::{Client, KeyProbe};
use tether_bridge::session;
use tether_config::DEFAULT_PORT;
use tether_transfer::TransferClient;
use tether_transport::{HttpClient, Transport as _};

use crate::input::ConsolePrompt;

/// Shared pieces the dispatcher needs beyond the client itself.
pub struct App {
    pub client: Arc<Client>,
    pub http: Arc<HttpClient>,
    pub api_key: String,
}

impl App {
    fn transfer(&self) -> TransferClient {
        let (host, _) = self.http.endpoint();
        TransferClient::new(host, self.api_key.clone())
    }
}

/// Parse `ip[:port]`, defaulting the port.
pub fn parse_server_addr(addr: &str) -> (String, u16) {
    match addr.split_once(':') {
        Some((host, port)) => (
            host.to_string(),
            port.parse().unwrap_or(DEFAULT_PORT),
        ),
        None => (addr.to_string(), DEFAULT_PORT),
    }
}

pub async fn process_input(app: &App, input: &str, keys: &dyn KeyProbe, prompt: &ConsolePrompt) {
    let input = input.trim_end_matches(['\r', '\n']);
    if input.is_empty() {
        return;
    }

    if !input.starts_with('/') {
        session::send_input(&app.client, input, keys, prompt).await;
        return;
    }

    let (command, args) = match input.split_once(' ') {
        Some((command, args)) => (command, args.trim()),
        None => (input, ""),
    };

    match command {
        "/help" => cmd_help(&app.client),
        "/connect" => {
            let dir = (!args.is_empty()).then_some(args);
            session::connect(&app.client, dir).await;
        }
        "/disconnect" => session::disconnect(&app.client).await,
        "/status" => cmd_status(app),
        "/poll" => session::poll_once(&app.client).await,
        "/server" if !args.is_empty() => cmd_server(app, args),
        "/log" => cmd_log(&app.client, args),
        "/clear" => cmd_clear(),
        "/download" => cmd_download(app, args).await,
        "/upload" => cmd_upload(app, args).await,
        "/quit" | "/exit" => {
            if app.client.is_connected() {
                session::disconnect(&app.client).await;
            }
            app.client.shutdown();
        }
        _ => app
            .client
            .transcript
            .line("[Unknown command. Type /help for help]"),
    }
}

fn cmd_help(client: &Client) {
    let t = &client.transcript;
    t.line("");
    t.line("Commands:");
    t.line("  /connect [path]   - Start an agent session");
    t.line("  /disconnect       - End current session");
    t.line("  /poll             - Manually check for output");
    t.line("  /status           - Show connection status");
    t.line("  /server ip:port   - Set server address");
    t.line("  /log [on|off|view]- Logging: on/off or view log file");
    t.line("  /download <remote> <local> - Download file from proxy");
    t.line("  /upload <local> <remote>   - Upload file to proxy");
    t.line("  /clear            - Clear screen");
    t.line("  /quit             - Exit program");
    t.line("");
}

fn cmd_status(app: &App) {
    let t = &app.client.transcript;
    t.line("");
    t.line(&format!("Server: {}", app.http.endpoint_label()));
    if app.client.is_connected() {
        t.line("Status: Connected");
        if let Some(session_id) = app.client.session_id() {
            t.line(&format!("Session: {session_id}"));
        }
    } else {
        t.line("Status: Not connected");
    }
    t.line("");
}

fn cmd_server(app: &App, addr: &str) {
    let (host, port) = parse_server_addr(addr);
    app.http.set_endpoint(host, port);
    app.client
        .transcript
        .line(&format!("[Server set to {}]", app.http.endpoint_label()));
}

fn cmd_log(client: &Client, arg: &str) {
    let t = &client.transcript;
    match arg {
        "" | "on" => match t.enable() {
            Ok(true) => {
                t.line(&format!("[Logging enabled to {}]", t.path().display()));
            }
            Ok(false) => {
                t.line(&format!(
                    "[Logging already enabled to {}]",
                    t.path().display()
                ));
            }
            Err(_) => t.error("log", "Could not open log file"),
        },
        "off" => {
            if t.disable() {
                t.line("[Logging disabled]");
            } else {
                t.line("[Logging already disabled]");
            }
        }
        "view" => match std::fs::read_to_string(t.path()) {
            Ok(contents) => {
                t.line(&format!("[Viewing {}]", t.path().display()));
                t.console(&contents);
                if !contents.ends_with('\n') {
                    t.console("\n");
                }
            }
            Err(_) => t.error("log", "Could not open log file"),
        },
        _ => t.line("[Usage: /log [on|off|view]]"),
    }
}

fn cmd_clear() {
    use crossterm::{cursor::MoveTo, execute, terminal};
    let _ = execute!(
        std::io::stdout(),
        terminal::Clear(terminal::ClearType::All),
        MoveTo(0, 0)
    );
}

async fn cmd_download(app: &App, args: &str) {
    let t = &app.client.transcript;
    let mut parts = args.split_whitespace();
    let (Some(remote), Some(local)) = (parts.next(), parts.next()) else {
        t.line("[Usage: /download <remote_path> <local_path>]");
        t.line("[Example: /download tools/agent.exe C:\\AGENT\\AGENT.EXE]");
        return;
    };

    if let Err(e) = app
        .transfer()
        .download(remote, Path::new(local), |text| t.console(text))
        .await
    {
        t.error("download", &e.to_string());
    }
}

async fn cmd_upload(app: &App, args: &str) {
    let t = &app.client.transcript;
    let mut parts = args.split_whitespace();
    let (Some(local), Some(remote)) = (parts.next(), parts.next()) else {
        t.line("[Usage: /upload <local_path> <remote_path>]");
        t.line("[Example: /upload C:\\MYFILE.TXT myfile.txt]");
        return;
    };

    if let Err(e) = app
        .transfer()
        .upload(Path::new(local), remote, |text| t.console(text))
        .await
    {
        t.error("upload", &e.to_string());
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_addr_with_port() {
        assert_eq!(
            parse_server_addr("10.0.0.5:8080"),
            ("10.0.0.5".to_string(), 8080)
        );
    }

    #[test]
    fn server_addr_without_port_uses_default() {
        assert_eq!(
            parse_server_addr("10.0.0.5"),
            ("10.0.0.5".to_string(), DEFAULT_PORT)
        );
    }

    #[test]
    fn server_addr_with_bad_port_uses_default() {
        assert_eq!(
            parse_server_addr("host:abc"),
            ("host".to_string(), DEFAULT_PORT)
        );
    }
}
