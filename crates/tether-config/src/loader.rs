// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::io::ErrorKind;
use std::path::Path;

use anyhow::Context;
use tracing::debug;

use crate::Config;

/// Load configuration from `path`.
///
/// A missing file is not an error: the client runs fine on defaults and
/// the config file is optional on fresh installs.  Any other read failure
/// propagates.
pub fn load(path: &Path) -> anyhow::Result<Config> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };

    debug!(path = %path.display(), "loading config");
    Ok(parse_ini(&text))
}

/// Parse the INI dialect: `[server]` section with `key=value` lines,
/// comments starting with `;` or `#`, unknown keys silently ignored.
///
/// A value is the first whitespace-delimited token after the `=`; trailing
/// junk on the line is dropped, matching what every deployed proxy config
/// has always relied on.
pub fn parse_ini(text: &str) -> Config {
    let mut cfg = Config::default();
    let mut in_server = false;

    for raw in text.lines() {
        let line = raw.trim();

        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') {
            in_server = line.starts_with("[server]");
            continue;
        }

        if !in_server {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let Some(value) = value.trim().split_whitespace().next() else {
            continue;
        };

        match key {
            "ip" => {
                cfg.server.ip = value.to_string();
                debug!(ip = %cfg.server.ip, "config: server ip");
            }
            "port" => {
                if let Ok(port) = value.parse() {
                    cfg.server.port = port;
                    debug!(port = cfg.server.port, "config: server port");
                }
            }
            "api_key" => {
                cfg.server.api_key = value.to_string();
                debug!("config: api key override");
            }
            "skip_permissions" => {
                cfg.server.skip_permissions = value == "true" || value == "1";
                debug!(
                    skip = cfg.server.skip_permissions,
                    "config: skip_permissions"
                );
            }
            _ => {}
        }
    }

    cfg
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_server_section() {
        let cfg = parse_ini("[server]\nip=10.0.0.7\nport=8080\n");
        assert_eq!(cfg.server.ip, "10.0.0.7");
        assert_eq!(cfg.server.port, 8080);
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let cfg = parse_ini("; lead comment\n\n[server]\n# another\nip=1.2.3.4\n");
        assert_eq!(cfg.server.ip, "1.2.3.4");
    }

    #[test]
    fn keys_outside_server_section_are_ignored() {
        let cfg = parse_ini("ip=9.9.9.9\n[other]\nip=8.8.8.8\n[server]\nport=4242\n");
        assert_eq!(cfg.server.ip, "192.168.2.1");
        assert_eq!(cfg.server.port, 4242);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let cfg = parse_ini("[server]\ncolour=mauve\nport=5001\n");
        assert_eq!(cfg.server.port, 5001);
    }

    #[test]
    fn skip_permissions_accepts_true_and_one() {
        assert!(parse_ini("[server]\nskip_permissions=true\n").server.skip_permissions);
        assert!(parse_ini("[server]\nskip_permissions=1\n").server.skip_permissions);
        assert!(!parse_ini("[server]\nskip_permissions=yes\n").server.skip_permissions);
    }

    #[test]
    fn value_stops_at_whitespace() {
        let cfg = parse_ini("[server]\nip=10.1.1.1 trailing junk\n");
        assert_eq!(cfg.server.ip, "10.1.1.1");
    }

    #[test]
    fn whitespace_around_key_is_trimmed() {
        let cfg = parse_ini("[server]\n  port  =  6000\n");
        assert_eq!(cfg.server.port, 6000);
    }

    #[test]
    fn invalid_port_keeps_default() {
        let cfg = parse_ini("[server]\nport=not-a-port\n");
        assert_eq!(cfg.server.port, 5000);
    }

    #[test]
    fn api_key_override() {
        let cfg = parse_ini("[server]\napi_key=sekrit\n");
        assert_eq!(cfg.server.api_key, "sekrit");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = load(Path::new("/tmp/tether_no_such_config_file.ini")).unwrap();
        assert_eq!(cfg.server.port, 5000);
    }

    #[test]
    fn load_reads_file() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[server]\nip=172.16.0.2\nskip_permissions=1").unwrap();
        let cfg = load(f.path()).unwrap();
        assert_eq!(cfg.server.ip, "172.16.0.2");
        assert!(cfg.server.skip_permissions);
    }
}
