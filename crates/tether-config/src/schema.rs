// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// Shared secret presented to the proxy on every control-plane request
/// and on both transfer ports.  Deployments that rotate the key override
/// it with `api_key=` in the `[server]` section.
pub const DEFAULT_API_KEY: &str = "a3f8b2d1-7c4e-4a9f-b6e5-2d8c1f0e3a7b";

/// Default control-plane port on the proxy.
pub const DEFAULT_PORT: u16 = 5000;

/// Default proxy address.
pub const DEFAULT_IP: &str = "192.168.2.1";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Proxy host (dotted quad or hostname).
    pub ip: String,
    /// Control-plane port.
    pub port: u16,
    /// Shared secret for the `X-API-Key` header and the transfer ports.
    pub api_key: String,
    /// Auto-approve every tool request instead of prompting.
    pub skip_permissions: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip: DEFAULT_IP.to_string(),
            port: DEFAULT_PORT,
            api_key: DEFAULT_API_KEY.to_string(),
            skip_permissions: false,
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.server.ip, "192.168.2.1");
        assert_eq!(cfg.server.port, 5000);
        assert!(!cfg.server.skip_permissions);
    }
}
