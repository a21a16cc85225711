/*!
 * Teleport Configuration
 *
 * Runtime configuration for endpoint sockets
 */

use super::limits::DEFAULT_BIND_HOST;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::warn;

/// Socket configuration shared by receivers and senders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeleportConfig {
    /// Interface receivers bind to
    pub bind_host: Ipv4Addr,
    /// Disable Nagle on connected sockets
    pub tcp_nodelay: bool,
    /// Bound on sender connect; `None` blocks until the OS gives up
    pub connect_timeout: Option<Duration>,
}

impl Default for TeleportConfig {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_BIND_HOST,
            tcp_nodelay: false,
            connect_timeout: None,
        }
    }
}

impl TeleportConfig {
    /// Configuration for tests and single-host setups: loopback only, low latency
    pub const fn loopback() -> Self {
        Self {
            bind_host: Ipv4Addr::LOCALHOST,
            tcp_nodelay: true,
            connect_timeout: None,
        }
    }

    /// Build a configuration from the environment, falling back to defaults
    ///
    /// Environment variables:
    /// - TELEPORT_BIND_HOST: IPv4 address receivers bind to (default: 0.0.0.0)
    /// - TELEPORT_NODELAY: Enable TCP_NODELAY (default: false)
    /// - TELEPORT_CONNECT_TIMEOUT_MS: Sender connect timeout (default: none)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("TELEPORT_BIND_HOST") {
            match host.parse() {
                Ok(addr) => config.bind_host = addr,
                Err(e) => warn!(host = %host, error = %e, "Ignoring invalid TELEPORT_BIND_HOST"),
            }
        }

        config.tcp_nodelay = std::env::var("TELEPORT_NODELAY")
            .map(|v| v == "1" || v == "true")
            .unwrap_or(config.tcp_nodelay);

        if let Ok(ms) = std::env::var("TELEPORT_CONNECT_TIMEOUT_MS") {
            match ms.parse::<u64>() {
                Ok(ms) if ms > 0 => config.connect_timeout = Some(Duration::from_millis(ms)),
                Ok(_) => config.connect_timeout = None,
                Err(e) => warn!(value = %ms, error = %e, "Ignoring invalid TELEPORT_CONNECT_TIMEOUT_MS"),
            }
        }

        config
    }

    pub fn with_bind_host(mut self, host: Ipv4Addr) -> Self {
        self.bind_host = host;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Address used to reach a receiver bound with this configuration from the same host
    pub(crate) fn local_contact_host(&self) -> Ipv4Addr {
        if self.bind_host.is_unspecified() {
            Ipv4Addr::LOCALHOST
        } else {
            self.bind_host
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TeleportConfig::default();
        assert!(!config.tcp_nodelay);
        assert!(config.bind_host.is_unspecified());
        assert_eq!(config.connect_timeout, None);
    }

    #[test]
    fn test_local_contact_host() {
        assert_eq!(
            TeleportConfig::default().local_contact_host(),
            Ipv4Addr::LOCALHOST
        );
        let config = TeleportConfig::default().with_bind_host(Ipv4Addr::new(10, 0, 0, 7));
        assert_eq!(config.local_contact_host(), Ipv4Addr::new(10, 0, 0, 7));
    }
}
