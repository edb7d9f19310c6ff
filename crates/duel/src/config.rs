//! Server configuration.

use std::time::Duration;

use duel_match::MatchTiming;

/// Environment variable the binary reads its bind address from.
pub const BIND_ADDR_ENV: &str = "DUEL_BIND_ADDR";

/// Tunables for a [`DuelServer`](crate::DuelServer).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// How long a new connection has to send its `Handshake`.
    pub handshake_timeout: Duration,
    /// A connection with no inbound frame for this long is dropped.
    pub idle_timeout: Duration,
    /// Period of the `rooms` listing snapshot.
    pub listing_interval: Duration,
    pub timing: MatchTiming,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            handshake_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(30),
            listing_interval: Duration::from_secs(2),
            timing: MatchTiming::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults, with the bind address taken from `DUEL_BIND_ADDR` when set.
    pub fn from_env() -> Self {
        let config = Self::default();
        match std::env::var(BIND_ADDR_ENV) {
            Ok(addr) if !addr.trim().is_empty() => config.with_bind_addr(addr.trim()),
            _ => config,
        }
    }

    pub fn with_bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_listing_interval(mut self, interval: Duration) -> Self {
        self.listing_interval = interval;
        self
    }

    pub fn with_timing(mut self, timing: MatchTiming) -> Self {
        self.timing = timing;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.handshake_timeout, Duration::from_secs(5));
        assert_eq!(config.idle_timeout, Duration::from_secs(30));
        assert_eq!(config.listing_interval, Duration::from_secs(2));
        assert_eq!(config.timing.countdown_from, 3);
    }

    #[test]
    fn test_server_config_builders_chain() {
        let config = ServerConfig::default()
            .with_bind_addr("0.0.0.0:9000")
            .with_idle_timeout(Duration::from_secs(5));
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.idle_timeout, Duration::from_secs(5));
    }
}
