//! Host configuration loaded from environment variables.
//!
//! All settings come from environment variables (or a `.env` file via
//! `dotenvy`). [`HostConfig::default`] yields the same values without
//! reading the environment, which is what tests use.

use std::net::{IpAddr, Ipv4Addr};

/// Default port a listener attaches to when the host gives none.
pub const DEFAULT_PORT: u16 = 8080;

/// Default cap on transport events processed per poll tick.
pub const DEFAULT_POLL_BUDGET: usize = 100;

/// Default number of transport events buffered between polls.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Tunables shared by every server a [`crate::server::Registry`] creates.
#[derive(Debug, Clone, PartialEq)]
pub struct HostConfig {
    /// Interface servers bind to (e.g. `0.0.0.0`).
    pub bind_ip: IpAddr,

    /// Port used by the demo host.
    pub default_port: u16,

    /// Maximum transport events processed by one listener poll.
    pub poll_budget: usize,

    /// Maximum events drained while a server closes.
    pub close_drain_budget: usize,

    /// Scheduler rounds given to the transport runtime per poll.
    pub pump_rounds: usize,

    /// Transport events buffered between polls. When full, connection
    /// tasks stop reading their sockets until the host polls again.
    pub event_capacity: usize,

    /// Separator placed between encoded scalar values.
    pub separator: char,

    /// Milliseconds between ticks of the demo host loop.
    pub tick_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            default_port: DEFAULT_PORT,
            poll_budget: DEFAULT_POLL_BUDGET,
            close_drain_budget: 100,
            pump_rounds: 16,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            separator: ' ',
            tick_ms: 10,
        }
    }
}

impl HostConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is missing or malformed.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `SHARED_WS_BIND_IP` is set but cannot be parsed
    /// as an [`IpAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let bind_ip = match std::env::var("SHARED_WS_BIND_IP") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.bind_ip,
        };

        Ok(Self {
            bind_ip,
            default_port: parse_env("SHARED_WS_PORT", defaults.default_port),
            poll_budget: parse_env("SHARED_WS_POLL_BUDGET", defaults.poll_budget),
            close_drain_budget: parse_env(
                "SHARED_WS_CLOSE_DRAIN_BUDGET",
                defaults.close_drain_budget,
            ),
            pump_rounds: parse_env("SHARED_WS_PUMP_ROUNDS", defaults.pump_rounds),
            event_capacity: parse_env("SHARED_WS_EVENT_CAPACITY", defaults.event_capacity),
            separator: parse_env_char("SHARED_WS_SEPARATOR", defaults.separator),
            tick_ms: parse_env("SHARED_WS_TICK_MS", defaults.tick_ms),
        })
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Reads a single-character environment variable. Anything other than
/// exactly one character yields `default`.
fn parse_env_char(key: &str, default: char) -> char {
    let Ok(raw) = std::env::var(key) else {
        return default;
    };
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        _ => default,
    }
}
