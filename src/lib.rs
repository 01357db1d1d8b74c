//! # chatswarm
//!
//! Runs many independent chat sessions, each through its own SOCKS5 proxy.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Swarm (cyclic proxy assignment, paced launches, join)  │
//! ├─────────────────────────────────────────────────────────┤
//! │  SessionWorker (PASS/NICK/JOIN, PING → PONG read loop)  │
//! ├─────────────────────────────────────────────────────────┤
//! │  SOCKS5 Handshake (method, user/pass, CONNECT)          │
//! ├─────────────────────────────────────────────────────────┤
//! │  Dialer (resolve, try each address)                     │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Every session owns exactly one TCP connection and fails alone: a proxy
//! that refuses, a rejected login, or a dropped connection ends that session
//! and nothing else. There is no retry and no reconnection.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod chat;
pub mod error;
pub mod proxy;
pub mod swarm;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{Error, Result};

/// Port assumed for proxy records that omit one
pub const DEFAULT_PROXY_PORT: u16 = 1080;

/// Chat service the sessions register with
pub const DEFAULT_DESTINATION_HOST: &str = "irc.chat.twitch.tv";

/// Plain-text IRC port
pub const DEFAULT_DESTINATION_PORT: u16 = 6667;

/// Pause between session launches (milliseconds)
pub const DEFAULT_LAUNCH_DELAY_MS: u64 = 500;

/// Where the tunnels ultimately lead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Hostname, resolved by the proxy
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl Destination {
    /// Create a destination.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for Destination {
    fn default() -> Self {
        Self::new(DEFAULT_DESTINATION_HOST, DEFAULT_DESTINATION_PORT)
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
