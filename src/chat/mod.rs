//! Chat-side records and line protocol.
//!
//! Registration is three lines sent right after the tunnel opens:
//!
//! ```text
//! PASS oauth:<token>
//! NICK <username>
//! JOIN #<channel>
//! ```
//!
//! After that the only inbound traffic acted on is `PING`.

pub mod account;
pub mod line;

pub use account::{AccountCredential, RecordShape};
pub use line::{heartbeat_reply, registration_lines, LineBuffer};

use std::fmt;

use crate::error::{Error, Result};

/// A channel name, stored without the leading `#`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel(String);

impl Channel {
    /// Normalize user input: trims whitespace and one leading `#`.
    pub fn new(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let name = trimmed.strip_prefix('#').unwrap_or(trimmed);

        if name.is_empty() {
            return Err(Error::config("channel name cannot be empty"));
        }
        if name.chars().any(|c| c.is_whitespace() || c.is_control() || c == ',') {
            return Err(Error::config(format!("invalid channel name: {}", name)));
        }
        Ok(Self(name.to_string()))
    }

    /// Name without the `#`.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
