//! Error types for chatswarm.

use thiserror::Error;

/// Result type alias for chatswarm operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while dialing, tunneling, or running sessions.
#[derive(Error, Debug)]
pub enum Error {
    /// Every resolved address refused the connection, or none resolved
    #[error("cannot connect to {host}:{port}")]
    Connection { host: String, port: u16 },

    /// Proxy replied with a different protocol version
    #[error("SOCKS5 version mismatch: expected {expected:#04x}, got {actual:#04x}")]
    VersionMismatch { expected: u8, actual: u8 },

    /// Proxy selected a method we did not offer or do not implement
    #[error("SOCKS5 unsupported method: {0:#04x}")]
    UnsupportedMethod(u8),

    /// Username/password sub-negotiation was rejected
    #[error("SOCKS5 authentication failed: {0:02x?}")]
    AuthenticationFailed([u8; 2]),

    /// Connect request answered with a non-success status
    #[error("SOCKS5 request failed: {} ({:#04x})", reply_status_name(.status), .status)]
    RequestFailed { status: u8 },

    /// Bound address type outside IPv4/domain/IPv6
    #[error("SOCKS5 unknown address type: {0:#04x}")]
    UnknownAddressType(u8),

    /// Peer sent a line longer than the read buffer allows
    #[error("line exceeds {0} bytes without CRLF")]
    LineTooLong(usize),

    /// Record did not match the expected shape
    #[error("invalid format: {0}")]
    Format(String),

    /// Network I/O error
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Session task panicked before producing a report
    #[error("session task panicked")]
    SessionPanicked,
}

impl Error {
    /// Create a new format error
    pub fn format(msg: impl Into<String>) -> Self {
        Error::Format(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Check if this error is a tunnel or chat protocol violation
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Error::VersionMismatch { .. }
                | Error::UnsupportedMethod(_)
                | Error::AuthenticationFailed(_)
                | Error::RequestFailed { .. }
                | Error::UnknownAddressType(_)
                | Error::LineTooLong(_)
        )
    }

    /// Check if this error means the proxy could not be reached at all
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection { .. })
    }

    /// Check if this error came from parsing an account or proxy record
    pub fn is_format_error(&self) -> bool {
        matches!(self, Error::Format(_))
    }
}

/// RFC 1928 names for connect reply codes.
fn reply_status_name(status: &u8) -> &'static str {
    match *status {
        0x01 => "general SOCKS server failure",
        0x02 => "connection not allowed by ruleset",
        0x03 => "network unreachable",
        0x04 => "host unreachable",
        0x05 => "connection refused",
        0x06 => "TTL expired",
        0x07 => "command not supported",
        0x08 => "address type not supported",
        _ => "unassigned",
    }
}
