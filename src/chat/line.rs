//! CRLF line framing for the chat connection.

use bytes::{Buf, BytesMut};

use crate::chat::{AccountCredential, Channel};
use crate::error::{Error, Result};

/// Line terminator.
pub const CRLF: &[u8] = b"\r\n";

/// Longest partial line kept while waiting for its CRLF.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Heartbeat request marker.
pub const PING_PREFIX: &str = "PING ";

/// Accumulates inbound bytes and yields complete lines from the front.
#[derive(Debug)]
pub struct LineBuffer {
    buf: BytesMut,
    /// Bytes already searched for CRLF without a match
    scanned: usize,
    max_len: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineBuffer {
    /// Create an empty buffer with the default line limit.
    pub fn new() -> Self {
        Self::with_max_len(MAX_LINE_LEN)
    }

    /// Create an empty buffer with a custom line limit.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
            scanned: 0,
            max_len,
        }
    }

    /// Append freshly read bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Bytes buffered but not yet returned as a line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Take the next complete line, without its CRLF.
    ///
    /// Invalid UTF-8 is replaced rather than rejected. Errors once an
    /// unterminated line grows past the limit.
    pub fn next_line(&mut self) -> Result<Option<String>> {
        // Back up one byte in case the previous chunk ended on '\r'
        let start = self.scanned.saturating_sub(1);

        match self.buf[start..].windows(2).position(|w| w == CRLF) {
            Some(offset) => {
                let end = start + offset;
                let line = String::from_utf8_lossy(&self.buf[..end]).into_owned();
                self.buf.advance(end + CRLF.len());
                self.scanned = 0;
                Ok(Some(line))
            }
            None => {
                if self.buf.len() > self.max_len {
                    return Err(Error::LineTooLong(self.max_len));
                }
                self.scanned = self.buf.len();
                Ok(None)
            }
        }
    }
}

/// The three registration lines, in send order.
pub fn registration_lines(account: &AccountCredential, channel: &Channel) -> [String; 3] {
    [
        format!("PASS oauth:{}\r\n", account.token()),
        format!("NICK {}\r\n", account.username()),
        format!("JOIN #{}\r\n", channel.name()),
    ]
}

/// `PING <x>` → `PONG <x>\r\n`; `None` for every other line.
pub fn heartbeat_reply(line: &str) -> Option<String> {
    line.strip_prefix(PING_PREFIX)
        .map(|payload| format!("PONG {}\r\n", payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_lines() {
        let mut buf = LineBuffer::new();
        buf.extend(b":tmi NOTICE * :hi\r\nPING :tmi\r\npartial");

        assert_eq!(buf.next_line().unwrap().as_deref(), Some(":tmi NOTICE * :hi"));
        assert_eq!(buf.next_line().unwrap().as_deref(), Some("PING :tmi"));
        assert_eq!(buf.next_line().unwrap(), None);
        assert_eq!(buf.pending(), b"partial".len());
    }

    #[test]
    fn test_crlf_split_across_reads() {
        let mut buf = LineBuffer::new();
        buf.extend(b"PING abc\r");
        assert_eq!(buf.next_line().unwrap(), None);

        buf.extend(b"\nnext");
        assert_eq!(buf.next_line().unwrap().as_deref(), Some("PING abc"));
        assert_eq!(buf.next_line().unwrap(), None);

        buf.extend(b"\r\n");
        assert_eq!(buf.next_line().unwrap().as_deref(), Some("next"));
        assert_eq!(buf.pending(), 0);
    }

    #[test]
    fn test_empty_line_and_bare_lf() {
        let mut buf = LineBuffer::new();
        buf.extend(b"\r\na\nb\r\n");
        assert_eq!(buf.next_line().unwrap().as_deref(), Some(""));
        // A lone LF is not a terminator
        assert_eq!(buf.next_line().unwrap().as_deref(), Some("a\nb"));
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut buf = LineBuffer::new();
        buf.extend(b"caf\xff\r\n");
        assert_eq!(buf.next_line().unwrap().as_deref(), Some("caf\u{fffd}"));
    }

    #[test]
    fn test_line_too_long() {
        let mut buf = LineBuffer::with_max_len(8);
        buf.extend(b"0123456789");
        assert!(matches!(buf.next_line(), Err(Error::LineTooLong(8))));
    }

    #[test]
    fn test_heartbeat_reply() {
        assert_eq!(heartbeat_reply("PING abc123").as_deref(), Some("PONG abc123\r\n"));
        assert_eq!(
            heartbeat_reply("PING :tmi.twitch.tv").as_deref(),
            Some("PONG :tmi.twitch.tv\r\n")
        );
        assert_eq!(heartbeat_reply("PING"), None);
        assert_eq!(heartbeat_reply(":server PING x"), None);
        assert_eq!(heartbeat_reply("PONG abc"), None);
    }

    #[test]
    fn test_registration_lines() {
        let account = AccountCredential::new("user1", "abcd").unwrap();
        let channel = Channel::new("foo").unwrap();
        assert_eq!(
            registration_lines(&account, &channel),
            [
                "PASS oauth:abcd\r\n".to_string(),
                "NICK user1\r\n".to_string(),
                "JOIN #foo\r\n".to_string(),
            ]
        );
    }
}
