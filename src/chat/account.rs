//! Chat account records.
//!
//! Grammar:
//!
//! ```text
//! record        = username ":" "oauth" ":" token              ; Canonical
//!               / username 1*( ":" "oauth" ) ":" "oauth" ":" token  ; RepeatedOauth
//! ```
//!
//! The second form is what a doubled `oauth:` prefix pasted into a record
//! produces. Nothing else is accepted.

use std::fmt;
use std::str::FromStr;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

const OAUTH: &str = "oauth";

/// Which grammar variant a record matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordShape {
    /// `username:oauth:token`
    Canonical,
    /// `username:oauth:oauth[:oauth...]:token`
    RepeatedOauth,
}

/// Login name and OAuth token for one chat account.
///
/// The token is zeroized on drop and never shown by `Debug`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct AccountCredential {
    username: String,
    token: String,
}

impl AccountCredential {
    /// Build a credential from already-split parts.
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let account = Self {
            username: username.into(),
            token: token.into(),
        };
        validate_field(&account.username, "username")?;
        validate_field(&account.token, "token")?;
        Ok(account)
    }

    /// Parse a record and report which variant it matched.
    pub fn parse_with_shape(record: &str) -> Result<(Self, RecordShape)> {
        let fields: Vec<&str> = record.trim().split(':').collect();
        if fields.len() < 3 {
            return Err(Error::format(format!(
                "expected username:oauth:token, got {} field(s)",
                fields.len()
            )));
        }

        let interior = &fields[1..fields.len() - 1];
        if interior.iter().any(|field| *field != OAUTH) {
            return Err(Error::format("missing oauth segment in account record"));
        }

        let shape = if interior.len() == 1 {
            RecordShape::Canonical
        } else {
            RecordShape::RepeatedOauth
        };

        let account = Self::new(fields[0], fields[fields.len() - 1])?;
        Ok((account, shape))
    }

    /// Login name, used for `NICK`.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Bare OAuth token.
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl FromStr for AccountCredential {
    type Err = Error;

    fn from_str(record: &str) -> Result<Self> {
        Self::parse_with_shape(record).map(|(account, _)| account)
    }
}

impl fmt::Debug for AccountCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountCredential")
            .field("username", &self.username)
            .field("token", &"***")
            .finish()
    }
}

fn validate_field(value: &str, what: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::format(format!("account {} cannot be empty", what)));
    }
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::format(format!(
            "account {} contains whitespace or control characters",
            what
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical() {
        let (account, shape) = AccountCredential::parse_with_shape("user1:oauth:abcd").unwrap();
        assert_eq!(account.username(), "user1");
        assert_eq!(account.token(), "abcd");
        assert_eq!(shape, RecordShape::Canonical);
    }

    #[test]
    fn test_parse_repeated_oauth() {
        let (account, shape) = AccountCredential::parse_with_shape("a:oauth:oauth:tok").unwrap();
        assert_eq!(account.username(), "a");
        assert_eq!(account.token(), "tok");
        assert_eq!(shape, RecordShape::RepeatedOauth);

        let account: AccountCredential = "a:oauth:oauth:oauth:tok".parse().unwrap();
        assert_eq!(account.token(), "tok");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let account: AccountCredential = "  bob:oauth:xyz \r\n".parse().unwrap();
        assert_eq!(account.username(), "bob");
        assert_eq!(account.token(), "xyz");
    }

    #[test]
    fn test_parse_rejects() {
        for record in [
            "",
            "user",
            "user:token",
            "user:notoauth:tok",
            "a:b:c:d",
            "a:oauth:tok:extra",
            "a:oauth:",
            ":oauth:tok",
            "a:oauth:oauth:",
            "a b:oauth:tok",
        ] {
            let err = record.parse::<AccountCredential>().unwrap_err();
            assert!(err.is_format_error(), "{record:?} gave {err}");
        }
    }

    #[test]
    fn test_token_literally_oauth() {
        // Three fields: the last one is the token even if it reads "oauth"
        let account: AccountCredential = "a:oauth:oauth".parse().unwrap();
        assert_eq!(account.token(), "oauth");
    }

    #[test]
    fn test_debug_hides_token() {
        let account: AccountCredential = "user1:oauth:supersecret".parse().unwrap();
        let debug = format!("{:?}", account);
        assert!(debug.contains("user1"));
        assert!(!debug.contains("supersecret"));
    }
}
