//! Proxy endpoint records.
//!
//! Accepted shape: `[scheme://][user[:pass]@]host[:port]` where `scheme` is
//! `socks5` or `socks5h`, `port` defaults to 1080 and `host` may be a
//! bracketed IPv6 literal.

use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};
use crate::DEFAULT_PROXY_PORT;

/// Longest username or password the SOCKS5 sub-negotiation can carry.
pub const MAX_CREDENTIAL_LEN: usize = 255;

const SCHEMES: [&str; 2] = ["socks5", "socks5h"];

/// Username/password pair for SOCKS5 authentication.
///
/// Zeroized on drop; `Debug` never prints the password.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ProxyAuth {
    username: String,
    password: String,
}

impl ProxyAuth {
    /// Create a credential pair, checking the wire length limits.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        let auth = Self {
            username: username.into(),
            password: password.into(),
        };
        auth.validate()?;
        Ok(auth)
    }

    /// Username sent in the sub-negotiation.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Password sent in the sub-negotiation.
    pub fn password(&self) -> &str {
        &self.password
    }

    fn validate(&self) -> Result<()> {
        if self.username.is_empty() {
            return Err(Error::format("proxy username cannot be empty"));
        }
        if self.username.len() > MAX_CREDENTIAL_LEN {
            return Err(Error::format(format!(
                "proxy username is {} bytes, limit is {}",
                self.username.len(),
                MAX_CREDENTIAL_LEN
            )));
        }
        if self.password.len() > MAX_CREDENTIAL_LEN {
            return Err(Error::format(format!(
                "proxy password is {} bytes, limit is {}",
                self.password.len(),
                MAX_CREDENTIAL_LEN
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for ProxyAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyAuth")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// A SOCKS5 proxy the swarm can tunnel through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    host: String,
    port: u16,
    auth: Option<ProxyAuth>,
}

impl ProxyEndpoint {
    /// Create an unauthenticated endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            auth: None,
        }
    }

    /// Attach username/password credentials.
    pub fn with_auth(mut self, auth: ProxyAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Host as written in the record, brackets included for IPv6 literals.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Proxy port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Credentials, if the record carried any.
    pub fn auth(&self) -> Option<&ProxyAuth> {
        self.auth.as_ref()
    }
}

/// Renders `user:***@host:port`, never the password.
impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(auth) = &self.auth {
            write!(f, "{}:***@", auth.username)?;
        }
        if self.host.contains(':') && !self.host.starts_with('[') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for ProxyEndpoint {
    type Err = Error;

    fn from_str(record: &str) -> Result<Self> {
        let record = record.trim();
        if record.is_empty() {
            return Err(Error::format("empty proxy record"));
        }

        let rest = strip_scheme(record)?;

        let (auth, netloc) = match rest.rsplit_once('@') {
            Some((userinfo, netloc)) => {
                let auth = match userinfo.split_once(':') {
                    Some((user, pass)) => ProxyAuth::new(user, pass)?,
                    None => ProxyAuth::new(userinfo, "")?,
                };
                (Some(auth), netloc)
            }
            None => (None, rest),
        };

        let (host, port) = split_host_port(netloc)?;
        if host.is_empty() {
            return Err(Error::format(format!("missing host in proxy record: {}", record)));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            auth,
        })
    }
}

fn strip_scheme(record: &str) -> Result<&str> {
    let Some((scheme, rest)) = record.split_once("://") else {
        return Ok(record);
    };
    if SCHEMES.iter().any(|s| s.eq_ignore_ascii_case(scheme)) {
        Ok(rest)
    } else {
        Err(Error::format(format!("unsupported proxy scheme: {}", scheme)))
    }
}

fn split_host_port(netloc: &str) -> Result<(&str, u16)> {
    let netloc = netloc.trim();

    // [v6]:port or [v6]
    if netloc.starts_with('[') {
        let close = netloc
            .find(']')
            .ok_or_else(|| Error::format(format!("unterminated '[' in proxy host: {}", netloc)))?;
        let (host, after) = netloc.split_at(close + 1);
        let port = match after {
            "" => DEFAULT_PROXY_PORT,
            _ => match after.strip_prefix(':') {
                Some(port) => parse_port(port)?,
                None => {
                    return Err(Error::format(format!(
                        "unexpected text after bracketed host: {}",
                        netloc
                    )))
                }
            },
        };
        return Ok((host, port));
    }

    // Unbracketed IPv6: the last segment is the port when what precedes it
    // is itself an address, otherwise the whole text is the address.
    if netloc.matches(':').count() > 1 {
        if let Some((host, port)) = netloc.rsplit_once(':') {
            if host.parse::<Ipv6Addr>().is_ok() {
                if let Ok(port) = parse_port(port) {
                    tracing::warn!(
                        "Reading unbracketed {} as [{}]:{}; bracket IPv6 literals to be explicit",
                        netloc,
                        host,
                        port
                    );
                    return Ok((host, port));
                }
            }
        }
        return match netloc.parse::<Ipv6Addr>() {
            Ok(_) => Ok((netloc, DEFAULT_PROXY_PORT)),
            Err(_) => Err(Error::format(format!(
                "ambiguous proxy address, bracket IPv6 literals: {}",
                netloc
            ))),
        };
    }

    match netloc.rsplit_once(':') {
        Some((host, port)) => Ok((host, parse_port(port)?)),
        None => Ok((netloc, DEFAULT_PROXY_PORT)),
    }
}

fn parse_port(port: &str) -> Result<u16> {
    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(Error::format(format!("invalid port in proxy: {}", port))),
        Ok(port) => Ok(port),
    }
}
