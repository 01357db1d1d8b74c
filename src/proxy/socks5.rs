//! Client-side SOCKS5 handshake.
//!
//! Drives method negotiation, the optional username/password
//! sub-negotiation (RFC 1929) and a CONNECT request with domain-name
//! addressing (RFC 1928). Once the reply is consumed the stream is a
//! transparent pipe to the destination.
//!
//! ```text
//! Init ─► MethodNegotiation ─┬──────────────────────┬─► ConnectRequest ─► Established
//!                            └─► AuthSubnegotiation ┘
//!                 (any state) ─► Failed
//! ```

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{Error, Result};
use crate::proxy::dial::dial;
use crate::proxy::endpoint::{ProxyAuth, ProxyEndpoint};

/// SOCKS protocol version
pub const SOCKS_VERSION: u8 = 0x05;

/// No authentication required
pub const METHOD_NO_AUTH: u8 = 0x00;
/// Username/password authentication
pub const METHOD_USER_PASS: u8 = 0x02;

/// Username/password sub-negotiation version
pub const AUTH_VERSION: u8 = 0x01;
/// Sub-negotiation success status
pub const AUTH_SUCCESS: u8 = 0x00;

/// CONNECT command
pub const CMD_CONNECT: u8 = 0x01;

/// IPv4 address type
pub const ATYP_IPV4: u8 = 0x01;
/// Domain name address type
pub const ATYP_DOMAIN: u8 = 0x03;
/// IPv6 address type
pub const ATYP_IPV6: u8 = 0x04;

/// Connect reply: succeeded
pub const REP_SUCCESS: u8 = 0x00;

/// Position of a handshake in the tunnel state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Nothing sent yet
    Init,
    /// Method offer sent, waiting for the selection
    MethodNegotiation,
    /// Credentials sent, waiting for the verdict
    AuthSubnegotiation,
    /// CONNECT sent, waiting for the reply
    ConnectRequest,
    /// Reply consumed, stream belongs to the caller
    Established,
    /// Terminal failure
    Failed,
}

/// Open a tunnel to `host:port` through `proxy`.
///
/// The proxy connection is closed if any step of the handshake fails.
pub async fn connect(proxy: &ProxyEndpoint, host: &str, port: u16) -> Result<TcpStream> {
    let stream = dial(proxy.host(), proxy.port()).await?;
    Handshake::new(stream, proxy.auth()).connect(host, port).await
}

/// A SOCKS5 client handshake over an already-connected stream.
pub struct Handshake<'a, S> {
    stream: S,
    auth: Option<&'a ProxyAuth>,
    state: HandshakeState,
}

impl<'a, S> Handshake<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a stream connected to the proxy.
    pub fn new(stream: S, auth: Option<&'a ProxyAuth>) -> Self {
        Self {
            stream,
            auth,
            state: HandshakeState::Init,
        }
    }

    /// Run the handshake to completion and hand back the tunneled stream.
    ///
    /// On error the stream is dropped, closing the proxy connection.
    pub async fn connect(mut self, host: &str, port: u16) -> Result<S> {
        self.settle(host, port).await?;
        Ok(self.stream)
    }

    /// Drive the exchange and leave the machine in `Established` or `Failed`.
    async fn settle(&mut self, host: &str, port: u16) -> Result<()> {
        match self.drive(host, port).await {
            Ok(()) => {
                self.transition(HandshakeState::Established);
                Ok(())
            }
            Err(e) => {
                tracing::debug!("SOCKS5 handshake failed in {:?}: {}", self.state, e);
                self.transition(HandshakeState::Failed);
                Err(e)
            }
        }
    }

    async fn drive(&mut self, host: &str, port: u16) -> Result<()> {
        // Oversized hosts fail here, before anything is written
        let request = connect_request(host, port)?;

        self.transition(HandshakeState::MethodNegotiation);
        let method = self.negotiate_method().await?;

        if method == METHOD_USER_PASS {
            self.transition(HandshakeState::AuthSubnegotiation);
            self.authenticate().await?;
        }

        self.transition(HandshakeState::ConnectRequest);
        self.stream.write_all(&request).await?;
        self.read_connect_reply().await
    }

    async fn negotiate_method(&mut self) -> Result<u8> {
        self.stream.write_all(&method_offer(self.auth)).await?;

        let mut reply = [0u8; 2];
        self.stream.read_exact(&mut reply).await?;

        if reply[0] != SOCKS_VERSION {
            return Err(Error::VersionMismatch {
                expected: SOCKS_VERSION,
                actual: reply[0],
            });
        }

        match reply[1] {
            METHOD_NO_AUTH => Ok(METHOD_NO_AUTH),
            METHOD_USER_PASS if self.auth.is_some() => Ok(METHOD_USER_PASS),
            other => Err(Error::UnsupportedMethod(other)),
        }
    }

    async fn authenticate(&mut self) -> Result<()> {
        let auth = self.auth.ok_or(Error::UnsupportedMethod(METHOD_USER_PASS))?;
        self.stream.write_all(&auth_request(auth)?).await?;

        let mut reply = [0u8; 2];
        self.stream.read_exact(&mut reply).await?;

        if reply != [AUTH_VERSION, AUTH_SUCCESS] {
            return Err(Error::AuthenticationFailed(reply));
        }
        Ok(())
    }

    async fn read_connect_reply(&mut self) -> Result<()> {
        // VER REP RSV ATYP
        let mut header = [0u8; 4];
        self.stream.read_exact(&mut header).await?;

        if header[0] != SOCKS_VERSION {
            return Err(Error::VersionMismatch {
                expected: SOCKS_VERSION,
                actual: header[0],
            });
        }
        if header[1] != REP_SUCCESS {
            return Err(Error::RequestFailed { status: header[1] });
        }

        skip_bound_address(&mut self.stream, header[3]).await?;

        let mut bound_port = [0u8; 2];
        self.stream.read_exact(&mut bound_port).await?;
        Ok(())
    }

    fn transition(&mut self, next: HandshakeState) {
        tracing::trace!("SOCKS5 {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// Method offer: VER NMETHODS METHODS...
pub fn method_offer(auth: Option<&ProxyAuth>) -> Vec<u8> {
    match auth {
        Some(_) => vec![SOCKS_VERSION, 0x02, METHOD_NO_AUTH, METHOD_USER_PASS],
        None => vec![SOCKS_VERSION, 0x01, METHOD_NO_AUTH],
    }
}

/// Username/password request: VER ULEN UNAME PLEN PASSWD
pub fn auth_request(auth: &ProxyAuth) -> Result<Vec<u8>> {
    let username = auth.username().as_bytes();
    let password = auth.password().as_bytes();

    let mut buf = Vec::with_capacity(3 + username.len() + password.len());
    buf.push(AUTH_VERSION);
    buf.push(length_prefix(username, "proxy username")?);
    buf.extend_from_slice(username);
    buf.push(length_prefix(password, "proxy password")?);
    buf.extend_from_slice(password);
    Ok(buf)
}

/// CONNECT request with a domain-name destination:
/// VER CMD RSV ATYP LEN HOST PORT
pub fn connect_request(host: &str, port: u16) -> Result<Vec<u8>> {
    let host = host.as_bytes();
    if host.is_empty() {
        return Err(Error::format("destination host cannot be empty"));
    }

    let mut buf = Vec::with_capacity(7 + host.len());
    buf.extend_from_slice(&[SOCKS_VERSION, CMD_CONNECT, 0x00, ATYP_DOMAIN]);
    buf.push(length_prefix(host, "destination host")?);
    buf.extend_from_slice(host);
    buf.extend_from_slice(&port.to_be_bytes());
    Ok(buf)
}

/// Read and discard the BND.ADDR field of a reply.
///
/// Returns the number of address bytes consumed: 4 for IPv4, `1 + L` for a
/// domain of length `L`, 16 for IPv6.
pub async fn skip_bound_address<R>(reader: &mut R, atyp: u8) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    let len = match atyp {
        ATYP_IPV4 => 4,
        ATYP_IPV6 => 16,
        ATYP_DOMAIN => {
            let mut len = [0u8; 1];
            reader.read_exact(&mut len).await?;
            let mut domain = vec![0u8; len[0] as usize];
            reader.read_exact(&mut domain).await?;
            return Ok(1 + domain.len());
        }
        other => return Err(Error::UnknownAddressType(other)),
    };

    let mut addr = [0u8; 16];
    reader.read_exact(&mut addr[..len]).await?;
    Ok(len)
}

fn length_prefix(field: &[u8], what: &str) -> Result<u8> {
    u8::try_from(field.len())
        .map_err(|_| Error::format(format!("{} is {} bytes, limit is 255", what, field.len())))
}
