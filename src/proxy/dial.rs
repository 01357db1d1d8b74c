//! Outbound TCP dialing.

use tokio::net::{lookup_host, TcpStream};

use crate::error::{Error, Result};

/// Open a TCP connection to `host:port`.
///
/// Every address the resolver returns is tried in order (IPv4 and IPv6 alike)
/// and the first one that accepts wins. Brackets around an IPv6 literal are
/// stripped before resolution.
pub async fn dial(host: &str, port: u16) -> Result<TcpStream> {
    let host = strip_brackets(host);

    let candidates: Vec<_> = match lookup_host((host, port)).await {
        Ok(addrs) => addrs.collect(),
        Err(e) => {
            tracing::debug!("Resolving {}:{} failed: {}", host, port, e);
            Vec::new()
        }
    };

    for addr in candidates {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(e) => {
                tracing::debug!("Connect to {} failed: {}", addr, e);
            }
        }
    }

    Err(Error::Connection {
        host: host.to_string(),
        port,
    })
}

/// `[::1]` → `::1`; anything else is returned unchanged.
pub fn strip_brackets(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}
