//! SOCKS5 client tunneling.
//!
//! `dial` opens the TCP connection to the proxy, `socks5` runs the handshake
//! over it, and `endpoint` parses the proxy records the pool is built from.

pub mod dial;
pub mod endpoint;
pub mod socks5;

pub use dial::dial;
pub use endpoint::{ProxyAuth, ProxyEndpoint};
pub use socks5::{connect, Handshake, HandshakeState};
