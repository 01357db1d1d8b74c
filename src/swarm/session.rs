//! Per-account chat sessions.
//!
//! A session owns one tunnel for its whole life. It registers, answers
//! heartbeats, and ends when the peer hangs up or anything goes wrong.
//! Errors stop at the session boundary and come back in the report.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::chat::{heartbeat_reply, registration_lines, AccountCredential, Channel, LineBuffer};
use crate::error::{Error, Result};
use crate::proxy::{self, ProxyEndpoint};
use crate::swarm::metrics::SwarmMetrics;
use crate::Destination;

const READ_CHUNK: usize = 4096;

/// How a session ended.
#[derive(Debug)]
pub enum SessionOutcome {
    /// Peer closed the connection
    Closed,
    /// Tunnel, registration or read loop failed
    Failed(Error),
}

impl SessionOutcome {
    /// True when the session ended in error.
    pub fn is_failed(&self) -> bool {
        matches!(self, SessionOutcome::Failed(_))
    }
}

/// Traffic counters for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Bytes read from the tunnel
    pub bytes_received: u64,
    /// Complete lines decoded
    pub lines_received: u64,
    /// PINGs answered
    pub heartbeats: u64,
}

/// What a finished session hands back to the orchestrator.
#[derive(Debug)]
pub struct SessionReport {
    /// Launch position, 0-based
    pub index: usize,
    /// Account login name
    pub username: String,
    /// Proxy used, password masked
    pub proxy: String,
    /// How the session ended
    pub outcome: SessionOutcome,
    /// Traffic seen before it ended
    pub stats: SessionStats,
}

/// One account, one proxy, one tunnel.
pub struct SessionWorker {
    index: usize,
    account: AccountCredential,
    proxy: Arc<ProxyEndpoint>,
    destination: Arc<Destination>,
    channel: Arc<Channel>,
    metrics: Arc<SwarmMetrics>,
}

impl SessionWorker {
    /// Pair an account with a proxy.
    pub fn new(
        index: usize,
        account: AccountCredential,
        proxy: Arc<ProxyEndpoint>,
        destination: Arc<Destination>,
        channel: Arc<Channel>,
        metrics: Arc<SwarmMetrics>,
    ) -> Self {
        Self {
            index,
            account,
            proxy,
            destination,
            channel,
            metrics,
        }
    }

    /// Run the session to completion. Never fails; errors land in the report.
    pub async fn run(self) -> SessionReport {
        tracing::info!("Using proxy: {} for {}", self.proxy, self.account.username());

        let mut stats = SessionStats::default();
        let outcome = match self.drive(&mut stats).await {
            Ok(()) => {
                tracing::info!("Disconnected {}", self.account.username());
                self.metrics.record_closed();
                SessionOutcome::Closed
            }
            Err(e) => {
                tracing::warn!(
                    "Error for {} via {}: {}",
                    self.account.username(),
                    self.proxy,
                    e
                );
                self.metrics.record_failed();
                SessionOutcome::Failed(e)
            }
        };

        SessionReport {
            index: self.index,
            username: self.account.username().to_string(),
            proxy: self.proxy.to_string(),
            outcome,
            stats,
        }
    }

    async fn drive(&self, stats: &mut SessionStats) -> Result<()> {
        let mut stream =
            proxy::connect(&self.proxy, &self.destination.host, self.destination.port).await?;
        self.metrics.increment_established();

        register(&mut stream, &self.account, &self.channel).await?;
        tracing::info!(
            "Connected {} to {} via {}",
            self.account.username(),
            self.channel,
            self.proxy
        );

        read_loop(&mut stream, stats, &self.metrics).await
    }
}

/// Send PASS, NICK and JOIN, in that order.
pub async fn register<W>(writer: &mut W, account: &AccountCredential, channel: &Channel) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    for line in registration_lines(account, channel) {
        writer.write_all(line.as_bytes()).await?;
    }
    writer.flush().await?;
    Ok(())
}

/// Read lines until the peer closes, answering every `PING`.
///
/// Returns `Ok(())` on a clean close; any I/O or framing error ends the loop.
pub async fn read_loop<S>(stream: &mut S, stats: &mut SessionStats, metrics: &SwarmMetrics) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut lines = LineBuffer::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            if lines.pending() > 0 {
                tracing::debug!("Dropping {} bytes of unterminated line at close", lines.pending());
            }
            return Ok(());
        }

        stats.bytes_received += n as u64;
        metrics.add_bytes_received(n as u64);
        lines.extend(&chunk[..n]);

        while let Some(line) = lines.next_line()? {
            stats.lines_received += 1;

            match heartbeat_reply(&line) {
                Some(pong) => {
                    stream.write_all(pong.as_bytes()).await?;
                    stats.heartbeats += 1;
                    metrics.increment_heartbeats();
                }
                None => tracing::trace!("Ignoring: {}", line),
            }
        }
    }
}
