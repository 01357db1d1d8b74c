//! Session orchestration.
//!
//! ```text
//!  accounts ──► parse ──┬─► rejected (logged, kept in summary)
//!                       │
//!                       └─► ProxyCursor ─► spawn SessionWorker ─► sleep ─► next
//!                                                │
//!                          join all ◄────────────┘
//! ```
//!
//! Proxies are handed out round-robin: the i-th launched account gets proxy
//! `i mod k`. Rejected records do not take a slot.

pub mod config;
pub mod metrics;
pub mod session;

pub use config::{AccountRecord, SwarmConfig, SwarmConfigFile};
pub use metrics::SwarmMetrics;
pub use session::{SessionOutcome, SessionReport, SessionStats, SessionWorker};

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::chat::AccountCredential;
use crate::error::{Error, Result};
use crate::proxy::ProxyEndpoint;

/// Round-robin index into the proxy pool.
#[derive(Debug, Clone)]
pub struct ProxyCursor {
    next: usize,
    len: usize,
}

impl ProxyCursor {
    /// Cursor over a pool of `len` proxies.
    pub fn new(len: usize) -> Result<Self> {
        if len == 0 {
            return Err(Error::config("proxy pool is empty"));
        }
        Ok(Self { next: 0, len })
    }

    /// Current index, then move one step, wrapping at the end.
    pub fn advance(&mut self) -> usize {
        let index = self.next;
        self.next = (self.next + 1) % self.len;
        index
    }
}

/// An account record that never became a session.
#[derive(Debug)]
pub struct RejectedAccount {
    /// Line number in the account list file, 1-based
    pub line: usize,
    /// Why it was rejected
    pub reason: Error,
}

/// Everything a run produced.
#[derive(Debug, Default)]
pub struct SwarmSummary {
    /// One report per launched session, in launch order
    pub sessions: Vec<SessionReport>,
    /// Records that failed to parse
    pub rejected: Vec<RejectedAccount>,
}

impl SwarmSummary {
    /// Sessions that ended in error.
    pub fn failed(&self) -> impl Iterator<Item = &SessionReport> {
        self.sessions.iter().filter(|s| s.outcome.is_failed())
    }
}

/// Launches one session per account and waits for all of them.
pub struct Swarm {
    config: SwarmConfig,
    proxies: Vec<Arc<ProxyEndpoint>>,
    cursor: ProxyCursor,
    metrics: Arc<SwarmMetrics>,
}

impl Swarm {
    /// Create a swarm. Fails if the proxy pool is empty.
    pub fn new(config: SwarmConfig, proxies: Vec<ProxyEndpoint>) -> Result<Self> {
        config.validate()?;
        let cursor = ProxyCursor::new(proxies.len())
            .map_err(|_| Error::config("no valid proxies found"))?;

        Ok(Self {
            config,
            proxies: proxies.into_iter().map(Arc::new).collect(),
            cursor,
            metrics: Arc::new(SwarmMetrics::new()),
        })
    }

    /// Launch every account and block until every session has ended.
    ///
    /// Each run starts again from the first proxy.
    pub async fn run<I>(&self, accounts: I) -> SwarmSummary
    where
        I: IntoIterator<Item = AccountRecord>,
    {
        let mut summary = SwarmSummary::default();
        let mut cursor = self.cursor.clone();

        let destination = Arc::new(self.config.destination.clone());
        let channel = Arc::new(self.config.channel.clone());

        let mut handles: Vec<(usize, String, String, JoinHandle<SessionReport>)> = Vec::new();

        for record in accounts {
            let account = match record.text.parse::<AccountCredential>() {
                Ok(account) => account,
                Err(e) => {
                    tracing::warn!("Rejecting account on line {}: {}", record.line, e);
                    self.metrics.increment_rejected();
                    summary.rejected.push(RejectedAccount {
                        line: record.line,
                        reason: e,
                    });
                    continue;
                }
            };

            // Pacing sits between launches, not after the last one
            if !handles.is_empty() && !self.config.launch_delay.is_zero() {
                tokio::time::sleep(self.config.launch_delay).await;
            }

            let index = handles.len();
            let proxy = Arc::clone(&self.proxies[cursor.advance()]);
            let username = account.username().to_string();
            let proxy_label = proxy.to_string();

            let worker = SessionWorker::new(
                index,
                account,
                proxy,
                Arc::clone(&destination),
                Arc::clone(&channel),
                Arc::clone(&self.metrics),
            );

            self.metrics.increment_launched();
            handles.push((index, username, proxy_label, tokio::spawn(worker.run())));
        }

        tracing::info!(
            "Launched {} session(s), rejected {} account(s)",
            handles.len(),
            summary.rejected.len()
        );

        for (index, username, proxy, handle) in handles {
            let report = match handle.await {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!("Session for {} panicked: {}", username, e);
                    self.metrics.record_failed();
                    SessionReport {
                        index,
                        username,
                        proxy,
                        outcome: SessionOutcome::Failed(Error::SessionPanicked),
                        stats: SessionStats::default(),
                    }
                }
            };
            summary.sessions.push(report);
        }

        summary
    }

    /// Get run metrics.
    pub fn metrics(&self) -> &SwarmMetrics {
        &self.metrics
    }

    /// Get the proxy pool.
    pub fn proxies(&self) -> &[Arc<ProxyEndpoint>] {
        &self.proxies
    }
}
