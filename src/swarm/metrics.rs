//! Swarm metrics collection.
//!
//! Aggregate counters only; nothing here identifies an account.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Run-wide counters shared by the orchestrator and every session.
pub struct SwarmMetrics {
    /// Run start time
    start_time: Instant,
    /// Sessions spawned
    launched: AtomicU64,
    /// Sessions spawned and not yet terminated
    active: AtomicU64,
    /// Sessions whose tunnel reached Established
    established: AtomicU64,
    /// Sessions ended by the peer closing
    closed: AtomicU64,
    /// Sessions ended by an error
    failed: AtomicU64,
    /// Account records rejected before launch
    rejected_accounts: AtomicU64,
    /// PING lines answered
    heartbeats: AtomicU64,
    /// Bytes read from tunnels
    bytes_received: AtomicU64,
}

impl SwarmMetrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            launched: AtomicU64::new(0),
            active: AtomicU64::new(0),
            established: AtomicU64::new(0),
            closed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            rejected_accounts: AtomicU64::new(0),
            heartbeats: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
        }
    }

    /// Count a spawned session.
    pub fn increment_launched(&self) {
        self.launched.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an established tunnel.
    pub fn increment_established(&self) {
        self.established.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a session the peer closed.
    pub fn record_closed(&self) {
        self.closed.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Count a session that ended in error.
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Count a rejected account record.
    pub fn increment_rejected(&self) {
        self.rejected_accounts.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an answered PING.
    pub fn increment_heartbeats(&self) {
        self.heartbeats.fetch_add(1, Ordering::Relaxed);
    }

    /// Add bytes to received counter.
    pub fn add_bytes_received(&self, bytes: u64) {
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Get uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Get sessions launched.
    pub fn launched(&self) -> u64 {
        self.launched.load(Ordering::Relaxed)
    }

    /// Get sessions still running.
    pub fn active(&self) -> u64 {
        self.active.load(Ordering::Relaxed)
    }

    /// Get tunnels established.
    pub fn established(&self) -> u64 {
        self.established.load(Ordering::Relaxed)
    }

    /// Get sessions closed by the peer.
    pub fn closed(&self) -> u64 {
        self.closed.load(Ordering::Relaxed)
    }

    /// Get sessions that failed.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Get rejected account records.
    pub fn rejected_accounts(&self) -> u64 {
        self.rejected_accounts.load(Ordering::Relaxed)
    }

    /// Get PINGs answered.
    pub fn heartbeats(&self) -> u64 {
        self.heartbeats.load(Ordering::Relaxed)
    }

    /// Get total bytes received.
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            launched: self.launched(),
            active: self.active(),
            established: self.established(),
            closed: self.closed(),
            failed: self.failed(),
            rejected_accounts: self.rejected_accounts(),
            heartbeats: self.heartbeats(),
            bytes_received: self.bytes_received(),
        }
    }

    /// Format metrics as a simple text report.
    pub fn format_report(&self) -> String {
        let snapshot = self.snapshot();

        format!(
            r#"Swarm Summary
=============
Uptime: {} seconds

Sessions:
  Launched:    {}
  Established: {}
  Closed:      {}
  Failed:      {}
  Active:      {}
  Establish Rate: {:.1}%

Accounts Rejected: {}
Heartbeats:        {}
Received:          {} bytes
"#,
            snapshot.uptime_secs,
            snapshot.launched,
            snapshot.established,
            snapshot.closed,
            snapshot.failed,
            snapshot.active,
            snapshot.establish_rate() * 100.0,
            snapshot.rejected_accounts,
            snapshot.heartbeats,
            snapshot.bytes_received,
        )
    }
}

impl Default for SwarmMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of all metrics at a point in time.
#[allow(missing_docs)]
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub launched: u64,
    pub active: u64,
    pub established: u64,
    pub closed: u64,
    pub failed: u64,
    pub rejected_accounts: u64,
    pub heartbeats: u64,
    pub bytes_received: u64,
}

impl MetricsSnapshot {
    /// Fraction of launched sessions whose tunnel came up.
    pub fn establish_rate(&self) -> f64 {
        if self.launched == 0 {
            0.0
        } else {
            self.established as f64 / self.launched as f64
        }
    }
}
