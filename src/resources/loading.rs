//! Bookkeeping for asynchronous loads.
//!
//! [`CompletionLatch`] counts down a fixed number of completions.
//! [`PendingLoads`] is the open-ended variant the host loop hands to a sketch's
//! load hook: every enqueued load returns a [`LoadTicket`] that must be
//! completed (or failed) before the start barrier opens.

use instant::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("{outstanding} load(s) still pending after {waited:?}")]
    Timeout { outstanding: usize, waited: Duration },
    #[error("load failed: {0}")]
    Failed(String),
}

/// Opens after `n` arrivals.
///
/// The count starts at `n + 1` and the constructor arrives once itself, so a
/// latch over zero entries is open from the start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionLatch {
    remaining: usize,
}

impl CompletionLatch {
    pub fn new(n: usize) -> Self {
        let mut latch = Self { remaining: n + 1 };
        latch.arrive();
        latch
    }

    /// Record one completion. Returns true if this arrival opened the latch.
    pub fn arrive(&mut self) -> bool {
        if self.remaining == 0 {
            log::warn!("Completion latch received more arrivals than expected.");
            return false;
        }
        self.remaining -= 1;
        self.remaining == 0
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn is_open(&self) -> bool {
        self.remaining == 0
    }
}

/// Proof that a load was enqueued. Hand it back to [`PendingLoads::complete`].
#[must_use = "an enqueued load keeps the start barrier closed until its ticket is completed"]
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct LoadTicket(usize);

/// The set of loads a single load phase is waiting on.
#[derive(Debug)]
pub struct PendingLoads {
    issued: usize,
    outstanding: usize,
    failures: Vec<String>,
    started: Instant,
}

impl Default for PendingLoads {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingLoads {
    pub fn new() -> Self {
        Self {
            issued: 0,
            outstanding: 0,
            failures: Vec::new(),
            started: Instant::now(),
        }
    }

    /// Restart the timeout clock at `now`. Called when the load phase begins.
    pub fn begin(&mut self, now: Instant) {
        self.started = now;
    }

    pub fn enqueue(&mut self) -> LoadTicket {
        self.issued += 1;
        self.outstanding += 1;
        LoadTicket(self.issued)
    }

    pub fn complete(&mut self, _ticket: LoadTicket) {
        self.outstanding -= 1;
    }

    /// Settle the ticket and record why the load failed.
    pub fn fail(&mut self, ticket: LoadTicket, reason: impl Into<String>) {
        let reason = reason.into();
        log::warn!("Load failed: {reason}");
        self.failures.push(reason);
        self.complete(ticket);
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn issued(&self) -> usize {
        self.issued
    }

    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    /// True once every enqueued load has been completed or failed. A phase that
    /// never enqueued anything is settled immediately.
    pub fn is_settled(&self) -> bool {
        self.outstanding == 0
    }

    /// `Ok(true)` once settled, `Ok(false)` while still waiting, and an error
    /// when `timeout` has passed since the load phase began.
    pub fn poll_barrier(&self, now: Instant, timeout: Duration) -> Result<bool, LoadError> {
        if self.is_settled() {
            return Ok(true);
        }
        let waited = if now > self.started {
            now - self.started
        } else {
            Duration::ZERO
        };
        if waited >= timeout {
            return Err(LoadError::Timeout {
                outstanding: self.outstanding,
                waited,
            });
        }
        Ok(false)
    }
}
