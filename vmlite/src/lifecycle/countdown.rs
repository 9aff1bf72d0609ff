//! Cancellable countdown for the graceful stop window.
//!
//! "Timer expired" and "terminal event arrived" race; whichever resolves the
//! countdown first wins and the loser observes the winner's outcome.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const PENDING: u8 = 0;
const EXPIRED: u8 = 1;
const CANCELLED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownOutcome {
    /// Grace period elapsed without a terminal event.
    Expired,
    /// A terminal event arrived first.
    Cancelled,
}

impl CountdownOutcome {
    fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            EXPIRED => Some(CountdownOutcome::Expired),
            CANCELLED => Some(CountdownOutcome::Cancelled),
            _ => None,
        }
    }
}

/// Used when `requested_at + grace_period` is not representable.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `requested_at + grace_period` for one stop sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownDeadline {
    requested_at: Instant,
    deadline: Instant,
}

impl ShutdownDeadline {
    /// Deadline `grace_period` after `requested_at`.
    ///
    /// Saturates instead of overflowing `Instant`.
    pub fn new(requested_at: Instant, grace_period: Duration) -> Self {
        let deadline = requested_at
            .checked_add(grace_period)
            .or_else(|| requested_at.checked_add(FAR_FUTURE))
            .unwrap_or(requested_at);
        Self {
            requested_at,
            deadline,
        }
    }

    pub fn requested_at(&self) -> Instant {
        self.requested_at
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// Single-use countdown with first-writer-wins resolution.
#[derive(Debug, Default)]
pub struct Countdown {
    resolution: AtomicU8,
    token: CancellationToken,
}

impl Countdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the countdown. Returns `false` if it had already resolved.
    pub fn cancel(&self) -> bool {
        let won = self
            .resolution
            .compare_exchange(PENDING, CANCELLED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if won {
            self.token.cancel();
        }
        won
    }

    pub fn outcome(&self) -> Option<CountdownOutcome> {
        CountdownOutcome::from_raw(self.resolution.load(Ordering::SeqCst))
    }

    /// Suspend until `deadline` or cancellation, whichever resolves first.
    pub async fn wait_until(&self, deadline: Instant) -> CountdownOutcome {
        if let Some(outcome) = self.outcome() {
            return outcome;
        }

        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => self.resolve(EXPIRED),
            _ = self.token.cancelled() => self.resolve(CANCELLED),
        }
    }

    fn resolve(&self, outcome: u8) -> CountdownOutcome {
        let raw = match self.resolution.compare_exchange(
            PENDING,
            outcome,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => outcome,
            Err(winner) => winner,
        };
        // Only EXPIRED or CANCELLED can be stored.
        CountdownOutcome::from_raw(raw).unwrap_or(CountdownOutcome::Cancelled)
    }
}
