//! Stop conditions for the training loop.
//!
//! Conditions are checked between splits, never during one.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bon::Builder;

/// Error type a [`TrainingGate`] may report.
pub type GateError = Box<dyn std::error::Error + Send + Sync>;

/// External scheduling hint consulted between splits.
///
/// Returning `Ok(false)` pauses the loop for the configured backoff; an error
/// is logged and treated as permission to continue.
pub trait TrainingGate: Send + Sync {
    fn may_proceed(&self) -> Result<bool, GateError>;
}

impl<F> TrainingGate for F
where
    F: Fn() -> Result<bool, GateError> + Send + Sync,
{
    fn may_proceed(&self) -> Result<bool, GateError> {
        self()
    }
}

/// Shared flag asking a training loop to stop after the current split.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a training loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `max_splits` splits were committed.
    MaxSplits,
    /// The deadline passed.
    Deadline,
    /// The cancellation token was triggered.
    Cancelled,
    /// No splittable leaf remains.
    Converged,
}

/// When [`TrainingScheduler::run`](super::TrainingScheduler::run) should stop.
///
/// With no limits set the loop runs to convergence.
///
/// ```
/// use std::time::{Duration, Instant};
/// use ultratree::training::{CancellationToken, StopConditions};
///
/// let token = CancellationToken::new();
/// let stop = StopConditions::builder()
///     .max_splits(50)
///     .deadline(Instant::now() + Duration::from_secs(3600))
///     .cancel(token.clone())
///     .build();
/// assert_eq!(stop.max_splits, Some(50));
/// ```
#[derive(Clone, Builder)]
pub struct StopConditions {
    /// Stop after this many committed splits.
    pub max_splits: Option<usize>,
    /// Stop once this instant has passed.
    pub deadline: Option<Instant>,
    /// Stop when this token is cancelled.
    pub cancel: Option<CancellationToken>,
    /// Consulted before every split.
    pub gate: Option<Arc<dyn TrainingGate>>,
    /// Pause length while the gate is closed. Default: 5 minutes.
    #[builder(default = Duration::from_secs(300))]
    pub gate_backoff: Duration,
}

impl Default for StopConditions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for StopConditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopConditions")
            .field("max_splits", &self.max_splits)
            .field("deadline", &self.deadline)
            .field("cancel", &self.cancel)
            .field("gate", &self.gate.as_ref().map(|_| "<gate>"))
            .field("gate_backoff", &self.gate_backoff)
            .finish()
    }
}

impl StopConditions {
    /// Run to convergence.
    pub fn until_converged() -> Self {
        Self::default()
    }

    /// Stop after `n` splits.
    pub fn after_splits(n: usize) -> Self {
        Self::builder().max_splits(n).build()
    }

    /// The condition that holds right now, if any, given `splits` done so far.
    pub fn reached(&self, splits: usize) -> Option<StopReason> {
        if self.max_splits.is_some_and(|max| splits >= max) {
            return Some(StopReason::MaxSplits);
        }
        if self.is_cancelled() {
            return Some(StopReason::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(StopReason::Deadline);
        }
        None
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Sleep for the gate backoff, waking early on cancellation or deadline.
    pub(crate) fn pause(&self) {
        const SLICE: Duration = Duration::from_millis(50);
        let mut until = Instant::now() + self.gate_backoff;
        if let Some(deadline) = self.deadline {
            until = until.min(deadline);
        }
        loop {
            let now = Instant::now();
            if now >= until || self.is_cancelled() {
                return;
            }
            std::thread::sleep((until - now).min(SLICE));
        }
    }
}
