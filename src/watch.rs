//! Debounced subscriptions to document mutations.
//!
//! A watcher owns one receiver on the document's mutation stream. Records
//! that pass its filter arm (or push back) a single deadline; the action runs
//! once when the deadline elapses, so a burst of matching mutations collapses
//! into one run that sees the document as it is at that moment.

use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

use crate::dom::{Document, MutationRecord, SharedDocument};

/// A running watcher. Dropping it stops the watcher.
#[derive(Debug)]
pub struct Subscription {
    name: &'static str,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Wraps an already spawned task so that it is aborted on drop.
    pub fn from_task(name: &'static str, task: JoinHandle<()>) -> Self {
        Self { name, task }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Starts a watcher on `doc`. Must be called from within a Tokio runtime.
///
/// `filter` sees each record with the document locked, or `None` when the
/// watcher fell behind and records were dropped; `action` runs with no locks
/// held, `delay` after the most recent match.
pub fn watch<F, A>(
    doc: &SharedDocument,
    name: &'static str,
    delay: Duration,
    mut filter: F,
    mut action: A,
) -> Subscription
where
    F: FnMut(&Document, Option<&MutationRecord>) -> bool + Send + 'static,
    A: FnMut() + Send + 'static,
{
    let mut rx = doc.subscribe();
    let doc = doc.clone();
    let task = tokio::spawn(async move {
        let mut deadline: Option<Instant> = None;
        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Ok(record) => {
                        let matched = {
                            let guard = doc.lock();
                            filter(&guard, Some(&record))
                        };
                        if matched {
                            trace!(watcher = name, ?record, "matched, rescheduling");
                            deadline = Some(Instant::now() + delay);
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        let matched = {
                            let guard = doc.lock();
                            filter(&guard, None)
                        };
                        debug!(watcher = name, missed, matched, "mutation stream lagged");
                        if matched {
                            deadline = Some(Instant::now() + delay);
                        }
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    debug!(watcher = name, "firing");
                    action();
                }
            }
        }
    });
    Subscription::from_task(name, task)
}

/// Exponential backoff with a fixed number of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial: Duration,
    pub factor: u32,
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Delay before the zero-based `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.initial
            .saturating_mul(self.factor.saturating_pow(attempt))
    }

    /// Calls `probe` after each backoff delay until it yields a value or
    /// the attempts run out.
    pub async fn retry<T, F>(&self, what: &str, mut probe: F) -> Option<T>
    where
        F: FnMut() -> Option<T>,
    {
        for attempt in 0..self.max_attempts {
            time::sleep(self.delay(attempt)).await;
            if let Some(found) = probe() {
                debug!(what, attempt, "retry succeeded");
                return Some(found);
            }
            trace!(what, attempt, "retry attempt found nothing");
        }
        warn!(what, attempts = self.max_attempts, "giving up");
        None
    }
}
