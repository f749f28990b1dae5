//! Per-call deadlines.
//!
//! A [`Deadline`] is created by the task that issues an outbound call and is
//! never shared. It records the monotonic start instant, so the same value
//! measures latency for both successful and failed calls. Wrapping a future
//! with [`Deadline::run`] drops (cancels) it when the budget is spent.

use std::future::Future;
use std::time::{Duration, Instant};

use thiserror::Error;

/// The budget of a [`Deadline`] ran out before the wrapped future finished.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("deadline of {}s exceeded", budget.as_secs())]
pub struct DeadlineExceeded {
    pub budget: Duration,
}

/// One-shot cancellation budget owned by a single call.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    /// Start the clock now.
    pub fn start(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Elapsed wall-clock time in (fractional) milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1000.0
    }

    /// Drive `fut` until it completes or the budget is spent.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, DeadlineExceeded>
    where
        F: Future,
    {
        let at = tokio::time::Instant::from_std(self.started + self.budget);
        tokio::time::timeout_at(at, fut)
            .await
            .map_err(|_| DeadlineExceeded { budget: self.budget })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_within_budget() {
        let deadline = Deadline::start(Duration::from_secs(1));
        let out = deadline.run(async { 7 }).await;
        assert_eq!(out, Ok(7));
    }

    #[tokio::test]
    async fn cancels_when_budget_is_spent() {
        let deadline = Deadline::start(Duration::from_millis(50));
        let out = deadline
            .run(tokio::time::sleep(Duration::from_secs(5)))
            .await;

        assert_eq!(
            out,
            Err(DeadlineExceeded {
                budget: Duration::from_millis(50)
            })
        );
        assert!(deadline.elapsed_ms() >= 50.0);
        assert!(deadline.elapsed() < Duration::from_secs(5));
    }
}
