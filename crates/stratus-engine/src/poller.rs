//! Operation poller
//!
//! Waits on an [`OperationHandle`] at a fixed interval until the operation
//! reaches a terminal state or the hard timeout expires.

use crate::adapter::{OperationHandle, OperationStatus};
use crate::error::AdapterError;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Terminal outcome of waiting on an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Converged,
    Failed(String),
    TimedOut,
}

/// Polling configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between two status probes
    pub interval: Duration,

    /// Hard deadline for a single operation
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(20 * 60),
        }
    }
}

impl PollConfig {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Poller {
    config: PollConfig,
}

impl Poller {
    pub fn new(config: PollConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Wait until the operation converges, fails or times out
    ///
    /// A handle that already settled returns its cached outcome without
    /// probing again. Timing out leaves the backend operation running.
    pub async fn wait(&self, handle: &OperationHandle) -> PollOutcome {
        if let Some(outcome) = handle.outcome() {
            return outcome;
        }

        let deadline = Instant::now() + self.config.timeout;
        let mut probes = 0u32;

        let outcome = loop {
            probes += 1;
            match handle.status().await {
                Ok(OperationStatus::Done) => break PollOutcome::Converged,
                Ok(OperationStatus::Failed(msg)) => break PollOutcome::Failed(msg),
                Ok(OperationStatus::Pending) => {}
                Err(AdapterError::Transient(msg)) => {
                    tracing::debug!(
                        "Transient status error for {}: {}",
                        handle.reference(),
                        msg
                    );
                }
                Err(err) => break PollOutcome::Failed(err.to_string()),
            }

            if Instant::now() >= deadline {
                tracing::warn!(
                    "Operation {} ({}) timed out after {:?}",
                    handle.reference(),
                    handle.issuer(),
                    self.config.timeout
                );
                break PollOutcome::TimedOut;
            }

            sleep(self.config.interval).await;
        };

        tracing::debug!(
            "Operation {} settled after {} probe(s): {:?}",
            handle.reference(),
            probes,
            outcome
        );
        handle.settle(outcome.clone());
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterResult, OperationProbe};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Replays scripted statuses, repeating the last one forever
    struct Script {
        steps: Mutex<VecDeque<AdapterResult<OperationStatus>>>,
        last: AdapterResult<OperationStatus>,
        calls: Mutex<Vec<Instant>>,
    }

    impl Script {
        fn new(steps: Vec<AdapterResult<OperationStatus>>, last: AdapterResult<OperationStatus>) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps.into()),
                last,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<Instant> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl OperationProbe for Script {
        async fn status(&self) -> AdapterResult<OperationStatus> {
            self.calls.lock().push(Instant::now());
            self.steps.lock().pop_front().unwrap_or_else(|| self.last.clone())
        }
    }

    fn poller(interval: u64, timeout: u64) -> Poller {
        Poller::new(PollConfig::new(
            Duration::from_secs(interval),
            Duration::from_secs(timeout),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_converges_after_pending() {
        let script = Script::new(
            vec![Ok(OperationStatus::Pending), Ok(OperationStatus::Pending)],
            Ok(OperationStatus::Done),
        );
        let handle = OperationHandle::new("op", "test", script.clone());

        assert_eq!(poller(5, 60).wait(&handle).await, PollOutcome::Converged);

        let calls = script.calls();
        assert_eq!(calls.len(), 3);
        for pair in calls.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(5));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_with_bounded_probes() {
        let script = Script::new(vec![], Ok(OperationStatus::Pending));
        let handle = OperationHandle::new("op", "test", script.clone());

        let start = Instant::now();
        assert_eq!(poller(5, 30).wait(&handle).await, PollOutcome::TimedOut);

        // probes at 0, 5, ..., 30
        assert_eq!(script.calls().len(), 7);
        assert!(Instant::now() - start >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_probe_error_is_pending() {
        let script = Script::new(
            vec![Err(AdapterError::Transient("throttled".into()))],
            Ok(OperationStatus::Done),
        );
        let handle = OperationHandle::new("op", "test", script.clone());

        assert_eq!(poller(5, 60).wait(&handle).await, PollOutcome::Converged);
        assert_eq!(script.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_probe_error_fails() {
        let script = Script::new(vec![], Err(AdapterError::Permanent("gone wrong".into())));
        let handle = OperationHandle::new("op", "test", script.clone());

        match poller(5, 60).wait(&handle).await {
            PollOutcome::Failed(msg) => assert!(msg.contains("gone wrong")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_wait_returns_cached_outcome() {
        let script = Script::new(vec![], Ok(OperationStatus::Failed("quota".into())));
        let handle = OperationHandle::new("op", "test", script.clone());
        let poller = poller(5, 60);

        let first = poller.wait(&handle).await;
        let second = poller.wait(&handle).await;
        assert_eq!(first, PollOutcome::Failed("quota".into()));
        assert_eq!(first, second);
        assert_eq!(script.calls().len(), 1);
    }
}
