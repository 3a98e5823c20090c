//! Convergence polling after a mutating call
//!
//! Most create/update/delete calls return before the remote object is usable.
//! The poller repeatedly runs a caller-supplied probe until it reports
//! completion, fails fatally, or the budget runs out:
//!
//! ```text
//! Polling ──┬── probe done ───────────► Converged
//!           ├── fatal probe error ────► Failed
//!           └── budget elapsed ───────► TimedOut
//! ```

use crate::budget::RetryBudget;
use crate::classify::{Classifier, ErrorClass};
use crate::error::{CloudError, Result};
use std::fmt::Debug;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use tcrecon_config::RuntimeConfig;
use tokio::time::{Instant, sleep};

const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;

/// What a probe saw on one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation<S> {
    pub state: S,
    pub done: bool,
}

impl<S> Observation<S> {
    pub fn done(state: S) -> Self {
        Self { state, done: true }
    }

    pub fn pending(state: S) -> Self {
        Self { state, done: false }
    }
}

/// Poller state; every state except `Polling` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Polling,
    Converged,
    Failed,
    TimedOut,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollState::Polling)
    }
}

impl std::fmt::Display for PollState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollState::Polling => write!(f, "polling"),
            PollState::Converged => write!(f, "converged"),
            PollState::Failed => write!(f, "failed"),
            PollState::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Drives convergence probes at a fixed cadence (`budget.interval`).
#[derive(Debug, Clone)]
pub struct Poller {
    classifier: Classifier,
    not_found_checks: u32,
}

impl Default for Poller {
    fn default() -> Self {
        Self {
            classifier: Classifier::default(),
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
        }
    }
}

impl Poller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::default().with_not_found_checks(config.not_found_checks)
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    /// Poll `probe` until it reports `done`, returns a fatal error, or the
    /// budget elapses. Retryable probe errors count as "not done yet".
    ///
    /// Returns the state observed by the converging probe.
    pub async fn await_convergence<S, F, Fut>(
        &self,
        action: &str,
        budget: &RetryBudget,
        mut probe: F,
    ) -> Result<S>
    where
        S: Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Observation<S>>>,
    {
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let last = match probe().await {
                Ok(observation) if observation.done => {
                    log_transition(action, PollState::Converged, attempt);
                    return Ok(observation.state);
                }
                Ok(observation) => CloudError::Retryable(format!(
                    "{} has not converged, last observed state: {:?}",
                    action, observation.state
                )),
                Err(err) => {
                    if self.classifier.classify(&err) == ErrorClass::Fatal {
                        log_transition(action, PollState::Failed, attempt);
                        return Err(err);
                    }
                    err
                }
            };

            let elapsed = started.elapsed();
            if elapsed >= budget.timeout {
                log_transition(action, PollState::TimedOut, attempt);
                return Err(CloudError::TimedOut {
                    action: action.to_string(),
                    budget: budget.timeout,
                    attempts: attempt,
                    last: Box::new(last),
                });
            }

            tracing::debug!("{} {} (attempt {}): {}", action, PollState::Polling, attempt, last);
            sleep(budget.delay_for_attempt(0).min(budget.timeout - elapsed)).await;
        }
    }

    /// Wait until `refresh` reports a status in `target`.
    ///
    /// `refresh` returns the object and its status, or `None` while the object
    /// is not visible. Statuses in `pending` keep the wait going (an empty
    /// `pending` accepts any non-target status); anything else is a fatal
    /// "unexpected state". More than `not_found_checks` consecutive `None`
    /// answers are fatal as well.
    pub async fn wait_for_state<S, F, Fut>(
        &self,
        action: &str,
        pending: &[&str],
        target: &[&str],
        budget: &RetryBudget,
        mut refresh: F,
    ) -> Result<S>
    where
        S: Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<(S, String)>>>,
    {
        let misses = AtomicU32::new(0);
        let misses = &misses;
        let not_found_checks = self.not_found_checks;

        let converged = self
            .await_convergence(action, budget, || {
                let fut = refresh();
                async move {
                    match fut.await? {
                        None => {
                            let seen = misses.fetch_add(1, Ordering::SeqCst) + 1;
                            if seen > not_found_checks {
                                return Err(CloudError::NonRetryable(format!(
                                    "{} not found after {} checks",
                                    action, seen
                                )));
                            }
                            Ok(Observation::pending(None))
                        }
                        Some((object, status)) => {
                            misses.store(0, Ordering::SeqCst);
                            if target.contains(&status.as_str()) {
                                Ok(Observation::done(Some((object, status))))
                            } else if pending.is_empty() || pending.contains(&status.as_str()) {
                                Ok(Observation::pending(Some((object, status))))
                            } else {
                                Err(CloudError::NonRetryable(format!(
                                    "{}: unexpected state '{}', wanted target '{}'",
                                    action,
                                    status,
                                    target.join(",")
                                )))
                            }
                        }
                    }
                }
            })
            .await?;

        converged
            .map(|(object, _)| object)
            .ok_or_else(|| CloudError::NonRetryable(format!("{} converged without an object", action)))
    }

    /// Wait until `refresh` no longer finds the object.
    ///
    /// A `ResourceNotFound` error from `refresh` counts as gone.
    pub async fn wait_for_deletion<S, F, Fut>(
        &self,
        action: &str,
        budget: &RetryBudget,
        mut refresh: F,
    ) -> Result<()>
    where
        S: Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<S>>>,
    {
        self.await_convergence(action, budget, || {
            let fut = refresh();
            async move {
                match fut.await {
                    Ok(None) => Ok(Observation::done(None)),
                    Ok(Some(object)) => Ok(Observation::pending(Some(object))),
                    Err(err) if err.is_not_found() => Ok(Observation::done(None)),
                    Err(err) => Err(err),
                }
            }
        })
        .await
        .map(|_: Option<S>| ())
    }
}

fn log_transition(action: &str, state: PollState, attempts: u32) {
    match state {
        PollState::Converged => {
            tracing::debug!("{} {} after {} probes", action, state, attempts)
        }
        _ => tracing::warn!("{} {} after {} probes", action, state, attempts),
    }
}
