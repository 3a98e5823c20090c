//! Bounded retry loop around a single remote call

use crate::budget::{Budgets, RetryBudget};
use crate::call::RemoteCall;
use crate::classify::{Classifier, ErrorClass};
use crate::error::{CloudError, Result};
use std::future::Future;
use tokio::time::{Instant, sleep};

/// Runs [`RemoteCall`]s under the process-wide read/write budgets.
///
/// Attempts are strictly sequential. A fatal error ends the loop at once; a
/// retryable one is retried after the budget's delay until the ceiling is
/// reached, at which point the last error is returned wrapped in
/// [`CloudError::TimedOut`]. The executor holds no mutable state and can be
/// shared freely between concurrent adapter invocations.
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    budgets: Budgets,
    classifier: Classifier,
}

impl RetryExecutor {
    pub fn new(budgets: Budgets) -> Self {
        Self {
            budgets,
            classifier: Classifier::default(),
        }
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn budgets(&self) -> &Budgets {
        &self.budgets
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Execute under the budget matching the call's operation kind
    pub async fn execute<T, F, Fut>(&self, call: RemoteCall<F>) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let budget = *self.budgets.for_kind(call.kind);
        self.execute_with(call, &budget).await
    }

    /// Execute under an explicit budget
    pub async fn execute_with<T, F, Fut>(&self, call: RemoteCall<F>, budget: &RetryBudget) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let RemoteCall {
            action,
            kind,
            mut op,
        } = call;
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let err = match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!("{} succeeded after {} attempts", action, attempt);
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if self.classifier.classify(&err) == ErrorClass::Fatal {
                tracing::error!("{} ({}) failed: {}", action, kind, err);
                return Err(err);
            }

            let elapsed = started.elapsed();
            if elapsed >= budget.timeout {
                tracing::error!(
                    "{} ({}) gave up after {} attempts in {:?}: {}",
                    action,
                    kind,
                    attempt,
                    elapsed,
                    err
                );
                return Err(CloudError::TimedOut {
                    action: action.into_owned(),
                    budget: budget.timeout,
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = budget
                .delay_for_attempt(attempt - 1)
                .min(budget.timeout - elapsed);
            tracing::warn!(
                "{} attempt {} failed, retrying in {:?}: {}",
                action,
                attempt,
                delay,
                err
            );
            sleep(delay).await;
        }
    }
}
