//! Elapsed-time logging

use std::borrow::Cow;
use tokio::time::Instant;

/// Logs how long an operation took when dropped.
///
/// ```ignore
/// let _elapsed = ElapsedLog::start("tags.sync");
/// ```
#[derive(Debug)]
pub struct ElapsedLog {
    action: Cow<'static, str>,
    started: Instant,
}

impl ElapsedLog {
    pub fn start(action: impl Into<Cow<'static, str>>) -> Self {
        Self {
            action: action.into(),
            started: Instant::now(),
        }
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }
}

impl Drop for ElapsedLog {
    fn drop(&mut self) {
        tracing::debug!("[ELAPSED] {} elapsed {} ms", self.action, self.elapsed_ms());
    }
}
