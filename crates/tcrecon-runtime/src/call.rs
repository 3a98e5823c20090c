//! Description of a single remote API invocation

use std::borrow::Cow;

/// Which process-wide budget a call is charged against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Describe/list style calls
    Read,
    /// Create, modify and delete calls
    Write,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Read => write!(f, "read"),
            OperationKind::Write => write!(f, "write"),
        }
    }
}

/// One remote API invocation: an action name for diagnostics, its operation
/// kind, and the closure that performs it.
///
/// The closure is invoked once per attempt and must return a fresh future each
/// time; `RemoteCall` is consumed by the executor.
pub struct RemoteCall<F> {
    pub(crate) action: Cow<'static, str>,
    pub(crate) kind: OperationKind,
    pub(crate) op: F,
}

impl<F> RemoteCall<F> {
    pub fn new(action: impl Into<Cow<'static, str>>, kind: OperationKind, op: F) -> Self {
        Self {
            action: action.into(),
            kind,
            op,
        }
    }

    pub fn read(action: impl Into<Cow<'static, str>>, op: F) -> Self {
        Self::new(action, OperationKind::Read, op)
    }

    pub fn write(action: impl Into<Cow<'static, str>>, op: F) -> Self {
        Self::new(action, OperationKind::Write, op)
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }
}

impl<F> std::fmt::Debug for RemoteCall<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCall")
            .field("action", &self.action)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
