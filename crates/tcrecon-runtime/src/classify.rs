//! Retryable/fatal classification of remote call errors

use crate::error::{CloudError, code_in_family};

/// Provider code families that no amount of retrying will fix
pub const FATAL_CODES: &[&str] = &[
    "ResourceNotFound",
    "InvalidParameter",
    "InvalidParameterValue",
    "MissingParameter",
    "UnknownParameter",
    "UnsupportedOperation",
    "UnauthorizedOperation",
    "AuthFailure",
    "LimitExceeded",
    "ResourceInsufficient",
    "OperationDenied",
    "InvalidAction",
];

/// Outcome of classifying a single failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Retryable,
    Fatal,
}

/// Caller-facing taxonomy of a surfaced error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Retryable,
    Fatal,
    /// The budget ran out while the last error was still retryable
    TimedOut,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Retryable => write!(f, "retryable"),
            ErrorKind::Fatal => write!(f, "fatal"),
            ErrorKind::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Classifies errors by provider code.
///
/// The default classifier treats every code outside [`FATAL_CODES`] as
/// retryable, as well as errors that carry no code at all. Call sites that know
/// a normally fatal code is transient for their API can add it with
/// [`Classifier::with_retryable_codes`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classifier {
    extra_retryable: Vec<String>,
}

impl Classifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A classifier that additionally retries the given code families
    pub fn with_retryable_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_retryable.extend(codes.into_iter().map(Into::into));
        self
    }

    pub fn classify(&self, err: &CloudError) -> ErrorClass {
        match err {
            CloudError::Transport(_) | CloudError::Retryable(_) => ErrorClass::Retryable,
            CloudError::Api { code, .. } => self.classify_code(code),
            CloudError::TagSync { source, .. } => self.classify(source),
            CloudError::NonRetryable(_)
            | CloudError::TimedOut { .. }
            | CloudError::InvalidId { .. }
            | CloudError::InvalidAddress(_)
            | CloudError::InvalidPageLimit
            | CloudError::Config(_) => ErrorClass::Fatal,
        }
    }

    pub fn classify_code(&self, code: &str) -> ErrorClass {
        if self
            .extra_retryable
            .iter()
            .any(|family| code_in_family(code, family))
        {
            return ErrorClass::Retryable;
        }
        if FATAL_CODES.iter().any(|family| code_in_family(code, family)) {
            return ErrorClass::Fatal;
        }
        ErrorClass::Retryable
    }
}

/// Classify with the default deny-list
pub fn classify(err: &CloudError) -> ErrorClass {
    Classifier::default().classify(err)
}

impl CloudError {
    /// Where this error sits in the retryable/fatal/timed-out taxonomy
    pub fn kind(&self) -> ErrorKind {
        if self.is_timed_out() {
            return ErrorKind::TimedOut;
        }
        match classify(self) {
            ErrorClass::Retryable => ErrorKind::Retryable,
            ErrorClass::Fatal => ErrorKind::Fatal,
        }
    }
}
