//! Error types for the reconciliation runtime

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by remote calls and by the runtime itself
#[derive(Error, Debug)]
pub enum CloudError {
    /// Structured error returned by the provider API
    #[error(
        "[TencentCloudSDKError] Code={code}, Message={message}, RequestId={}",
        .request_id.as_deref().unwrap_or("-")
    )]
    Api {
        code: String,
        message: String,
        request_id: Option<String>,
    },

    /// The request never produced a structured answer (network, TLS, HTTP status)
    #[error("transport error: {0}")]
    Transport(String),

    /// Raised by an adapter closure to force another attempt
    #[error("{0}")]
    Retryable(String),

    /// Raised by an adapter closure to stop retrying
    #[error("{0}")]
    NonRetryable(String),

    #[error("{action} timed out after {budget:?} ({attempts} attempts), last error: {last}")]
    TimedOut {
        action: String,
        budget: Duration,
        attempts: u32,
        #[source]
        last: Box<CloudError>,
    },

    #[error("invalid composite id {id:?}: {reason}")]
    InvalidId { id: String, reason: String },

    #[error("invalid resource address {0:?}")]
    InvalidAddress(String),

    #[error("page limit must be greater than zero")]
    InvalidPageLimit,

    #[error("failed to sync tags for {resource}: {source}")]
    TagSync {
        resource: String,
        #[source]
        source: Box<CloudError>,
    },

    #[error("configuration error: {0}")]
    Config(#[from] tcrecon_config::ConfigError),
}

impl CloudError {
    /// Build a provider API error
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        CloudError::Api {
            code: code.into(),
            message: message.into(),
            request_id: None,
        }
    }

    /// Attach the provider request id to an API error; other variants are returned as-is
    pub fn with_request_id(self, id: impl Into<String>) -> Self {
        match self {
            CloudError::Api { code, message, .. } => CloudError::Api {
                code,
                message,
                request_id: Some(id.into()),
            },
            other => other,
        }
    }

    /// The provider error code, looking through timeout and tag-sync wrappers
    pub fn code(&self) -> Option<&str> {
        match self {
            CloudError::Api { code, .. } => Some(code),
            CloudError::TimedOut { last, .. } => last.code(),
            CloudError::TagSync { source, .. } => source.code(),
            _ => None,
        }
    }

    /// Whether the provider code belongs to `family` (`ResourceNotFound` matches
    /// `ResourceNotFound.InstanceNotFound`)
    pub fn has_code(&self, family: &str) -> bool {
        self.code().is_some_and(|code| code_in_family(code, family))
    }

    pub fn is_not_found(&self) -> bool {
        self.has_code("ResourceNotFound")
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, CloudError::TimedOut { .. })
    }
}

pub(crate) fn code_in_family(code: &str, family: &str) -> bool {
    code == family
        || code
            .strip_prefix(family)
            .is_some_and(|rest| rest.starts_with('.'))
}

pub type Result<T> = std::result::Result<T, CloudError>;
