//! tcrecon reconciliation runtime
//!
//! Shared machinery behind every resource adapter of a cloud-provider plugin.
//! Adapters describe remote calls as closures; the runtime retries them under
//! bounded budgets, waits for the remote object to converge, keeps its tags in
//! sync and packs multi-part ids into one string.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │          resource adapter (create/read/...)      │
//! └────────┬──────────────┬──────────────┬──────────┘
//!          │              │              │
//! ┌────────▼───────┐ ┌────▼─────┐ ┌──────▼─────────┐
//! │ RetryExecutor  │ │  Poller  │ │ TagSynchronizer│
//! │ (read / write  │ │ (fixed   │ │  diff + one    │
//! │  budgets)      │ │  cadence)│ │  modify call   │
//! └────────┬───────┘ └────┬─────┘ └──────┬─────────┘
//!          │              │              │ collect()
//! ┌────────▼──────────────▼──────────────▼─────────┐
//! │      Classifier: Retryable | Fatal per code     │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! Budgets come from [`tcrecon_config::RuntimeConfig`] and are read-only once
//! built; every primitive here can be shared between concurrent tasks.

pub mod budget;
pub mod call;
pub mod classify;
pub mod error;
pub mod executor;
pub mod id;
pub mod logging;
pub mod paginate;
pub mod poller;
pub mod tags;

// Re-exports
pub use budget::{Budgets, MIN_RETRY_INTERVAL, RetryBudget};
pub use call::{OperationKind, RemoteCall};
pub use classify::{Classifier, ErrorClass, ErrorKind, FATAL_CODES, classify};
pub use error::{CloudError, Result};
pub use executor::RetryExecutor;
pub use id::{COMMA_SEPARATOR, FIELD_SEPARATOR, IdCodec};
pub use logging::ElapsedLog;
pub use paginate::{DEFAULT_PAGE_LIMIT, Page, collect};
pub use poller::{Observation, PollState, Poller};
pub use tags::{ResourceAddress, ResourceTag, TagApi, TagDiff, TagSet, TagSynchronizer, diff};
pub use tcrecon_config::RuntimeConfig;
