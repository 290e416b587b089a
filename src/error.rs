//! Definition of the crate's error and result.

use std::io;
use std::sync::{Arc, PoisonError};

use itertools::Itertools;
use thiserror::Error;

/// The library's error enum.
///
/// Errors raised by the wrapped aggregation logic are forwarded unchanged;
/// the adapter itself only adds the close related variants.
#[derive(Debug, Clone, Error)]
pub enum AggregationError {
    /// An IO error occurred in the wrapped aggregation logic.
    #[error("An IO error occurred: '{0}'")]
    IoError(Arc<io::Error>),
    /// Invalid argument was passed by the user.
    #[error("An invalid argument was passed: '{0}'")]
    InvalidArgument(String),
    /// Unexpected internal state.
    #[error("Internal error: '{0}'")]
    InternalError(String),
    /// A thread holding the lock panicked and poisoned the lock.
    #[error("A thread holding the lock panicked and poisoned the lock")]
    Poisoned,
    /// The registry was asked for an aggregator after it was closed.
    #[error("The bucket aggregator registry is already closed")]
    AlreadyClosed,
    /// One or more per-bucket aggregators failed to release during close.
    ///
    /// Close is best-effort: every instance is given a chance to release and
    /// all failures are reported together.
    #[error("Failed to close {} bucket aggregator(s): {}", .0.len(), .0.iter().join("; "))]
    CloseFailed(Vec<AggregationError>),
}

impl From<io::Error> for AggregationError {
    fn from(io_error: io::Error) -> AggregationError {
        AggregationError::IoError(Arc::new(io_error))
    }
}

impl<Guard> From<PoisonError<Guard>> for AggregationError {
    fn from(_: PoisonError<Guard>) -> AggregationError {
        AggregationError::Poisoned
    }
}
