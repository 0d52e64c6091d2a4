//! The error taxonomy of the relay.

use thiserror::Error;

/// Errors reported while relaying packages.
///
/// Every variant is recoverable at some granularity: the loop reports it and moves on to the
/// next package, run or workflow.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RelayError {
    /// A configured workflow triple is malformed or names a workflow that does not exist.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// An artifact or a file inside it is missing.
    #[error("not found: {0}")]
    NotFound(String),
    /// A checksum or image tag does not match what the build log claimed.
    #[error("integrity error: {0}")]
    Integrity(String),
    /// A package name matches none of the known naming conventions.
    #[error("unsupported package type: {0}")]
    UnsupportedType(String),
    /// A run could not be processed, typically because its logs were archived.
    #[error("run {run} failed: {reason}")]
    TransientRun {
        /// The run, formatted for diagnostics.
        run: String,
        /// The underlying failure.
        reason: String,
    },
    /// The destination registry could not be queried or pushed to.
    #[error("registry error: {0}")]
    Registry(String),
    /// An external tool exited unsuccessfully.
    #[error("tool error: {0}")]
    Tool(String),
    /// Any other failure, usually I/O or transport.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RelayError {
    /// Wraps any failure as a [`RelayError::TransientRun`] of the given run.
    pub fn transient<R, E>(run: R, err: E) -> Self
    where
        R: ToString,
        E: Into<anyhow::Error>,
    {
        Self::TransientRun {
            run: run.to_string(),
            reason: format!("{:#}", err.into()),
        }
    }
}
