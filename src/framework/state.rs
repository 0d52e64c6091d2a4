use std::future::Future;

use thiserror::Error;
use tracing::{error, warn};

use crate::env::MAX_RETRIES;

/// An error that controls the flow of a transaction.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// The transaction failed transiently and should be retried if possible.
    ///
    /// See: [`retry_if_possible`]
    #[error("transient failure: {0}")]
    Retry(String),
    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The transaction failed for good and should not be retried.
    #[error("{0}")]
    Cancelled(String),
}

/// The result of a transaction.
pub type StateResult<T> = Result<T, StateError>;

/// Decides whether retrying is allowed based on a provided retry count and the [`MAX_RETRIES`] environment variable.
///
/// # Errors
///
/// Returns [`Err<()>`] if retrying is not allowed, otherwise [`Ok<()>`] is returned.
pub fn retry_if_possible(retry: &mut u8) -> Result<(), ()> {
    if *retry >= *MAX_RETRIES {
        error!("retried for too many times ({}), stopping!", *MAX_RETRIES);
        Err(())
    } else {
        *retry += 1;
        warn!("retrying… ({retry} / {})", *MAX_RETRIES);
        Ok(())
    }
}

/// Runs a transaction until it succeeds, fails with anything but [`StateError::Retry`], or the retry limit is reached.
///
/// # Errors
///
/// Returns the last error of the transaction.
pub async fn retry<T, F, Fut>(name: &str, mut transaction: F) -> StateResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StateResult<T>>,
{
    let mut retry: u8 = 0;

    loop {
        match transaction().await {
            Ok(value) => return Ok(value),
            Err(StateError::Retry(reason)) => {
                warn!("transaction {name} failed transiently: {reason}");
                if retry_if_possible(&mut retry).is_err() {
                    return Err(StateError::Retry(reason));
                }
            }
            Err(err) => return Err(err),
        }
    }
}
