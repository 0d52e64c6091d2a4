//! Retry control for calls against remote APIs.
//!
//! A transaction returns a [`StateResult`]; [`retry`] drives it until it succeeds, fails for
//! good, or runs out of [`MAX_RETRIES`](crate::env::MAX_RETRIES).

mod state;

pub use state::*;
