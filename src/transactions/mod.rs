//! Pre-made transactions against GitHub REST API.
//!
//! Each transaction issues one logical call and reports failures as [`StateError`](crate::framework::StateError)
//! so callers can drive it with [`retry`](crate::framework::retry).

mod download_artifact;
mod extract_archive;
mod fetch_artifacts;
mod fetch_job_log;
mod fetch_jobs;
mod fetch_packages;
mod fetch_runs;
mod fetch_workflows;

pub use download_artifact::*;
pub use extract_archive::*;
pub use fetch_artifacts::*;
pub use fetch_job_log::*;
pub use fetch_jobs::*;
pub use fetch_packages::*;
pub use fetch_runs::*;
pub use fetch_workflows::*;
