use tracing::debug;

use crate::{
    framework::StateResult,
    github::GitHub,
    workflow::{Job, Jobs},
};

/// Fetches the jobs of a workflow run, in listing order.
///
/// # Errors
///
/// Returns an error that instructs retrying or cancelling if listing the jobs fails.
pub async fn fetch_jobs(github: &GitHub, owner: &str, repo: &str, run_id: u64) -> StateResult<Vec<Job>> {
    let url = github.url(&format!("/repos/{owner}/{repo}/actions/runs/{run_id}/jobs"));
    debug!("fetching jobs from {url}…");

    github.get_pages::<Jobs>(&url, &[]).await
}
