use tracing::{debug, info};

use crate::{
    framework::StateResult,
    github::GitHub,
    workflow::artifact::{Artifact, Artifacts},
};

/// Fetches artifacts of a workflow run from GitHub.
///
/// # Errors
///
/// Returns an error that instructs retrying or cancelling if fetching the artifacts fails.
pub async fn fetch_artifacts(
    github: &GitHub,
    owner: &str,
    repo: &str,
    run_id: u64,
) -> StateResult<Vec<Artifact>> {
    let url = github.url(&format!("/repos/{owner}/{repo}/actions/runs/{run_id}/artifacts"));
    debug!("fetching artifacts from {url}…");

    let artifacts = github.get_pages::<Artifacts>(&url, &[]).await?;
    match artifacts.len() {
        1 => info!("fetched 1 artifact from {url}"),
        count => info!("fetched {count} artifacts from {url}"),
    }
    Ok(artifacts)
}
