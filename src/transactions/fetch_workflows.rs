use tracing::{debug, info};

use crate::{
    framework::StateResult,
    github::GitHub,
    workflow::{Workflow, Workflows},
};

/// Fetches every workflow of a repository.
///
/// # Errors
///
/// Returns an error that instructs retrying or cancelling if listing the workflows fails.
pub async fn fetch_workflows(github: &GitHub, owner: &str, repo: &str) -> StateResult<Vec<Workflow>> {
    let url = github.url(&format!("/repos/{owner}/{repo}/actions/workflows"));
    debug!("fetching workflows from {url}…");

    let workflows = github.get_pages::<Workflows>(&url, &[]).await?;
    info!("fetched {} workflow(s) of {owner}/{repo}", workflows.len());
    Ok(workflows)
}
