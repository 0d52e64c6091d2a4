use tracing::{debug, info};

use crate::{
    framework::StateResult,
    github::{GitHub, PAGE_SIZE},
    workflow::{WorkflowRun, WorkflowRuns},
};

/// Fetches the most recent runs of a workflow on a branch.
///
/// Only the first page is requested: runs are listed newest first, and older runs fall outside any
/// trailing window anyway.
///
/// # Errors
///
/// Returns an error that instructs retrying or cancelling if listing the runs fails.
pub async fn fetch_runs(
    github: &GitHub,
    owner: &str,
    repo: &str,
    workflow_id: u64,
    branch: &str,
) -> StateResult<Vec<WorkflowRun>> {
    let url = github.url(&format!(
        "/repos/{owner}/{repo}/actions/workflows/{workflow_id}/runs"
    ));
    debug!("fetching runs of workflow {workflow_id} on {branch} from {url}…");

    let runs = github
        .get_json::<WorkflowRuns>(
            &url,
            &[
                ("branch", branch.to_owned()),
                ("per_page", PAGE_SIZE.to_string()),
            ],
        )
        .await?
        .workflow_runs;

    info!(
        "fetched {} run(s) of workflow {workflow_id} on {branch}",
        runs.len()
    );
    Ok(runs)
}
