//! Selection of the workflow runs worth scanning.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info};

use crate::{
    config::WorkflowTriple, error::RelayError, source::SourceApi, workflow::RunReference,
};

/// How far back runs are scanned, in hours.
pub const WINDOW_HOURS: i64 = 12;

/// The trailing window before an invocation in which runs are scanned.
pub fn trailing_window() -> TimeDelta {
    TimeDelta::hours(WINDOW_HOURS)
}

/// Lists the runs of a triple's workflow on its branch that were updated at or after `since`.
///
/// The branch is filtered by the API, recency locally.
///
/// # Errors
///
/// Returns [`RelayError::Configuration`] if the repository has no workflow of that name, or any failure of
/// the source API.
pub async fn scan_runs(
    source: &dyn SourceApi,
    owner: &str,
    triple: &WorkflowTriple,
    since: DateTime<Utc>,
) -> Result<Vec<RunReference>, RelayError> {
    let workflows = source.workflows(owner, &triple.repo).await?;
    let Some(workflow) = workflows
        .into_iter()
        .find(|workflow| workflow.name == triple.workflow)
    else {
        return Err(RelayError::Configuration(format!(
            "workflow \"{}\" not found in {owner}/{}",
            triple.workflow, triple.repo
        )));
    };

    let runs = source
        .runs(owner, &triple.repo, workflow.id, &triple.branch)
        .await?;
    let listed = runs.len();

    let recent = runs
        .into_iter()
        .filter(|run| {
            let recent = run.updated_at >= since;
            if !recent {
                debug!(
                    "ignoring run #{} ({}): last updated {}",
                    run.run_number,
                    run.id,
                    run.updated_at.to_rfc3339()
                );
            }
            recent
        })
        .map(|run| RunReference {
            owner: owner.to_owned(),
            repo: triple.repo.clone(),
            workflow_id: workflow.id,
            workflow_name: workflow.name.clone(),
            run_id: run.id,
            run_number: run.run_number,
            branch: run.head_branch.unwrap_or_else(|| triple.branch.clone()),
            updated_at: run.updated_at,
            url: run.html_url,
        })
        .collect::<Vec<_>>();

    info!(
        "{} of {listed} run(s) of {owner}/{triple} updated since {}",
        recent.len(),
        since.to_rfc3339()
    );
    Ok(recent)
}
