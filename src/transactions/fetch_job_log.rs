use reqwest::StatusCode;
use tracing::{debug, error, info};

use crate::{
    framework::{StateError, StateResult},
    github::{GitHub, classify},
};

/// Downloads the plain-text log of a job.
///
/// GitHub answers with a redirect to a short-lived location, which is followed.
///
/// # Errors
///
/// Returns an error that instructs retrying or cancelling if downloading the log fails. Logs that were archived
/// or expired cancel the transaction.
pub async fn fetch_job_log(github: &GitHub, owner: &str, repo: &str, job_id: u64) -> StateResult<String> {
    let url = github.url(&format!("/repos/{owner}/{repo}/actions/jobs/{job_id}/logs"));
    debug!("requesting log from {url}…");

    let response = match github.request(&url).send().await {
        Ok(response) => response,
        Err(err) => return Err(classify(&url, &err)),
    };

    match response.status() {
        StatusCode::GONE => {
            error!("failed to download log of job {job_id}: log archived or expired");
            Err(StateError::Cancelled(format!(
                "log of job {job_id} is archived or expired"
            )))
        }
        _ => {
            let response = response
                .error_for_status()
                .map_err(|err| classify(&url, &err))?;
            let log = response.text().await.map_err(|err| {
                error!("failed to read log of job {job_id}: {err}");
                StateError::Retry(format!("truncated log of job {job_id}"))
            })?;
            info!("downloaded log of job {job_id} ({} bytes)", log.len());
            Ok(log)
        }
    }
}
