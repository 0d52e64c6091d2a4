use std::path::Path;

use futures::StreamExt as _;
use reqwest::{StatusCode, header};
use tokio::io::AsyncWriteExt as _;
use tracing::{debug, error, info};

use crate::{
    framework::{StateError, StateResult},
    github::{GitHub, classify},
};

/// Where the archive of an artifact can be downloaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadLocation {
    /// A short-lived, pre-signed location that must be fetched without the API token.
    Redirected(String),
    /// The API endpoint served the archive itself.
    Direct(String),
}

/// Resolves the download location of an artifact archive without downloading it.
///
/// # Errors
///
/// Returns an error that instructs retrying or cancelling if the location cannot be resolved. Expired artifacts
/// cancel the transaction.
pub async fn resolve_download_location(
    github: &GitHub,
    owner: &str,
    repo: &str,
    artifact_id: u64,
) -> StateResult<DownloadLocation> {
    let url = github.url(&format!(
        "/repos/{owner}/{repo}/actions/artifacts/{artifact_id}/zip"
    ));
    debug!("requesting download from {url}…");

    let response = github
        .request_without_redirect(&url)
        .send()
        .await
        .map_err(|err| classify(&url, &err))?;

    match response.status() {
        status if status.is_redirection() => response
            .headers()
            .get(header::LOCATION)
            .and_then(|location| location.to_str().ok())
            .map(|location| {
                info!("requested download from {url}");
                DownloadLocation::Redirected(location.to_owned())
            })
            .ok_or_else(|| {
                error!("failed to request download from {url}: redirect without location");
                StateError::Cancelled(format!("{url}: redirect without location"))
            }),
        StatusCode::GONE => {
            error!("failed to request download: artifact expired or removed");
            Err(StateError::Cancelled(format!(
                "artifact {artifact_id} expired or removed"
            )))
        }
        status if status.is_success() => Ok(DownloadLocation::Direct(url)),
        status => match response.error_for_status() {
            Err(err) => Err(classify(&url, &err)),
            Ok(_) => Err(StateError::Cancelled(format!("{url}: unexpected {status}"))),
        },
    }
}

/// Streams an artifact archive to a local file, returning the number of bytes written.
///
/// # Errors
///
/// Returns an error that instructs retrying if the transfer breaks off, or cancelling if the file cannot be
/// written.
pub async fn download_to_file<P>(github: &GitHub, location: &DownloadLocation, path: P) -> StateResult<u64>
where
    P: AsRef<Path> + Send + Sync,
{
    let (url, request) = match location {
        DownloadLocation::Redirected(url) => (url, github.plain_request(url)),
        DownloadLocation::Direct(url) => (url, github.request(url)),
    };
    let path = path.as_ref();
    debug!("downloading {} to {path:?}…", redact(url));

    let response = request
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|err| classify(&redact(url), &err))?;

    let mut file = tokio::fs::File::create(path).await.map_err(|err| {
        error!("failed to create {path:?}: {err}");
        StateError::Cancelled(format!("failed to create {path:?}: {err}"))
    })?;

    let mut written: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| {
            error!("download of {path:?} broke off: {err}");
            StateError::Retry(format!("download of {path:?} broke off"))
        })?;
        file.write_all(&chunk).await.map_err(|err| {
            error!("failed to write {path:?}: {err}");
            StateError::Cancelled(format!("failed to write {path:?}: {err}"))
        })?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(|err| {
        StateError::Cancelled(format!("failed to write {path:?}: {err}"))
    })?;

    info!("downloaded {written} bytes to {path:?}");
    Ok(written)
}

/// Strips the query of a pre-signed location, which carries its signature.
fn redact(url: &str) -> String {
    url.split_once('?')
        .map_or(url, |(base, _)| base)
        .to_owned()
}
