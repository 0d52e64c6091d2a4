//! Fetching the artifact behind a claim.

use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

use tokio::fs::{remove_dir_all, remove_file};
use tracing::{debug, info};

use crate::{
    error::RelayError,
    source::SourceApi,
    transactions::extract_archive_file,
    verify::verify_archive_digest,
    workflow::{RunReference, artifact::ArtifactHandle},
};

/// A downloaded and extracted artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArtifact {
    /// The downloaded archive.
    pub archive: PathBuf,
    /// The directory the archive was extracted to.
    pub extracted: PathBuf,
    /// The package file inside the extracted directory.
    pub package: PathBuf,
}

impl FetchedArtifact {
    /// Removes the archive and everything extracted from it, ignoring failures.
    pub async fn cleanup(&self) {
        remove_intermediates(&self.archive, &self.extracted).await;
    }
}

async fn remove_intermediates(archive: &Path, extracted: &Path) {
    debug!("removing {archive:?} and {extracted:?}…");
    drop(remove_file(archive).await);
    drop(remove_dir_all(extracted).await);
}

/// Downloads the artifact named `name` from a run into `work_dir` and extracts the package file from it.
///
/// The archive is saved as `<name>.zip` and extracted into `<name>.d/`. On success the caller owns both and
/// should [`cleanup`](FetchedArtifact::cleanup) when done; on failure they are already removed.
///
/// # Errors
///
/// Returns [`RelayError::NotFound`] if the run has no unexpired artifact of that name or the archive does not
/// contain the package file, [`RelayError::Integrity`] if the archive does not match the digest recorded at
/// upload, or any failure downloading or extracting it.
pub async fn fetch_artifact(
    source: &dyn SourceApi,
    run: &RunReference,
    name: &str,
    work_dir: &Path,
) -> Result<FetchedArtifact, RelayError> {
    let artifacts = source.artifacts(run).await?;
    let handle = ArtifactHandle::find(&artifacts, name, run.run_id).ok_or_else(|| {
        RelayError::NotFound(format!(
            "artifact {name} not found in run #{} ({})",
            run.run_number, run.run_id
        ))
    })?;
    if handle.expired {
        return Err(RelayError::NotFound(format!(
            "artifact {name} of run #{} ({}) has expired",
            run.run_number, run.run_id
        )));
    }

    let local_name = sanitize_filename::sanitize(name);
    let archive = work_dir.join(format!("{local_name}.zip"));
    let extracted = work_dir.join(format!("{local_name}.d"));

    info!(
        "downloading artifact {name} ({}, {} bytes)…",
        handle.id, handle.size_in_bytes
    );
    if let Err(err) = source.download_artifact(run, &handle, &archive).await {
        remove_intermediates(&archive, &extracted).await;
        return Err(err.into());
    }

    if let Some(digest) = &handle.digest {
        if let Err(err) = verify_archive_digest(&archive, digest).await {
            remove_intermediates(&archive, &extracted).await;
            return Err(err);
        }
    }

    let files = match extract_archive_file(&archive, &extracted).await {
        Ok(files) => files,
        Err(err) => {
            remove_intermediates(&archive, &extracted).await;
            return Err(err.into());
        }
    };

    match files
        .into_iter()
        .find(|file| file.file_name() == Some(OsStr::new(&local_name)))
    {
        Some(package) => {
            info!("fetched {name} to {package:?}");
            Ok(FetchedArtifact {
                archive,
                extracted,
                package,
            })
        }
        None => {
            remove_intermediates(&archive, &extracted).await;
            Err(RelayError::NotFound(format!(
                "artifact {name} does not contain {name}"
            )))
        }
    }
}
