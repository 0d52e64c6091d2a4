//! Container images, relayed with the `docker` CLI.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::{
    config::{Destination, REGISTRY_HOST},
    error::RelayError,
    package::PackageIdentity,
    tool::run_tool,
};

use super::Republisher;

const LOADED_IMAGE: &str = "Loaded image: ";

/// Loads an image archive, checks its tag, re-tags it for the destination and pushes it.
#[derive(Debug, Clone)]
pub struct DockerRepublisher {
    destination: Destination,
    work_dir: PathBuf,
    program: String,
    program_args: Vec<String>,
}

impl DockerRepublisher {
    /// Creates a republisher using `docker` from `PATH`, writing its scratch files to `work_dir`.
    pub fn new(destination: Destination, work_dir: PathBuf) -> Self {
        Self {
            destination,
            work_dir,
            program: String::from("docker"),
            program_args: Vec::new(),
        }
    }

    /// Replaces the `docker` invocation, e.g. with `podman` or a wrapper script.
    pub fn with_program(mut self, program: String, program_args: Vec<String>) -> Self {
        self.program = program;
        self.program_args = program_args;
        self
    }

    async fn docker(&self, args: &[&str]) -> Result<String, RelayError> {
        let args = self
            .program_args
            .iter()
            .map(String::as_str)
            .chain(args.iter().copied());
        Ok(run_tool(&self.program, args, None).await?.stdout)
    }
}

#[async_trait]
impl Republisher for DockerRepublisher {
    async fn republish(&self, identity: &PackageIdentity, package: &Path) -> Result<(), RelayError> {
        let archive = package
            .to_str()
            .with_context(|| format!("{package:?} is not valid UTF-8"))?;

        info!("loading {archive}…");
        let output = self.docker(&["load", "--input", archive]).await?;
        let load_capture = self.work_dir.join(format!("{}.load.txt", identity.file_name));
        tokio::fs::write(&load_capture, &output)
            .await
            .with_context(|| format!("failed to write {load_capture:?}"))?;

        let loaded = loaded_reference(&output).ok_or_else(|| {
            RelayError::Integrity(format!("{} loaded without a repository:tag", identity.file_name))
        })?;
        let expected = identity.image_reference();
        check_loaded_reference(&loaded, &expected)?;

        let target = destination_tag(&self.destination, &expected);
        let tag_file = self.work_dir.join(format!("{}.tag.txt", identity.file_name));
        tokio::fs::write(&tag_file, &target)
            .await
            .with_context(|| format!("failed to write {tag_file:?}"))?;

        debug!("tagging {loaded} as {target}…");
        self.docker(&["tag", loaded.as_str(), target.as_str()]).await?;

        info!("pushing {target}…");
        self.docker(&["push", target.as_str()])
            .await
            .map_err(|err| RelayError::Registry(format!("failed to push {target}: {err}")))?;

        Ok(())
    }
}

/// Reads the `repository:tag` an image was loaded as from `docker load` output.
pub fn loaded_reference(output: &str) -> Option<String> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix(LOADED_IMAGE))
        .map(str::trim)
        .filter(|reference| !reference.is_empty())
        .last()
        .map(str::to_owned)
}

/// Checks that the final path segment of the loaded reference is the `name:tag` the file name promised.
///
/// # Errors
///
/// Returns [`RelayError::Integrity`] on a mismatch.
pub fn check_loaded_reference(loaded: &str, expected: &str) -> Result<(), RelayError> {
    let segment = loaded.rsplit('/').next().unwrap_or(loaded);
    if segment == expected {
        Ok(())
    } else {
        Err(RelayError::Integrity(format!(
            "image loaded as {loaded}, but its file name promised {expected}"
        )))
    }
}

/// The lower-cased reference an image is pushed to: `<host>/<owner>/<repo>/<name>:<tag>`.
pub fn destination_tag(destination: &Destination, reference: &str) -> String {
    format!(
        "{REGISTRY_HOST}/{}/{}/{reference}",
        destination.owner, destination.repo
    )
    .to_lowercase()
}
