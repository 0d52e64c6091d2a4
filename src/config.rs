//! Configuration of a relay batch.

use std::{fmt::Display, path::PathBuf};

use crate::error::RelayError;

/// The container registry packages are pushed to.
pub const REGISTRY_HOST: &str = "ghcr.io";

/// The name of the preconfigured NuGet source packages are pushed to.
pub const NUGET_SOURCE_NAME: &str = "github";

/// The NuGet feed of a destination owner.
pub fn nuget_source_url(owner: &str) -> String {
    format!("https://nuget.pkg.github.com/{owner}/index.json")
}

/// A `repo/workflow-name/branch` triple naming the runs to scan in the source owner's repositories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowTriple {
    /// Repository of the source owner.
    pub repo: String,
    /// Display name of the workflow, matched exactly.
    pub workflow: String,
    /// Branch the runs were built from.
    pub branch: String,
}

impl WorkflowTriple {
    /// Parses a triple.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Configuration`] unless the input splits into exactly three non-empty segments.
    pub fn parse(raw: &str) -> Result<Self, RelayError> {
        match raw.trim().split('/').collect::<Vec<_>>().as_slice() {
            [repo, workflow, branch]
                if !repo.is_empty() && !workflow.is_empty() && !branch.is_empty() =>
            {
                Ok(Self {
                    repo: (*repo).to_owned(),
                    workflow: (*workflow).to_owned(),
                    branch: (*branch).to_owned(),
                })
            }
            _ => Err(RelayError::Configuration(format!(
                "\"{raw}\" is not of the form repo/workflow-name/branch"
            ))),
        }
    }
}

impl Display for WorkflowTriple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.repo, self.workflow, self.branch)
    }
}

/// The repository whose registry receives the packages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// User or organization owning the registry.
    pub owner: String,
    /// Repository the pushed packages are linked to.
    pub repo: String,
}

impl Destination {
    /// Parses an `owner/repo` identity such as `GITHUB_REPOSITORY`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Configuration`] if the input is not `owner/repo`.
    pub fn parse(raw: &str) -> Result<Self, RelayError> {
        match raw.trim().split_once('/') {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
                Ok(Self {
                    owner: owner.to_owned(),
                    repo: repo.to_owned(),
                })
            }
            _ => Err(RelayError::Configuration(format!(
                "\"{raw}\" is not of the form owner/repo"
            ))),
        }
    }

    /// The URL of the destination repository on GitHub.
    pub fn repository_url(&self) -> String {
        format!("https://github.com/{}/{}", self.owner, self.repo)
    }
}

impl Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Everything a batch needs, validated.
#[derive(Clone)]
pub struct Config {
    /// Owner of the source repositories.
    pub source_owner: String,
    /// Raw triples. They are validated one by one while relaying so one bad entry cannot stop the others.
    pub triples: Vec<String>,
    /// Token reading the source repositories' actions.
    pub source_token: String,
    /// User pushing to the destination registries.
    pub registry_user: String,
    /// Token of [`registry_user`](Self::registry_user), also used to query the registries.
    pub registry_token: String,
    pub destination: Destination,
    /// Scratch directory for downloads and credential files.
    pub work_dir: PathBuf,
    /// Whether legacy library packages are relayed at all.
    pub publish_nuget: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("source_owner", &self.source_owner)
            .field("triples", &self.triples)
            .field("registry_user", &self.registry_user)
            .field("destination", &self.destination)
            .field("work_dir", &self.work_dir)
            .field("publish_nuget", &self.publish_nuget)
            .finish_non_exhaustive()
    }
}

/// Splits a list of triples separated by newlines or commas, dropping blank entries.
pub fn split_triples(raw: &str) -> Vec<String> {
    raw.split(['\n', ','])
        .map(str::trim)
        .filter(|triple| !triple.is_empty())
        .map(str::to_owned)
        .collect()
}
