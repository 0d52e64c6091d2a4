//! The source repository's CI: workflows, runs, jobs, logs and artifacts.

use std::path::Path;

use anyhow::Context as _;
use async_trait::async_trait;

use crate::{
    framework::retry,
    github::GitHub,
    transactions::{
        download_to_file, fetch_artifacts, fetch_job_log, fetch_jobs, fetch_runs,
        fetch_workflows, resolve_download_location,
    },
    workflow::{
        Job, RunReference, Workflow, WorkflowRun,
        artifact::{Artifact, ArtifactHandle},
    },
};

/// Read access to the CI system of the source repositories.
#[async_trait]
pub trait SourceApi: Send + Sync {
    /// Lists every workflow of a repository.
    async fn workflows(&self, owner: &str, repo: &str) -> anyhow::Result<Vec<Workflow>>;

    /// Lists recent runs of a workflow, filtered to a branch.
    async fn runs(
        &self,
        owner: &str,
        repo: &str,
        workflow_id: u64,
        branch: &str,
    ) -> anyhow::Result<Vec<WorkflowRun>>;

    /// Lists the jobs of a run.
    async fn jobs(&self, run: &RunReference) -> anyhow::Result<Vec<Job>>;

    /// Downloads the log of a job.
    async fn job_log(&self, run: &RunReference, job: &Job) -> anyhow::Result<String>;

    /// Lists the artifacts of a run.
    async fn artifacts(&self, run: &RunReference) -> anyhow::Result<Vec<Artifact>>;

    /// Downloads the archive of an artifact to a local file.
    async fn download_artifact(
        &self,
        run: &RunReference,
        artifact: &ArtifactHandle,
        path: &Path,
    ) -> anyhow::Result<()>;
}

/// [`SourceApi`] backed by GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubSource {
    github: GitHub,
}

impl GitHubSource {
    /// Reads the source repositories through `github`.
    pub fn new(github: GitHub) -> Self {
        Self { github }
    }
}

#[async_trait]
impl SourceApi for GitHubSource {
    async fn workflows(&self, owner: &str, repo: &str) -> anyhow::Result<Vec<Workflow>> {
        retry("list workflows", || fetch_workflows(&self.github, owner, repo))
            .await
            .with_context(|| format!("failed to list workflows of {owner}/{repo}"))
    }

    async fn runs(
        &self,
        owner: &str,
        repo: &str,
        workflow_id: u64,
        branch: &str,
    ) -> anyhow::Result<Vec<WorkflowRun>> {
        retry("list runs", || {
            fetch_runs(&self.github, owner, repo, workflow_id, branch)
        })
        .await
        .with_context(|| format!("failed to list runs of workflow {workflow_id} in {owner}/{repo}"))
    }

    async fn jobs(&self, run: &RunReference) -> anyhow::Result<Vec<Job>> {
        retry("list jobs", || {
            fetch_jobs(&self.github, &run.owner, &run.repo, run.run_id)
        })
        .await
        .with_context(|| format!("failed to list jobs of run {}", run.run_id))
    }

    async fn job_log(&self, run: &RunReference, job: &Job) -> anyhow::Result<String> {
        retry("download log", || {
            fetch_job_log(&self.github, &run.owner, &run.repo, job.id)
        })
        .await
        .with_context(|| format!("failed to download log of job {} ({})", job.name, job.id))
    }

    async fn artifacts(&self, run: &RunReference) -> anyhow::Result<Vec<Artifact>> {
        retry("list artifacts", || {
            fetch_artifacts(&self.github, &run.owner, &run.repo, run.run_id)
        })
        .await
        .with_context(|| format!("failed to list artifacts of run {}", run.run_id))
    }

    async fn download_artifact(
        &self,
        run: &RunReference,
        artifact: &ArtifactHandle,
        path: &Path,
    ) -> anyhow::Result<()> {
        let location = retry("resolve download", || {
            resolve_download_location(&self.github, &run.owner, &run.repo, artifact.id)
        })
        .await
        .with_context(|| format!("failed to resolve download of artifact {}", artifact.name))?;

        retry("download artifact", || {
            download_to_file(&self.github, &location, path)
        })
        .await
        .with_context(|| format!("failed to download artifact {}", artifact.name))?;

        Ok(())
    }
}
