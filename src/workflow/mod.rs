//! Data models of GitHub Actions workflows.

use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::github::Page;

pub mod artifact;
pub mod package;

/// Represents workflows of a repository from GitHub REST API.
#[derive(Debug, Deserialize, Clone)]
pub struct Workflows {
    pub total_count: u64,
    pub workflows: Vec<Workflow>,
}

/// Represents a GitHub Actions workflow from GitHub REST API.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Workflow {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub path: String,
}

/// Represents runs of a workflow from GitHub REST API.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkflowRuns {
    pub total_count: u64,
    pub workflow_runs: Vec<WorkflowRun>,
}

/// Represents a GitHub Actions workflow run from GitHub REST API.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct WorkflowRun {
    pub id: u64,
    pub run_number: u64,
    pub head_branch: Option<String>,
    pub head_sha: String,
    pub updated_at: DateTime<Utc>,
    pub html_url: String,
}

/// Represents jobs of a workflow run from GitHub REST API.
#[derive(Debug, Deserialize, Clone)]
pub struct Jobs {
    pub total_count: u64,
    pub jobs: Vec<Job>,
}

/// Represents a job of a workflow run from GitHub REST API.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: u64,
    pub run_id: u64,
    pub name: String,
    pub status: String,
    pub conclusion: Option<String>,
}

impl Job {
    /// Whether the job has finished, so its log is complete.
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }
}

impl Page for Workflows {
    type Item = Workflow;

    fn total_count(&self) -> Option<u64> {
        Some(self.total_count)
    }

    fn into_items(self) -> Vec<Workflow> {
        self.workflows
    }
}

impl Page for WorkflowRuns {
    type Item = WorkflowRun;

    fn total_count(&self) -> Option<u64> {
        Some(self.total_count)
    }

    fn into_items(self) -> Vec<WorkflowRun> {
        self.workflow_runs
    }
}

impl Page for Jobs {
    type Item = Job;

    fn total_count(&self) -> Option<u64> {
        Some(self.total_count)
    }

    fn into_items(self) -> Vec<Job> {
        self.jobs
    }
}

/// A workflow run selected for scanning, along with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReference {
    pub owner: String,
    pub repo: String,
    pub workflow_id: u64,
    pub workflow_name: String,
    pub run_id: u64,
    pub run_number: u64,
    pub branch: String,
    pub updated_at: DateTime<Utc>,
    pub url: String,
}

impl Display for RunReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} \"{}\" #{} ({} on {}, updated {}, {})",
            self.owner,
            self.repo,
            self.workflow_name,
            self.run_number,
            self.run_id,
            self.branch,
            self.updated_at.to_rfc3339(),
            self.url
        )
    }
}
