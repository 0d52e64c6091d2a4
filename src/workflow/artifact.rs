//! Artifacts from GitHub REST API.

use serde::Deserialize;

use crate::github::Page;

/// Represents artifacts from GitHub REST API.
#[derive(Debug, Deserialize, Clone)]
pub struct Artifacts {
    pub total_count: u64,
    pub artifacts: Vec<Artifact>,
}

/// Represents an artifact from GitHub REST API.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub id: u64,
    pub name: String,
    pub size_in_bytes: u64,
    /// Whether the artifact passed its retention period and can no longer be downloaded.
    pub expired: bool,
    /// `<algorithm>:<hex>` digest of the archive, recorded by newer upload actions.
    pub digest: Option<String>,
}

impl Page for Artifacts {
    type Item = Artifact;

    fn total_count(&self) -> Option<u64> {
        Some(self.total_count)
    }

    fn into_items(self) -> Vec<Artifact> {
        self.artifacts
    }
}

/// An artifact resolved by exact name within the listing of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    pub id: u64,
    pub name: String,
    /// The run whose listing the artifact was found in.
    pub run_id: u64,
    pub size_in_bytes: u64,
    /// Expired artifacts cannot be downloaded.
    pub expired: bool,
    /// The digest the downloaded archive must match, if one was recorded.
    pub digest: Option<String>,
}

impl ArtifactHandle {
    /// Finds the artifact named exactly `name` in a run's listing.
    pub fn find(artifacts: &[Artifact], name: &str, run_id: u64) -> Option<Self> {
        artifacts
            .iter()
            .find(|artifact| artifact.name == name)
            .map(|artifact| Self {
                id: artifact.id,
                name: artifact.name.clone(),
                run_id,
                size_in_bytes: artifact.size_in_bytes,
                expired: artifact.expired,
                digest: artifact.digest.clone(),
            })
    }
}
