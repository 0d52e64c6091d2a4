//! Packages from GitHub REST API.

use serde::Deserialize;

/// Represents a package owned by a user or organization.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Package {
    pub id: u64,
    pub name: String,
    pub package_type: String,
}

/// Represents a version of a package.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PackageVersion {
    pub id: u64,
    /// The version string, or the image digest for container packages.
    pub name: String,
    #[serde(default)]
    pub metadata: Option<PackageVersionMetadata>,
}

impl PackageVersion {
    /// The tags of a container package version, empty for other package types.
    pub fn tags(&self) -> &[String] {
        self.metadata
            .as_ref()
            .and_then(|metadata| metadata.container.as_ref())
            .map(|container| container.tags.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PackageVersionMetadata {
    pub package_type: String,
    #[serde(default)]
    pub container: Option<ContainerMetadata>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ContainerMetadata {
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Represents the owner of packages, as returned by `GET /users/{owner}`.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Owner {
    pub login: String,
    #[serde(rename = "type")]
    pub kind: String,
}
