//! Republishing verified packages into the destination registry.
//!
//! Each package kind has its own [`Republisher`], which keeps external tools out of the relay loop.

use std::path::Path;

use async_trait::async_trait;

use crate::{error::RelayError, package::PackageIdentity};

pub mod docker;
#[cfg(feature = "nuget")]
pub mod nuget;

pub use docker::DockerRepublisher;
#[cfg(feature = "nuget")]
pub use nuget::NuGetRepublisher;

/// Pushes a verified package file into the destination registry under its destination identity.
#[async_trait]
pub trait Republisher: Send + Sync {
    /// Republishes the package at `package`, which has already passed its integrity check.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Integrity`] if the package contradicts its identity, or any failure rewriting or
    /// pushing it.
    async fn republish(&self, identity: &PackageIdentity, package: &Path) -> Result<(), RelayError>;
}
