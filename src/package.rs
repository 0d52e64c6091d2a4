//! Package identities recovered from artifact file names.
//!
//! Container images are named `<logical-name>_<tag>.docker.tar.gz`, library packages
//! `<logical-name>.<version>.nupkg`.

use std::fmt::Display;

use crate::error::RelayError;

/// The file name suffix of container image archives.
pub const CONTAINER_SUFFIX: &str = ".docker.tar.gz";
/// The file name suffix of NuGet library packages.
pub const LIBRARY_SUFFIX: &str = ".nupkg";

/// The kind of a package, selecting its gate and republisher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageKind {
    /// A container image archive.
    Container,
    /// A legacy NuGet library package.
    Library,
}

impl Display for PackageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Container => f.write_str("container"),
            Self::Library => f.write_str("nuget"),
        }
    }
}

/// A package identity parsed from a claimed file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageIdentity {
    /// The claimed file name, which is also the artifact name.
    pub file_name: String,
    /// The logical package or image name.
    pub name: String,
    /// The image tag or package version.
    pub version: String,
    /// Selects the gate and republisher of the package.
    pub kind: PackageKind,
}

impl PackageIdentity {
    /// Parses a claimed file name.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::UnsupportedType`] if the name follows no known convention.
    pub fn parse(file_name: &str) -> Result<Self, RelayError> {
        if let Some(stem) = file_name.strip_suffix(CONTAINER_SUFFIX) {
            // The first underscore separates the image name from the tag.
            return match stem.split_once('_') {
                Some((name, tag)) if !name.is_empty() && !tag.is_empty() => Ok(Self {
                    file_name: file_name.to_owned(),
                    name: name.to_owned(),
                    version: tag.to_owned(),
                    kind: PackageKind::Container,
                }),
                _ => Err(unsupported(file_name)),
            };
        }

        if let Some(stem) = file_name.strip_suffix(LIBRARY_SUFFIX) {
            let segments = stem.split('.').collect::<Vec<_>>();
            let version_start = segments
                .iter()
                .position(|segment| segment.starts_with(|c: char| c.is_ascii_digit()));

            return match version_start {
                Some(start) if start > 0 && segments[..start].iter().all(|s| !s.is_empty()) => {
                    Ok(Self {
                        file_name: file_name.to_owned(),
                        name: segments[..start].join("."),
                        version: segments[start..].join("."),
                        kind: PackageKind::Library,
                    })
                }
                _ => Err(unsupported(file_name)),
            };
        }

        Err(unsupported(file_name))
    }

    /// The `repository:tag` reference a container archive is expected to load as.
    pub fn image_reference(&self) -> String {
        format!("{}:{}", self.name, self.version)
    }
}

impl Display for PackageIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.kind, self.name, self.version)
    }
}

fn unsupported(file_name: &str) -> RelayError {
    RelayError::UnsupportedType(format!(
        "{file_name} is neither <name>_<tag>{CONTAINER_SUFFIX} nor <name>.<version>{LIBRARY_SUFFIX}"
    ))
}
