//! Integrity checks of downloaded packages.

use std::path::Path;

use anyhow::Context as _;
use sha2::{Digest as _, Sha256};
use tokio::io::AsyncReadExt as _;
use tracing::{debug, info};

use crate::{claims::CHECKSUM_LEN, error::RelayError};

/// Computes the lower-case hex SHA-256 digest of a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub async fn sha256_file<P>(path: P) -> anyhow::Result<String>
where
    P: AsRef<Path> + Send + Sync,
{
    let path = path.as_ref();
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("failed to open {path:?}"))?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0; 64 * 1024];
    loop {
        let read = file
            .read(&mut buf)
            .await
            .with_context(|| format!("failed to read {path:?}"))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Checks a package file against the checksum its build claimed.
///
/// The claim is compared over its first [`CHECKSUM_LEN`] characters, case-insensitively.
///
/// # Errors
///
/// Returns [`RelayError::Integrity`] on a mismatch, or any failure reading the file.
pub async fn verify_checksum<P>(path: P, claimed: &str) -> Result<(), RelayError>
where
    P: AsRef<Path> + Send + Sync,
{
    let path = path.as_ref();
    let actual = sha256_file(path).await?;
    debug!("{path:?} hashes to {actual}");

    let claimed = claimed
        .get(..CHECKSUM_LEN)
        .unwrap_or(claimed)
        .to_ascii_lowercase();

    if actual == claimed {
        info!("verified checksum of {path:?}");
        Ok(())
    } else {
        Err(RelayError::Integrity(format!(
            "{path:?} hashes to {actual}, but {claimed} was claimed"
        )))
    }
}

/// Checks a downloaded artifact archive against the `sha256:<hex>` digest recorded when it was uploaded.
///
/// Digests of other algorithms are not checked.
///
/// # Errors
///
/// Returns [`RelayError::Integrity`] on a mismatch, or any failure reading the file.
pub async fn verify_archive_digest<P>(path: P, digest: &str) -> Result<(), RelayError>
where
    P: AsRef<Path> + Send + Sync,
{
    let path = path.as_ref();
    let Some(expected) = digest.strip_prefix("sha256:") else {
        debug!("not checking {path:?} against digest {digest}");
        return Ok(());
    };

    let actual = sha256_file(path).await?;
    if actual.eq_ignore_ascii_case(expected) {
        debug!("verified archive digest of {path:?}");
        Ok(())
    } else {
        Err(RelayError::Integrity(format!(
            "archive {path:?} hashes to {actual}, but the artifact was uploaded as {expected}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // sha256("test")
    const TEST_DIGEST: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

    #[tokio::test]
    async fn hashes_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("package");
        std::fs::write(&path, b"test").unwrap();

        assert_eq!(sha256_file(&path).await.unwrap(), TEST_DIGEST);
    }

    #[tokio::test]
    async fn accepts_matching_claims_in_any_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("package");
        std::fs::write(&path, b"test").unwrap();

        verify_checksum(&path, TEST_DIGEST).await.unwrap();
        verify_checksum(&path, &TEST_DIGEST.to_ascii_uppercase())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejects_mismatching_claims() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("package");
        std::fs::write(&path, b"tampered").unwrap();

        let claimed = format!("deadbeef{}", "0".repeat(56));
        assert!(matches!(
            verify_checksum(&path, &claimed).await,
            Err(RelayError::Integrity(_))
        ));
        assert!(matches!(
            verify_checksum(&path, "deadbeef").await,
            Err(RelayError::Integrity(_))
        ));
    }

    #[tokio::test]
    async fn missing_files_are_not_integrity_errors() {
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            verify_checksum(dir.path().join("missing"), TEST_DIGEST).await,
            Err(RelayError::Other(_))
        ));
    }

    #[tokio::test]
    async fn checks_archives_against_sha256_digests() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.zip");
        std::fs::write(&path, b"test").unwrap();

        verify_archive_digest(&path, &format!("sha256:{TEST_DIGEST}"))
            .await
            .unwrap();
        assert!(matches!(
            verify_archive_digest(&path, &format!("sha256:{}", "0".repeat(64))).await,
            Err(RelayError::Integrity(_))
        ));
        verify_archive_digest(&path, "md5:098f6bcd4621d373cade4e832627b4f6")
            .await
            .unwrap();
    }
}
