use anyhow::Context as _;
use async_zip::{
    base::read::stream::{Ready, ZipFileReader},
    error::ZipError,
};
use futures::io::{AsyncBufRead, AsyncWriteExt as _};
use tokio_util::compat::{TokioAsyncReadCompatExt as _, TokioAsyncWriteCompatExt as _};
use tracing::debug;

use std::path::{Path, PathBuf};

/// Extracts an archive of [`ZipFileReader<Ready<R>>`] to a fresh directory, returning the extracted files.
/// This function will sanitize the file path and create intermediate directories if possible.
///
/// # Errors
///
/// Returns a [`ZipError`] if the archive fails to extract.
pub async fn extract_archive<R, P>(
    archive: ZipFileReader<Ready<R>>,
    path: P,
) -> Result<Vec<PathBuf>, ZipError>
where
    R: AsyncBufRead + Unpin,
    P: AsRef<Path> + Send + Sync,
{
    drop(tokio::fs::remove_dir_all(&path).await);
    tokio::fs::create_dir_all(&path).await?;

    fn sanitize_file_path(path: &str) -> PathBuf {
        // Replaces backwards slashes
        path.replace('\\', "/")
            // Sanitizes each component
            .split('/')
            .map(sanitize_filename::sanitize)
            .collect()
    }

    let mut extracted = Vec::new();
    let mut archive = archive;

    while let Some(mut reading) = archive.next_with_entry().await? {
        let Ok(name) = reading.reader().entry().filename().as_str() else {
            archive = reading.skip().await?;
            continue;
        };
        let p = path.as_ref().join(sanitize_file_path(name));

        if name.ends_with('/') {
            // Is a directory
            if !p.exists() {
                tokio::fs::create_dir_all(&p).await?;
            }
        } else {
            // Parent directories may not exist if iteration is out of order or the archive has no directory entries
            if let Some(parent) = p.parent() {
                if !parent.is_dir() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }

            let mut writer = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&p)
                .await?
                .compat_write();
            futures::io::copy(reading.reader_mut(), &mut writer).await?;
            writer.flush().await?;

            debug!("extracted {p:?}");
            extracted.push(p);
        }

        archive = reading.done().await?;
    }

    Ok(extracted)
}

/// Extracts a zip archive on disk to a fresh directory.
///
/// See: [`extract_archive`]
///
/// # Errors
///
/// Returns an error if the archive cannot be opened or fails to extract.
pub async fn extract_archive_file<A, P>(archive_path: A, path: P) -> anyhow::Result<Vec<PathBuf>>
where
    A: AsRef<Path> + Send + Sync,
    P: AsRef<Path> + Send + Sync,
{
    let archive_path = archive_path.as_ref();
    let file = tokio::fs::File::open(archive_path)
        .await
        .with_context(|| format!("failed to open {archive_path:?}"))?;
    let reader = tokio::io::BufReader::new(file).compat();

    extract_archive(ZipFileReader::new(reader), &path)
        .await
        .with_context(|| format!("failed to extract {archive_path:?}"))
}
