//! Legacy NuGet library packages, relayed with `dotnet nuget push`.

use std::{
    fs::File,
    io::{Read as _, Write as _},
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use async_trait::async_trait;
use regex::{Captures, Regex};
use tracing::{debug, info, warn};
use zip::{CompressionMethod, ZipArchive, ZipWriter, write::SimpleFileOptions};

use crate::{
    config::{Destination, NUGET_SOURCE_NAME},
    error::RelayError,
    package::PackageIdentity,
    static_lazy_lock,
    tool::run_tool_in,
};

use super::Republisher;

static_lazy_lock! {
    REPOSITORY_URL: Regex =
        Regex::new(r#"(<repository\b[^>]*?\burl=")[^"]*(")"#).expect("repository url pattern is valid");
}

static_lazy_lock! {
    REPOSITORY: Regex = Regex::new(r"<repository\b").expect("repository pattern is valid");
}

/// Points a package's repository at the destination, repackages it and pushes it to a preconfigured source.
///
/// `dotnet` runs from the work directory, where [`write_nuget_config`](crate::credentials::write_nuget_config)
/// puts the source declaration.
#[derive(Clone)]
pub struct NuGetRepublisher {
    destination: Destination,
    work_dir: PathBuf,
    source_name: String,
    api_key: String,
    program: String,
    program_args: Vec<String>,
}

impl std::fmt::Debug for NuGetRepublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NuGetRepublisher")
            .field("destination", &self.destination)
            .field("work_dir", &self.work_dir)
            .field("source_name", &self.source_name)
            .field("program", &self.program)
            .finish_non_exhaustive()
    }
}

impl NuGetRepublisher {
    /// Creates a republisher pushing with `dotnet` to the [`NUGET_SOURCE_NAME`] source.
    pub fn new(destination: Destination, work_dir: PathBuf, api_key: String) -> Self {
        Self {
            destination,
            work_dir,
            source_name: String::from(NUGET_SOURCE_NAME),
            api_key,
            program: String::from("dotnet"),
            program_args: Vec::new(),
        }
    }

    /// Replaces the `dotnet` invocation.
    pub fn with_program(mut self, program: String, program_args: Vec<String>) -> Self {
        self.program = program;
        self.program_args = program_args;
        self
    }
}

#[async_trait]
impl Republisher for NuGetRepublisher {
    async fn republish(&self, identity: &PackageIdentity, package: &Path) -> Result<(), RelayError> {
        let repackaged = self.work_dir.join(format!(
            "{}.{}.relay.nupkg",
            identity.name, identity.version
        ));
        let repository_url = self.destination.repository_url();

        info!("repackaging {} for {repository_url}…", identity.file_name);
        let (input, output) = (package.to_owned(), repackaged.clone());
        tokio::task::spawn_blocking(move || rewrite_package(&input, &output, &repository_url))
            .await
            .context("repackaging was aborted")??;

        let repackaged_arg = repackaged
            .to_str()
            .with_context(|| format!("{repackaged:?} is not valid UTF-8"))?;
        info!("pushing {} to {}…", identity.file_name, self.source_name);
        let pushed = run_tool_in(
            &self.work_dir,
            &self.program,
            self.program_args.iter().map(String::as_str).chain([
                "nuget",
                "push",
                repackaged_arg,
                "--source",
                self.source_name.as_str(),
                "--api-key",
                self.api_key.as_str(),
            ]),
        )
        .await;

        drop(tokio::fs::remove_file(&repackaged).await);
        pushed.map_err(|err| {
            RelayError::Registry(format!("failed to push {}: {err}", identity.file_name))
        })?;

        Ok(())
    }
}

/// Copies a package, rewriting the repository of its `.nuspec` manifest on the way.
///
/// # Errors
///
/// Returns [`RelayError::NotFound`] if the package has no manifest, or any failure reading or writing the archives.
pub fn rewrite_package(input: &Path, output: &Path, repository_url: &str) -> Result<(), RelayError> {
    let mut archive = ZipArchive::new(
        File::open(input).with_context(|| format!("failed to open {input:?}"))?,
    )
    .with_context(|| format!("{input:?} is not a package"))?;
    let mut writer = ZipWriter::new(
        File::create(output).with_context(|| format!("failed to create {output:?}"))?,
    );
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut manifest = None;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .with_context(|| format!("failed to read entry {index} of {input:?}"))?;
        let name = entry.name().to_owned();

        if entry.is_dir() {
            writer
                .add_directory(name, options)
                .with_context(|| format!("failed to write {output:?}"))?;
            continue;
        }

        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .with_context(|| format!("failed to read {name} of {input:?}"))?;

        if manifest.is_none() && name.ends_with(".nuspec") {
            let nuspec = String::from_utf8(contents)
                .with_context(|| format!("{name} is not valid UTF-8"))?;
            contents = rewrite_repository(&nuspec, repository_url).into_bytes();
            manifest = Some(name.clone());
        }

        writer
            .start_file(name, options)
            .and_then(|()| writer.write_all(&contents).map_err(Into::into))
            .with_context(|| format!("failed to write {output:?}"))?;
    }
    writer
        .finish()
        .with_context(|| format!("failed to write {output:?}"))?;

    match manifest {
        Some(manifest) => {
            debug!("rewrote {manifest} into {output:?}");
            Ok(())
        }
        None => {
            drop(std::fs::remove_file(output));
            Err(RelayError::NotFound(format!(
                "{input:?} contains no .nuspec manifest"
            )))
        }
    }
}

/// Points the `<repository>` element of a manifest at `repository_url`, adding the element if missing.
pub fn rewrite_repository(nuspec: &str, repository_url: &str) -> String {
    if REPOSITORY_URL.is_match(nuspec) {
        REPOSITORY_URL
            .replacen(nuspec, 1, |captures: &Captures<'_>| {
                format!("{}{repository_url}{}", &captures[1], &captures[2])
            })
            .into_owned()
    } else if REPOSITORY.is_match(nuspec) {
        REPOSITORY
            .replacen(nuspec, 1, |_: &Captures<'_>| {
                format!(r#"<repository url="{repository_url}""#)
            })
            .into_owned()
    } else if let Some(end) = nuspec.find("</metadata>") {
        format!(
            r#"{}<repository type="git" url="{repository_url}" />{}"#,
            &nuspec[..end],
            &nuspec[end..]
        )
    } else {
        warn!("manifest has no metadata element, leaving it unchanged");
        nuspec.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read as _, Write as _};

    use super::*;

    const URL: &str = "https://github.com/octo/mirror";

    fn nuspec(repository: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://schemas.microsoft.com/packaging/2013/05/nuspec.xsd">
  <metadata>
    <id>Acme.Core</id>
    <version>1.2.3</version>
    {repository}
  </metadata>
</package>"#
        )
    }

    #[test]
    fn rewrites_existing_repository_urls() {
        let rewritten = rewrite_repository(
            &nuspec(r#"<repository type="git" url="https://github.com/octo/app" commit="abc" />"#),
            URL,
        );
        assert!(rewritten.contains(
            r#"<repository type="git" url="https://github.com/octo/mirror" commit="abc" />"#
        ));
        assert!(!rewritten.contains("octo/app"));
    }

    #[test]
    fn adds_missing_urls() {
        let rewritten = rewrite_repository(&nuspec(r#"<repository type="git" />"#), URL);
        assert!(rewritten.contains(r#"<repository url="https://github.com/octo/mirror" type="git" />"#));
    }

    #[test]
    fn adds_missing_repositories() {
        let rewritten = rewrite_repository(&nuspec(""), URL);
        assert!(rewritten.contains(
            r#"<repository type="git" url="https://github.com/octo/mirror" /></metadata>"#
        ));
    }

    fn write_package(path: &Path, entries: &[(&str, &str)]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        for (name, contents) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    fn read_entry(path: &Path, name: &str) -> String {
        let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut contents = String::new();
        archive
            .by_name(name)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        contents
    }

    #[test]
    fn repackages_with_the_rewritten_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("Acme.Core.1.2.3.nupkg");
        let output = dir.path().join("out.nupkg");
        let manifest = nuspec(r#"<repository url="https://github.com/octo/app" />"#);
        write_package(
            &input,
            &[
                ("Acme.Core.nuspec", manifest.as_str()),
                ("lib/net8.0/Acme.Core.dll", "binary"),
            ],
        );

        rewrite_package(&input, &output, URL).unwrap();

        assert!(read_entry(&output, "Acme.Core.nuspec").contains(URL));
        assert_eq!(read_entry(&output, "lib/net8.0/Acme.Core.dll"), "binary");
    }

    #[test]
    fn packages_need_a_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("Acme.Core.1.2.3.nupkg");
        let output = dir.path().join("out.nupkg");
        write_package(&input, &[("lib/net8.0/Acme.Core.dll", "binary")]);

        assert!(matches!(
            rewrite_package(&input, &output, URL),
            Err(RelayError::NotFound(_))
        ));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn pushes_to_the_preconfigured_source() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("dotnet.sh");
        let calls = dir.path().join("calls.log");
        std::fs::write(
            &script,
            format!("echo \"$@\" >> \"{}\"\n", calls.display()),
        )
        .unwrap();

        let package = dir.path().join("Acme.Core.1.2.3.nupkg");
        write_package(
            &package,
            &[("Acme.Core.nuspec", nuspec("").as_str())],
        );

        let republisher = NuGetRepublisher::new(
            Destination::parse("octo/mirror").unwrap(),
            dir.path().to_owned(),
            String::from("token"),
        )
        .with_program(
            String::from("sh"),
            vec![script.to_string_lossy().into_owned()],
        );
        let identity = PackageIdentity::parse("Acme.Core.1.2.3.nupkg").unwrap();

        republisher.republish(&identity, &package).await.unwrap();

        let repackaged = dir.path().join("Acme.Core.1.2.3.relay.nupkg");
        assert_eq!(
            std::fs::read_to_string(&calls).unwrap().trim(),
            format!(
                "nuget push {} --source github --api-key token",
                repackaged.display()
            )
        );
        assert!(!repackaged.exists(), "repackaged file is removed after pushing");
    }
}
