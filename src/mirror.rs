//! The relay loop.
//!
//! Work is processed strictly in sequence, in listing order. Failures are isolated at four levels, outer to
//! inner: configured triple, run, job and claimed package. Every failure ends up in the [`Report`], and the loop
//! always runs over all discovered work.

use std::{fmt::Display, path::PathBuf, sync::Arc};

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::{
    claims::{PublishedPackageClaim, extract_claims, is_scannable},
    config::WorkflowTriple,
    error::RelayError,
    fetch::fetch_artifact,
    gate::PublishGate,
    package::{PackageIdentity, PackageKind},
    publish::Republisher,
    report::Report,
    scanner::{scan_runs, trailing_window},
    source::SourceApi,
    verify::verify_checksum,
    workflow::RunReference,
};

/// The gate and republisher of one package kind.
#[derive(Clone)]
pub struct Backend {
    /// Decides which claims need relaying.
    pub gate: Arc<dyn PublishGate>,
    /// Pushes verified packages.
    pub republisher: Arc<dyn Republisher>,
}

impl Backend {
    /// Pairs a gate with the republisher filling the same registry.
    pub fn new(gate: Arc<dyn PublishGate>, republisher: Arc<dyn Republisher>) -> Self {
        Self { gate, republisher }
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend").finish_non_exhaustive()
    }
}

/// What happened to a claimed package that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The package was fetched, verified and pushed.
    Published,
    /// The destination already has the package.
    AlreadyPublished,
    /// Packages of this kind are not relayed.
    Disabled,
}

impl Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Published => f.write_str("published"),
            Self::AlreadyPublished => f.write_str("already published"),
            Self::Disabled => f.write_str("package kind disabled"),
        }
    }
}

/// Relays claimed packages from the source repositories into the destination registry.
pub struct Mirror {
    source: Arc<dyn SourceApi>,
    source_owner: String,
    work_dir: PathBuf,
    container: Backend,
    library: Option<Backend>,
}

impl std::fmt::Debug for Mirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mirror")
            .field("source_owner", &self.source_owner)
            .field("work_dir", &self.work_dir)
            .field("library", &self.library.is_some())
            .finish_non_exhaustive()
    }
}

impl Mirror {
    /// Creates a loop relaying container images only.
    pub fn new(
        source: Arc<dyn SourceApi>,
        source_owner: String,
        work_dir: PathBuf,
        container: Backend,
    ) -> Self {
        Self {
            source,
            source_owner,
            work_dir,
            container,
            library: None,
        }
    }

    /// Enables relaying of library packages.
    pub fn with_library(mut self, library: Backend) -> Self {
        self.library = Some(library);
        self
    }

    /// Relays everything claimed by runs updated in the trailing window before now.
    pub async fn run(&self, triples: &[String]) -> Report {
        self.run_at(triples, Utc::now()).await
    }

    /// Relays everything claimed by runs updated in the trailing window before `now`.
    pub async fn run_at(&self, triples: &[String], now: DateTime<Utc>) -> Report {
        let since = now - trailing_window();
        let mut report = Report::new();

        for raw in triples {
            match WorkflowTriple::parse(raw) {
                Ok(triple) => self.mirror_triple(&triple, since, &mut report).await,
                Err(err) => report.error(raw, err),
            }
        }

        report
    }

    async fn mirror_triple(&self, triple: &WorkflowTriple, since: DateTime<Utc>, report: &mut Report) {
        info!("scanning {}/{triple}…", self.source_owner);

        let runs = match scan_runs(self.source.as_ref(), &self.source_owner, triple, since).await {
            Ok(runs) => runs,
            Err(err) => {
                report.error(triple, err);
                return;
            }
        };

        for run in &runs {
            info!("processing run {run}…");
            if let Err(err) = self.mirror_run(run, report).await {
                error!("failed to process run {run}");
                report.error(run, err);
            }
        }
    }

    async fn mirror_run(&self, run: &RunReference, report: &mut Report) -> Result<(), RelayError> {
        let run_label = format!("#{} ({})", run.run_number, run.run_id);
        let jobs = self
            .source
            .jobs(run)
            .await
            .map_err(|err| RelayError::transient(&run_label, err))?;

        for job in jobs.iter().filter(|job| is_scannable(job)) {
            let log = self
                .source
                .job_log(run, job)
                .await
                .map_err(|err| RelayError::transient(&run_label, err))?;

            let claims = extract_claims(&log);
            info!(
                "job {} ({}) claims {} package(s)",
                job.name,
                job.id,
                claims.len()
            );
            for claim in &claims {
                self.mirror_package(run, claim, report).await;
            }
        }

        Ok(())
    }

    async fn mirror_package(&self, run: &RunReference, claim: &PublishedPackageClaim, report: &mut Report) {
        let scope = format!("{} (run #{})", claim.name, run.run_number);
        match self.relay(run, claim).await {
            Ok(Outcome::Published) => report.published(scope),
            Ok(outcome) => report.skipped(scope, outcome),
            Err(err) => report.error(scope, err),
        }
    }

    fn backend(&self, kind: PackageKind) -> Option<&Backend> {
        match kind {
            PackageKind::Container => Some(&self.container),
            PackageKind::Library => self.library.as_ref(),
        }
    }

    /// Relays one claimed package: gate, fetch, verify, republish.
    async fn relay(&self, run: &RunReference, claim: &PublishedPackageClaim) -> Result<Outcome, RelayError> {
        let identity = PackageIdentity::parse(&claim.name)?;
        let Some(backend) = self.backend(identity.kind) else {
            return Ok(Outcome::Disabled);
        };

        if backend.gate.is_published(&identity).await? {
            return Ok(Outcome::AlreadyPublished);
        }

        let fetched = fetch_artifact(self.source.as_ref(), run, &claim.name, &self.work_dir).await?;
        let relayed = async {
            verify_checksum(&fetched.package, &claim.checksum).await?;
            backend
                .republisher
                .republish(&identity, &fetched.package)
                .await
        }
        .await;
        fetched.cleanup().await;

        relayed?;
        backend.gate.record_published(&identity);
        Ok(Outcome::Published)
    }
}
