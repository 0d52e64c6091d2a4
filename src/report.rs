//! The batch-level record of everything that happened.

use std::fmt::Display;

use tracing::{error, info};

use crate::error::RelayError;

/// An error reported while relaying, with the unit it happened in.
#[derive(Debug)]
pub struct ReportedError {
    /// The triple, run or package the error is scoped to.
    pub scope: String,
    /// What went wrong.
    pub error: RelayError,
}

impl Display for ReportedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.scope, self.error)
    }
}

/// Accumulates the outcome of a batch. The batch failed if any error was reported.
#[derive(Debug, Default)]
pub struct Report {
    errors: Vec<ReportedError>,
    published: Vec<String>,
    skipped: Vec<String>,
}

impl Report {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports an error scoped to a unit of work.
    pub fn error<S>(&mut self, scope: S, error: RelayError)
    where
        S: Display,
    {
        let reported = ReportedError {
            scope: scope.to_string(),
            error,
        };
        error!("{reported}");
        self.errors.push(reported);
    }

    /// Records a package pushed to the destination registry.
    pub fn published<S>(&mut self, package: S)
    where
        S: Display,
    {
        info!("published {package}");
        self.published.push(package.to_string());
    }

    /// Records a package that needed no work.
    pub fn skipped<S, R>(&mut self, package: S, reason: R)
    where
        S: Display,
        R: Display,
    {
        info!("skipped {package}: {reason}");
        self.skipped.push(package.to_string());
    }

    /// Whether any error was reported.
    pub fn is_failed(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Every error reported so far, in order.
    pub fn errors(&self) -> &[ReportedError] {
        &self.errors
    }

    /// Packages pushed to the destination registry, in order.
    pub fn published_packages(&self) -> &[String] {
        &self.published
    }

    /// Packages that needed no work, in order.
    pub fn skipped_packages(&self) -> &[String] {
        &self.skipped
    }

    /// Logs a one-line summary followed by every reported error.
    pub fn log_summary(&self) {
        info!(
            "published {} package(s), skipped {}, {} error(s)",
            self.published.len(),
            self.skipped.len(),
            self.errors.len()
        );
        for reported in &self.errors {
            error!("  - {reported}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_error_fails_the_batch() {
        let mut report = Report::new();
        report.published("widget_v1.docker.tar.gz");
        report.skipped("widget_v0.docker.tar.gz", "already published");
        assert!(!report.is_failed());

        report.error(
            "gadget_v1.docker.tar.gz",
            RelayError::Integrity(String::from("checksum mismatch")),
        );

        assert!(report.is_failed());
        assert_eq!(report.published_packages(), ["widget_v1.docker.tar.gz"]);
        assert_eq!(report.skipped_packages(), ["widget_v0.docker.tar.gz"]);
        assert_eq!(
            report.errors()[0].to_string(),
            "gadget_v1.docker.tar.gz: integrity error: checksum mismatch"
        );
    }
}
