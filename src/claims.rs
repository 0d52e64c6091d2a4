//! Extraction of package publication claims from job logs.
//!
//! A build announces each package it produced with a marker line:
//!
//! ```text
//! --- Uploaded package <name> as a GitHub artifact (SHA256: <hex>) ---
//! ```

use std::collections::HashSet;

use regex::Regex;
use tracing::{debug, warn};

use crate::{static_lazy_lock, workflow::Job};

/// The length of a hex-encoded SHA-256 digest.
pub const CHECKSUM_LEN: usize = 64;

static_lazy_lock! {
    MARKER: Regex = Regex::new(
        r"--- Uploaded package (\S+) as a GitHub artifact \(SHA256: ([0-9A-Fa-f]+)\) ---",
    )
    .expect("marker pattern is valid");
}

/// A package a job claims to have uploaded, and the checksum it claims for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPackageClaim {
    /// The claimed file name, which is also the artifact name.
    pub name: String,
    /// Lower-case hex digest, cut to [`CHECKSUM_LEN`] characters. Shorter digests are kept as claimed and
    /// fail verification.
    pub checksum: String,
}

/// Whether a job's log should be scanned at all.
pub fn is_scannable(job: &Job) -> bool {
    if job.is_completed() {
        true
    } else {
        debug!(
            "skipping job {} ({}): status is {}",
            job.name, job.id, job.status
        );
        false
    }
}

/// Extracts the claims of one job log, in log order.
///
/// Only the first claim for each package name is kept.
pub fn extract_claims(log: &str) -> Vec<PublishedPackageClaim> {
    let mut seen = HashSet::new();
    let mut claims = Vec::new();

    for line in log.lines() {
        let Some(captures) = MARKER.captures(line) else {
            continue;
        };
        let name = &captures[1];
        let digest = &captures[2];

        if digest.len() < CHECKSUM_LEN {
            warn!("claim for {name} carries a short checksum {digest}");
        }
        if !seen.insert(name.to_owned()) {
            debug!("ignoring repeated claim for {name}");
            continue;
        }

        claims.push(PublishedPackageClaim {
            name: name.to_owned(),
            checksum: digest.get(..CHECKSUM_LEN).unwrap_or(digest).to_ascii_lowercase(),
        });
    }

    claims
}
