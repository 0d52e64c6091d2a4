//! In-memory fakes of the source CI and the destination registry.

#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    io::{Cursor, Write as _},
    path::Path,
    sync::Arc,
};

use anyhow::anyhow;
use artifact_relay::{
    RelayError,
    gate::PublishGate,
    mirror::{Backend, Mirror},
    package::PackageIdentity,
    publish::Republisher,
    source::SourceApi,
    workflow::{
        Job, RunReference, Workflow, WorkflowRun,
        artifact::{Artifact, ArtifactHandle},
    },
};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone as _, Utc};
use parking_lot::Mutex;
use sha2::{Digest as _, Sha256};
use zip::write::SimpleFileOptions;

pub const OWNER: &str = "octo";

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn hours_ago(hours: i64) -> DateTime<Utc> {
    now() - TimeDelta::hours(hours)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn marker(name: &str, digest: &str) -> String {
    format!("2024-05-01T11:00:00.0000000Z --- Uploaded package {name} as a GitHub artifact (SHA256: {digest}) ---")
}

pub fn zip_containing(name: &str, contents: &[u8]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file(name, SimpleFileOptions::default())
        .unwrap();
    writer.write_all(contents).unwrap();
    writer.finish().unwrap().into_inner()
}

#[derive(Default)]
struct SourceState {
    workflows: HashMap<String, Vec<Workflow>>,
    runs: HashMap<u64, Vec<WorkflowRun>>,
    jobs: HashMap<u64, Vec<Job>>,
    logs: HashMap<u64, Result<String, String>>,
    artifacts: HashMap<u64, Vec<(Artifact, Vec<u8>)>>,
    next_id: u64,
}

/// A source CI whose workflows, runs, jobs, logs and artifacts are set up by the test.
#[derive(Default)]
pub struct FakeSource {
    state: Mutex<SourceState>,
    calls: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_workflow(&self, repo: &str, id: u64, name: &str) {
        self.state
            .lock()
            .workflows
            .entry(repo.to_owned())
            .or_default()
            .push(Workflow {
                id,
                name: name.to_owned(),
                path: format!(".github/workflows/{id}.yml"),
            });
    }

    pub fn add_run(&self, workflow_id: u64, run_number: u64, branch: &str, updated_at: DateTime<Utc>) {
        self.state
            .lock()
            .runs
            .entry(workflow_id)
            .or_default()
            .push(WorkflowRun {
                id: run_number * 1000,
                run_number,
                head_branch: Some(branch.to_owned()),
                head_sha: String::from("328faa0536e6fef19753d9d91dc96a9931694ce3"),
                updated_at,
                html_url: format!("https://github.com/{OWNER}/app/actions/runs/{}", run_number * 1000),
            });
    }

    /// Adds a job to run number `run` with the given status and log.
    pub fn add_job(&self, run: u64, status: &str, log: Result<String, String>) -> u64 {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.jobs.entry(run * 1000).or_default().push(Job {
            id,
            run_id: run * 1000,
            name: format!("build-{id}"),
            status: status.to_owned(),
            conclusion: None,
        });
        state.logs.insert(id, log);
        id
    }

    /// Attaches an artifact holding one package file to run number `run`.
    pub fn add_artifact(&self, run: u64, name: &str, package: &[u8]) {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = state.next_id;
        let archive = zip_containing(name, package);
        state.artifacts.entry(run * 1000).or_default().push((
            Artifact {
                id,
                name: name.to_owned(),
                size_in_bytes: archive.len() as u64,
                expired: false,
                digest: Some(format!("sha256:{}", sha256_hex(&archive))),
            },
            archive,
        ));
    }

    /// Swaps the package inside an artifact of run number `run`, leaving its recorded digest behind.
    pub fn tamper_artifact(&self, run: u64, name: &str, package: &[u8]) {
        let mut state = self.state.lock();
        for (artifact, archive) in state.artifacts.entry(run * 1000).or_default() {
            if artifact.name == name {
                *archive = zip_containing(name, package);
            }
        }
    }

    /// Marks an artifact of run number `run` as past its retention period.
    pub fn expire_artifact(&self, run: u64, name: &str) {
        let mut state = self.state.lock();
        for (artifact, _) in state.artifacts.entry(run * 1000).or_default() {
            if artifact.name == name {
                artifact.expired = true;
            }
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl SourceApi for FakeSource {
    async fn workflows(&self, owner: &str, repo: &str) -> anyhow::Result<Vec<Workflow>> {
        self.record(format!("workflows {owner}/{repo}"));
        Ok(self
            .state
            .lock()
            .workflows
            .get(repo)
            .cloned()
            .unwrap_or_default())
    }

    async fn runs(
        &self,
        _owner: &str,
        _repo: &str,
        workflow_id: u64,
        branch: &str,
    ) -> anyhow::Result<Vec<WorkflowRun>> {
        self.record(format!("runs {workflow_id} {branch}"));
        Ok(self
            .state
            .lock()
            .runs
            .get(&workflow_id)
            .into_iter()
            .flatten()
            .filter(|run| run.head_branch.as_deref() == Some(branch))
            .cloned()
            .collect())
    }

    async fn jobs(&self, run: &RunReference) -> anyhow::Result<Vec<Job>> {
        self.record(format!("jobs #{}", run.run_number));
        Ok(self
            .state
            .lock()
            .jobs
            .get(&run.run_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn job_log(&self, run: &RunReference, job: &Job) -> anyhow::Result<String> {
        self.record(format!("log #{} {}", run.run_number, job.id));
        match self.state.lock().logs.get(&job.id) {
            Some(Ok(log)) => Ok(log.clone()),
            Some(Err(reason)) => Err(anyhow!("{reason}")),
            None => Err(anyhow!("no log for job {}", job.id)),
        }
    }

    async fn artifacts(&self, run: &RunReference) -> anyhow::Result<Vec<Artifact>> {
        self.record(format!("artifacts #{}", run.run_number));
        Ok(self
            .state
            .lock()
            .artifacts
            .get(&run.run_id)
            .into_iter()
            .flatten()
            .map(|(artifact, _)| artifact.clone())
            .collect())
    }

    async fn download_artifact(
        &self,
        run: &RunReference,
        artifact: &ArtifactHandle,
        path: &Path,
    ) -> anyhow::Result<()> {
        self.record(format!("download {}", artifact.name));
        let bytes = self
            .state
            .lock()
            .artifacts
            .get(&run.run_id)
            .into_iter()
            .flatten()
            .find(|(listed, _)| listed.id == artifact.id)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| anyhow!("artifact {} vanished", artifact.id))?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }
}

/// A registry remembering what was pushed to it, answering presence from the same memory.
///
/// A snapshotting registry answers instead from a copy taken at its first query, which only
/// [`PublishGate::record_published`] updates.
#[derive(Default)]
pub struct FakeRegistry {
    present: Mutex<HashSet<String>>,
    pushes: Mutex<Vec<(String, Vec<u8>)>>,
    queries: Mutex<Vec<String>>,
    failing_queries: Mutex<HashSet<String>>,
    snapshotting: bool,
    snapshot: Mutex<Option<HashSet<String>>>,
}

impl FakeRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn snapshotting() -> Arc<Self> {
        Arc::new(Self {
            snapshotting: true,
            ..Self::default()
        })
    }

    pub fn insert(&self, file_name: &str) {
        self.present.lock().insert(file_name.to_owned());
    }

    pub fn fail_queries_for(&self, file_name: &str) {
        self.failing_queries.lock().insert(file_name.to_owned());
    }

    /// File names pushed so far, in order.
    pub fn pushed(&self) -> Vec<String> {
        self.pushes
            .lock()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn pushed_contents(&self, file_name: &str) -> Option<Vec<u8>> {
        self.pushes
            .lock()
            .iter()
            .find(|(name, _)| name == file_name)
            .map(|(_, contents)| contents.clone())
    }

    pub fn queries(&self) -> usize {
        self.queries.lock().len()
    }

    pub fn backend(self: &Arc<Self>) -> Backend {
        Backend::new(Arc::clone(self) as _, Arc::clone(self) as _)
    }
}

#[async_trait]
impl PublishGate for FakeRegistry {
    async fn is_published(&self, identity: &PackageIdentity) -> Result<bool, RelayError> {
        self.queries.lock().push(identity.file_name.clone());
        if self.failing_queries.lock().contains(&identity.file_name) {
            return Err(RelayError::Registry(String::from("503 Service Unavailable")));
        }
        if self.snapshotting {
            let mut snapshot = self.snapshot.lock();
            let snapshot = snapshot.get_or_insert_with(|| self.present.lock().clone());
            return Ok(snapshot.contains(&identity.file_name));
        }
        Ok(self.present.lock().contains(&identity.file_name))
    }

    fn record_published(&self, identity: &PackageIdentity) {
        if let Some(snapshot) = self.snapshot.lock().as_mut() {
            snapshot.insert(identity.file_name.clone());
        }
    }
}

#[async_trait]
impl Republisher for FakeRegistry {
    async fn republish(&self, identity: &PackageIdentity, package: &Path) -> Result<(), RelayError> {
        let contents = tokio::fs::read(package)
            .await
            .map_err(|err| RelayError::Other(err.into()))?;
        self.pushes
            .lock()
            .push((identity.file_name.clone(), contents));
        self.present.lock().insert(identity.file_name.clone());
        Ok(())
    }
}

pub fn mirror(source: &Arc<FakeSource>, registry: &Arc<FakeRegistry>, work_dir: &Path) -> Mirror {
    Mirror::new(
        Arc::clone(source) as _,
        String::from(OWNER),
        work_dir.to_owned(),
        registry.backend(),
    )
}
