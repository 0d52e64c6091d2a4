//! Relays packages claimed by recent workflow runs into this repository's package registry.

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::Context as _;
use artifact_relay::{
    config::{Config, Destination, split_triples},
    credentials,
    gate::{ContainerTagGate, OwnerScope},
    github::GitHub,
    mirror::{Backend, Mirror},
    publish::DockerRepublisher,
    report::Report,
    source::GitHubSource,
};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "artifact-relay", version, about, long_about = None)]
struct Cli {
    /// Owner of the source repositories.
    #[arg(long, env = "SOURCE_OWNER")]
    source_owner: String,

    /// `repo/workflow-name/branch` triples, separated by newlines or commas.
    #[arg(long, env = "WORKFLOWS")]
    workflows: String,

    /// Token with read access to the source repositories' actions.
    #[arg(long, env = "SOURCE_TOKEN", hide_env_values = true)]
    source_token: String,

    /// User pushing to the destination registries.
    #[arg(long, env = "REGISTRY_USER")]
    registry_user: String,

    /// Token of the registry user.
    #[arg(long, env = "REGISTRY_TOKEN", hide_env_values = true)]
    registry_token: String,

    /// Destination `owner/repo`.
    #[arg(long, env = "GITHUB_REPOSITORY")]
    repository: String,

    /// Scratch directory for downloads and credential files.
    #[arg(long, env = "WORK_DIR", default_value = ".")]
    work_dir: PathBuf,

    /// Also relay legacy NuGet packages.
    #[arg(long, env = "PUBLISH_NUGET")]
    publish_nuget: bool,

    /// Assume the registries are already logged in to.
    #[arg(long)]
    skip_login: bool,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<Config> {
        Ok(Config {
            source_owner: self.source_owner,
            triples: split_triples(&self.workflows),
            source_token: self.source_token,
            registry_user: self.registry_user,
            registry_token: self.registry_token,
            destination: Destination::parse(&self.repository)?,
            work_dir: self.work_dir,
            publish_nuget: self.publish_nuget,
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let skip_login = cli.skip_login;

    let result = match cli.into_config() {
        Ok(config) => run(config, skip_login).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(report) => {
            report.log_summary();
            if report.is_failed() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config, skip_login: bool) -> anyhow::Result<Report> {
    info!("relaying into {} with {config:?}", config.destination);
    tokio::fs::create_dir_all(&config.work_dir)
        .await
        .with_context(|| format!("failed to create {:?}", config.work_dir))?;

    if !skip_login {
        credentials::docker_login(&config.work_dir, &config.registry_user, &config.registry_token)
            .await?;
    }

    let source = GitHubSource::new(GitHub::new(config.source_token.clone())?);
    let registry = GitHub::new(config.registry_token.clone())?;
    let scope = Arc::new(OwnerScope::new(
        registry.clone(),
        config.destination.owner.clone(),
    ));

    let container = Backend::new(
        Arc::new(ContainerTagGate::new(
            registry.clone(),
            Arc::clone(&scope),
            config.destination.clone(),
        )),
        Arc::new(DockerRepublisher::new(
            config.destination.clone(),
            config.work_dir.clone(),
        )),
    );
    let mut mirror = Mirror::new(
        Arc::new(source),
        config.source_owner.clone(),
        config.work_dir.clone(),
        container,
    );

    if config.publish_nuget {
        mirror = with_nuget(mirror, &config, registry, scope, skip_login).await?;
    }

    Ok(mirror.run(&config.triples).await)
}

#[cfg(feature = "nuget")]
async fn with_nuget(
    mirror: Mirror,
    config: &Config,
    registry: GitHub,
    scope: Arc<OwnerScope>,
    skip_login: bool,
) -> anyhow::Result<Mirror> {
    use artifact_relay::{gate::NuGetSnapshotGate, publish::NuGetRepublisher};

    if !skip_login {
        credentials::write_nuget_config(
            &config.work_dir,
            &config.destination.owner,
            &config.registry_user,
            &config.registry_token,
        )
        .await?;
    }

    Ok(mirror.with_library(Backend::new(
        Arc::new(NuGetSnapshotGate::new(registry, scope)),
        Arc::new(NuGetRepublisher::new(
            config.destination.clone(),
            config.work_dir.clone(),
            config.registry_token.clone(),
        )),
    )))
}

#[cfg(not(feature = "nuget"))]
async fn with_nuget(
    mirror: Mirror,
    _config: &Config,
    _registry: GitHub,
    _scope: Arc<OwnerScope>,
    _skip_login: bool,
) -> anyhow::Result<Mirror> {
    tracing::warn!("nuget packages were requested, but this build cannot relay them");
    Ok(mirror)
}
