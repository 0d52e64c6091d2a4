//! Provisioning of registry credentials before a batch.
//!
//! Credentials are written to the work directory in clear text and left there.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use tracing::info;

use crate::{
    config::{NUGET_SOURCE_NAME, REGISTRY_HOST, nuget_source_url},
    error::RelayError,
    tool::run_tool,
};

/// The file the registry password is written to before logging in.
pub const PASSWORD_FILE: &str = ".registry-password";

/// The NuGet configuration file declaring the push source.
pub const NUGET_CONFIG_FILE: &str = "NuGet.Config";

/// Logs the local `docker` in to the container registry.
///
/// # Errors
///
/// Returns an error if the password file cannot be written or the login fails.
pub async fn docker_login(work_dir: &Path, user: &str, token: &str) -> Result<(), RelayError> {
    let password_file = work_dir.join(PASSWORD_FILE);
    tokio::fs::write(&password_file, token)
        .await
        .with_context(|| format!("failed to write {password_file:?}"))?;

    run_tool(
        "docker",
        ["login", REGISTRY_HOST, "--username", user, "--password-stdin"],
        Some(&password_file),
    )
    .await?;

    info!("logged in to {REGISTRY_HOST} as {user}");
    Ok(())
}

/// Renders a NuGet configuration with the destination owner's feed as the only source.
pub fn nuget_config(owner: &str, user: &str, token: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<configuration>
  <packageSources>
    <clear />
    <add key="{NUGET_SOURCE_NAME}" value="{}" />
  </packageSources>
  <packageSourceCredentials>
    <{NUGET_SOURCE_NAME}>
      <add key="Username" value="{}" />
      <add key="ClearTextPassword" value="{}" />
    </{NUGET_SOURCE_NAME}>
  </packageSourceCredentials>
</configuration>
"#,
        nuget_source_url(owner),
        escape_attribute(user),
        escape_attribute(token)
    )
}

/// Writes [`nuget_config`] to the work directory, returning its path.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub async fn write_nuget_config(
    work_dir: &Path,
    owner: &str,
    user: &str,
    token: &str,
) -> Result<PathBuf, RelayError> {
    let path = work_dir.join(NUGET_CONFIG_FILE);
    tokio::fs::write(&path, nuget_config(owner, user, token))
        .await
        .with_context(|| format!("failed to write {path:?}"))?;

    info!("configured nuget source {NUGET_SOURCE_NAME} in {path:?}");
    Ok(path)
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
