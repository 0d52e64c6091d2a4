//! Deciding whether a package is already present in the destination registry.
//!
//! [`ContainerTagGate`] asks the registry about one image at a time. [`NuGetSnapshotGate`] lists the whole NuGet
//! registry once per batch and answers from that listing, extended with what the batch itself published. The two
//! never consult each other.

use std::{collections::HashSet, fmt::Display, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::{
    config::Destination,
    error::RelayError,
    framework::{StateError, retry},
    github::GitHub,
    package::PackageIdentity,
    transactions::{fetch_owner, fetch_package_versions, fetch_packages},
};

/// Decides whether a package identity is already published.
///
/// A package reported as published is never fetched or republished.
#[async_trait]
pub trait PublishGate: Send + Sync {
    /// Whether `identity` is already present in the destination registry.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Registry`] if the registry cannot be queried. A package the registry has never
    /// heard of is not an error.
    async fn is_published(&self, identity: &PackageIdentity) -> Result<bool, RelayError>;

    /// Records that `identity` was just republished, for gates that answer from memory.
    fn record_published(&self, _identity: &PackageIdentity) {}
}

/// The account packages are listed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageScope {
    /// Packages of an organization, under `/orgs/{login}`.
    Organization(String),
    /// Packages of a user, under `/users/{login}`.
    User(String),
}

impl PackageScope {
    /// Looks up whether `owner` is an organization or a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the account cannot be fetched.
    pub async fn resolve(github: &GitHub, owner: &str) -> anyhow::Result<Self> {
        let account = retry("resolve owner", || fetch_owner(github, owner)).await?;
        let scope = match account.kind.as_str() {
            "Organization" => Self::Organization(account.login),
            _ => Self::User(account.login),
        };
        info!("packages of {owner} are listed under {}", scope.packages_root());
        Ok(scope)
    }

    /// The REST path listing the account's packages.
    pub fn packages_root(&self) -> String {
        match self {
            Self::Organization(login) => format!("/orgs/{login}/packages"),
            Self::User(login) => format!("/users/{login}/packages"),
        }
    }
}

/// The [`PackageScope`] of the destination owner, resolved on first use and shared by the gates.
///
/// A failed resolution is not remembered, so every package that needs the scope reports the failure itself.
#[derive(Debug)]
pub struct OwnerScope {
    github: GitHub,
    owner: String,
    scope: OnceCell<PackageScope>,
}

impl OwnerScope {
    /// Creates a scope of `owner`, looked up with `github` when first needed.
    pub fn new(github: GitHub, owner: String) -> Self {
        Self {
            github,
            owner,
            scope: OnceCell::new(),
        }
    }

    /// The REST path listing the owner's packages.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Registry`] if the owner cannot be looked up.
    pub async fn packages_root(&self) -> Result<String, RelayError> {
        let scope = self
            .scope
            .get_or_try_init(|| PackageScope::resolve(&self.github, &self.owner))
            .await
            .map_err(|err| {
                RelayError::Registry(format!(
                    "failed to resolve the package scope of {}: {err:#}",
                    self.owner
                ))
            })?;
        Ok(scope.packages_root())
    }
}

/// The name a container image is registered under in the destination: `<destination-repo>/<image>`, lower-cased.
pub fn container_package_name(destination: &Destination, identity: &PackageIdentity) -> String {
    format!("{}/{}", destination.repo, identity.name).to_lowercase()
}

/// Per-identity strategy: lists the tags of the one image a claim is about.
#[derive(Debug, Clone)]
pub struct ContainerTagGate {
    github: GitHub,
    scope: Arc<OwnerScope>,
    destination: Destination,
}

impl ContainerTagGate {
    /// Creates a gate over the container packages of `destination`.
    pub fn new(github: GitHub, scope: Arc<OwnerScope>, destination: Destination) -> Self {
        Self {
            github,
            scope,
            destination,
        }
    }
}

#[async_trait]
impl PublishGate for ContainerTagGate {
    async fn is_published(&self, identity: &PackageIdentity) -> Result<bool, RelayError> {
        let root = self.scope.packages_root().await?;
        let package_name = container_package_name(&self.destination, identity);
        let tag = identity.version.to_lowercase();

        match retry("list container versions", || {
            fetch_package_versions(&self.github, &root, "container", &package_name)
        })
        .await
        {
            Ok(versions) => {
                let published = versions
                    .iter()
                    .flat_map(|version| version.tags())
                    .any(|existing| *existing == tag);
                debug!(
                    "{package_name} has {} version(s), {tag} {}",
                    versions.len(),
                    if published { "among them" } else { "not among them" }
                );
                Ok(published)
            }
            Err(StateError::NotFound(_)) => {
                debug!("{package_name} has no versions yet");
                Ok(false)
            }
            Err(err) => Err(registry_error(&package_name, err)),
        }
    }
}

/// Snapshot strategy: lists every NuGet package and version once, then answers from memory.
#[derive(Debug)]
pub struct NuGetSnapshotGate {
    github: GitHub,
    scope: Arc<OwnerScope>,
    snapshot: Mutex<Option<HashSet<String>>>,
}

impl NuGetSnapshotGate {
    /// Creates a gate over the NuGet packages of the scope's owner.
    pub fn new(github: GitHub, scope: Arc<OwnerScope>) -> Self {
        Self {
            github,
            scope,
            snapshot: Mutex::new(None),
        }
    }

    async fn load_snapshot(&self) -> Result<(), RelayError> {
        if self.snapshot.lock().is_some() {
            return Ok(());
        }

        let root = self.scope.packages_root().await?;
        let packages = retry("list nuget packages", || {
            fetch_packages(&self.github, &root, "nuget")
        })
        .await
        .map_err(|err| registry_error(&root, err))?;

        let mut files = HashSet::new();
        for package in &packages {
            let versions = match retry("list nuget versions", || {
                fetch_package_versions(&self.github, &root, "nuget", &package.name)
            })
            .await
            {
                Ok(versions) => versions,
                Err(StateError::NotFound(_)) => Vec::new(),
                Err(err) => return Err(registry_error(&package.name, err)),
            };
            files.extend(versions.iter().map(|version| {
                snapshot_key(&format!("{}.{}.nupkg", package.name, version.name))
            }));
        }

        info!(
            "{} nuget package version(s) already published under {root}",
            files.len()
        );
        {
            let mut snapshot = self.snapshot.lock();
            if snapshot.is_none() {
                *snapshot = Some(files);
            }
        }
        Ok(())
    }
}

/// NuGet package ids are case-insensitive.
fn snapshot_key(file_name: &str) -> String {
    file_name.to_lowercase()
}

#[async_trait]
impl PublishGate for NuGetSnapshotGate {
    async fn is_published(&self, identity: &PackageIdentity) -> Result<bool, RelayError> {
        self.load_snapshot().await?;
        let key = snapshot_key(&identity.file_name);
        Ok(self
            .snapshot
            .lock()
            .as_ref()
            .is_some_and(|files| files.contains(&key)))
    }

    fn record_published(&self, identity: &PackageIdentity) {
        if let Some(files) = self.snapshot.lock().as_mut() {
            files.insert(snapshot_key(&identity.file_name));
        }
    }
}

fn registry_error<E>(subject: &str, err: E) -> RelayError
where
    E: Display,
{
    RelayError::Registry(format!("failed to query {subject}: {err}"))
}

#[cfg(test)]
mod tests {
    use tokio::{
        io::{AsyncReadExt as _, AsyncWriteExt as _},
        net::TcpListener,
    };

    use super::*;

    /// Serves canned JSON answers keyed by request path, recording every path requested.
    async fn serve<F>(respond: F) -> (GitHub, Arc<Mutex<Vec<String>>>)
    where
        F: Fn(&str) -> (u16, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let root = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let mut request = Vec::new();
                let mut buf = [0; 1024];
                while !request.windows(4).any(|window| window == b"\r\n\r\n") {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(read) => request.extend_from_slice(&buf[..read]),
                    }
                }

                let request = String::from_utf8_lossy(&request);
                let target = request.split_whitespace().nth(1).unwrap_or_default();
                let path = target.split('?').next().unwrap_or_default().to_owned();
                seen.lock().push(path.clone());

                let (status, body) = respond(&path);
                let response = format!(
                    "HTTP/1.1 {status} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                drop(stream.write_all(response.as_bytes()).await);
                drop(stream.shutdown().await);
            }
        });

        let github = GitHub::new(String::from("token"))
            .unwrap()
            .with_api_root(&root);
        (github, requests)
    }

    fn user_octo(path: &str) -> Option<(u16, String)> {
        (path == "/users/octo").then(|| (200, String::from(r#"{"login":"octo","type":"User"}"#)))
    }

    fn gate(github: GitHub) -> ContainerTagGate {
        let scope = Arc::new(OwnerScope::new(github.clone(), String::from("octo")));
        ContainerTagGate::new(github, scope, Destination::parse("octo/mirror").unwrap())
    }

    fn widget(tag: &str) -> PackageIdentity {
        PackageIdentity::parse(&format!("widget_{tag}.docker.tar.gz")).unwrap()
    }

    #[test]
    fn scopes_list_under_their_kind() {
        assert_eq!(
            PackageScope::Organization(String::from("octo-org")).packages_root(),
            "/orgs/octo-org/packages"
        );
        assert_eq!(
            PackageScope::User(String::from("octocat")).packages_root(),
            "/users/octocat/packages"
        );
    }

    #[test]
    fn container_packages_nest_under_the_destination_repo() {
        let destination = Destination::parse("Octo-Org/Mirror").unwrap();
        let identity = PackageIdentity::parse("Widget_V1.docker.tar.gz").unwrap();

        assert_eq!(
            container_package_name(&destination, &identity),
            "mirror/widget"
        );
    }

    #[test]
    fn snapshot_keys_ignore_case() {
        assert_eq!(
            snapshot_key("Acme.Core.1.2.3.nupkg"),
            snapshot_key("acme.core.1.2.3.nupkg")
        );
    }

    #[tokio::test]
    async fn images_without_versions_are_not_published() {
        let (github, requests) = serve(|path| {
            user_octo(path).unwrap_or_else(|| (404, String::from(r#"{"message":"Not Found"}"#)))
        })
        .await;

        assert!(!gate(github).is_published(&widget("v1")).await.unwrap());
        assert_eq!(
            requests.lock().last().map(String::as_str),
            Some("/users/octo/packages/container/mirror%2Fwidget/versions")
        );
    }

    #[tokio::test]
    async fn images_are_published_when_a_version_carries_the_tag() {
        let (github, _) = serve(|path| {
            user_octo(path).unwrap_or_else(|| {
                (
                    200,
                    String::from(
                        r#"[{"id":1,"name":"sha256:0a","metadata":{"package_type":"container","container":{"tags":["v1","latest"]}}}]"#,
                    ),
                )
            })
        })
        .await;
        let gate = gate(github);

        assert!(gate.is_published(&widget("v1")).await.unwrap());
        assert!(!gate.is_published(&widget("v2")).await.unwrap());
    }

    #[tokio::test]
    async fn registry_failures_are_registry_errors() {
        let (github, _) = serve(|path| {
            user_octo(path).unwrap_or_else(|| (403, String::from(r#"{"message":"Forbidden"}"#)))
        })
        .await;

        assert!(matches!(
            gate(github).is_published(&widget("v1")).await,
            Err(RelayError::Registry(_))
        ));
    }

    #[tokio::test]
    async fn owner_lookups_fail_per_query() {
        let (github, requests) =
            serve(|_| (403, String::from(r#"{"message":"Forbidden"}"#))).await;
        let gate = gate(github);

        for tag in ["v1", "v2"] {
            assert!(matches!(
                gate.is_published(&widget(tag)).await,
                Err(RelayError::Registry(_))
            ));
        }
        assert_eq!(*requests.lock(), ["/users/octo", "/users/octo"]);
    }

    #[tokio::test]
    async fn snapshot_lists_once_and_remembers_own_publications() {
        let (github, requests) = serve(|path| {
            user_octo(path).unwrap_or_else(|| match path {
                "/users/octo/packages" => (
                    200,
                    String::from(r#"[{"id":1,"name":"Acme.Core","package_type":"nuget"}]"#),
                ),
                "/users/octo/packages/nuget/Acme.Core/versions" => {
                    (200, String::from(r#"[{"id":7,"name":"1.2.3"}]"#))
                }
                _ => (404, String::from(r#"{"message":"Not Found"}"#)),
            })
        })
        .await;
        let scope = Arc::new(OwnerScope::new(github.clone(), String::from("octo")));
        let gate = NuGetSnapshotGate::new(github, scope);
        let published = PackageIdentity::parse("Acme.Core.1.2.3.nupkg").unwrap();
        let lower_case = PackageIdentity::parse("acme.core.1.2.3.nupkg").unwrap();
        let fresh = PackageIdentity::parse("Acme.Core.2.0.0.nupkg").unwrap();

        assert!(gate.is_published(&published).await.unwrap());
        assert!(gate.is_published(&lower_case).await.unwrap());
        assert!(!gate.is_published(&fresh).await.unwrap());

        gate.record_published(&fresh);
        assert!(gate.is_published(&fresh).await.unwrap());

        assert_eq!(
            *requests.lock(),
            [
                "/users/octo",
                "/users/octo/packages",
                "/users/octo/packages/nuget/Acme.Core/versions",
            ]
        );
    }
}
