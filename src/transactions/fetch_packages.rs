use tracing::{debug, info};

use crate::{
    framework::StateResult,
    github::GitHub,
    workflow::package::{Owner, Package, PackageVersion},
};

/// Fetches the account behind a login, which tells organizations from users.
///
/// # Errors
///
/// Returns an error that instructs retrying or cancelling if the account cannot be fetched.
pub async fn fetch_owner(github: &GitHub, login: &str) -> StateResult<Owner> {
    let url = github.url(&format!("/users/{login}"));
    debug!("fetching account from {url}…");

    github.get_json::<Owner>(&url, &[]).await
}

/// Fetches every package of a type under a packages root such as `/orgs/{org}/packages`.
///
/// # Errors
///
/// Returns an error that instructs retrying or cancelling if listing the packages fails.
pub async fn fetch_packages(
    github: &GitHub,
    packages_root: &str,
    package_type: &str,
) -> StateResult<Vec<Package>> {
    let url = github.url(packages_root);
    debug!("fetching {package_type} packages from {url}…");

    let packages = github
        .get_pages::<Vec<Package>>(&url, &[("package_type", package_type.to_owned())])
        .await?;
    info!("fetched {} {package_type} package(s) from {url}", packages.len());
    Ok(packages)
}

/// Fetches every version of one package.
///
/// A package that was never published answers [`StateError::NotFound`](crate::framework::StateError::NotFound).
///
/// # Errors
///
/// Returns an error that instructs retrying or cancelling if listing the versions fails.
pub async fn fetch_package_versions(
    github: &GitHub,
    packages_root: &str,
    package_type: &str,
    package_name: &str,
) -> StateResult<Vec<PackageVersion>> {
    let url = github.url(&format!(
        "{packages_root}/{package_type}/{}/versions",
        encode_package_name(package_name)
    ));
    debug!("fetching versions from {url}…");

    github.get_pages::<Vec<PackageVersion>>(&url, &[]).await
}

/// Encodes a package name as a single path segment. Container names nest with `/`.
pub fn encode_package_name(name: &str) -> String {
    name.replace('%', "%25").replace('/', "%2F")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_names_become_one_segment() {
        assert_eq!(encode_package_name("mirror/widget"), "mirror%2Fwidget");
        assert_eq!(encode_package_name("widget"), "widget");
    }
}
