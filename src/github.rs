//! A thin client for the GitHub REST API.

use std::error::Error as _;

use anyhow::Context as _;
use reqwest::{RequestBuilder, StatusCode, header, redirect};
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::{
    env::GITHUB_API_URL,
    framework::{StateError, StateResult},
};

/// The number of items requested per page from list endpoints.
pub const PAGE_SIZE: usize = 100;

/// A GitHub REST API client authenticated with a single token.
#[derive(Clone)]
pub struct GitHub {
    client: reqwest::Client,
    no_redirect_client: reqwest::Client,
    token: String,
    api_root: String,
}

impl std::fmt::Debug for GitHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHub")
            .field("api_root", &self.api_root)
            .finish_non_exhaustive()
    }
}

impl GitHub {
    /// Creates a client against [`GITHUB_API_URL`].
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP clients cannot be built.
    pub fn new(token: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("artifact-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        let no_redirect_client = reqwest::Client::builder()
            .user_agent(concat!("artifact-relay/", env!("CARGO_PKG_VERSION")))
            .redirect(redirect::Policy::none())
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            no_redirect_client,
            token,
            api_root: GITHUB_API_URL.clone(),
        })
    }

    /// Points the client at another API root.
    pub fn with_api_root(mut self, api_root: &str) -> Self {
        api_root.trim_end_matches('/').clone_into(&mut self.api_root);
        self
    }

    /// Joins a path onto the API root.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_root)
    }

    /// Builds an authenticated request for GitHub REST API.
    pub fn request(&self, url: &str) -> RequestBuilder {
        self.authenticate(self.client.get(url))
    }

    /// Builds an authenticated request that does not follow redirects.
    pub fn request_without_redirect(&self, url: &str) -> RequestBuilder {
        self.authenticate(self.no_redirect_client.get(url))
    }

    /// Builds an unauthenticated request, used for transient download locations.
    pub fn plain_request(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    fn authenticate(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header(header::ACCEPT, "application/vnd.github+json")
            .bearer_auth(&self.token)
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    /// Sends a GET request and parses the JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error that instructs retrying, or reports the resource as missing, or cancels.
    pub async fn get_json<T>(&self, url: &str, query: &[(&str, String)]) -> StateResult<T>
    where
        T: DeserializeOwned,
    {
        debug!("requesting {url}…");

        let response = self
            .request(url)
            .query(query)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| classify(url, &err))?;

        response.json::<T>().await.map_err(|err| {
            error!("failed to parse data from {url}: {err}");
            if let Some(source) = err.source() {
                error!("{source}");
            }
            StateError::Retry(format!("malformed response from {url}"))
        })
    }

    /// Fetches every page of a paginated list endpoint.
    ///
    /// # Errors
    ///
    /// Returns the first error of any page.
    pub async fn get_pages<P>(&self, url: &str, query: &[(&str, String)]) -> StateResult<Vec<P::Item>>
    where
        P: Page,
    {
        let mut items = Vec::new();
        let mut page: u32 = 1;

        loop {
            let mut paged = query.to_vec();
            paged.push(("per_page", PAGE_SIZE.to_string()));
            paged.push(("page", page.to_string()));

            let response = self.get_json::<P>(url, &paged).await?;
            let total_count = response.total_count();
            let batch = response.into_items();
            let exhausted = batch.len() < PAGE_SIZE;
            items.extend(batch);

            if exhausted || total_count.is_some_and(|total| items.len() as u64 >= total) {
                return Ok(items);
            }
            page += 1;
        }
    }
}

/// Turns a transport or status error into a [`StateError`].
pub fn classify(url: &str, err: &reqwest::Error) -> StateError {
    match err.status() {
        Some(StatusCode::NOT_FOUND) => {
            debug!("{url} does not exist");
            StateError::NotFound(url.to_owned())
        }
        Some(status) if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS => {
            error!("failed to request {url}: {status}");
            StateError::Retry(format!("{url}: {status}"))
        }
        Some(status) => {
            error!("failed to request {url}: {status}");
            StateError::Cancelled(format!("{url}: {status}"))
        }
        None if err.is_connect() || err.is_timeout() => {
            error!("failed to reach {url}: {err}");
            StateError::Retry(format!("{url}: {err}"))
        }
        None => {
            error!("failed to request {url}: {err}");
            StateError::Cancelled(format!("{url}: {err}"))
        }
    }
}

/// A page of a paginated list endpoint.
pub trait Page: DeserializeOwned {
    /// The listed item.
    type Item;

    /// The total number of items across all pages, if the endpoint reports it.
    fn total_count(&self) -> Option<u64>;

    /// Consumes the page into its items.
    fn into_items(self) -> Vec<Self::Item>;
}

impl<T> Page for Vec<T>
where
    T: DeserializeOwned,
{
    type Item = T;

    fn total_count(&self) -> Option<u64> {
        None
    }

    fn into_items(self) -> Vec<T> {
        self
    }
}
