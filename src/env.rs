//! Defines the environment variables to use.

use crate::static_lazy_lock;

use std::env;

/// Parses an environment variable from [`String`] to something else, wrapping any error in [`anyhow::Error`].
#[macro_export]
macro_rules! parse_env {
    ($key:expr => |$var:ident| $expr:expr) => {
        std::env::var($key)
            .map_err(|e| anyhow::anyhow!(e))
            .and_then(|$var| $expr)
    };
    ($key:expr => |$var:ident| $expr:expr; anyhow) => {
        $crate::parse_env!($key => |$var| $expr.map_err(|e| anyhow::anyhow!(e)))
    };
}

static_lazy_lock! {
    /// The maximum retry limit for transient API failures.
    pub MAX_RETRIES: u8 = crate::parse_env!("MAX_RETRIES" => |s| s.parse::<u8>(); anyhow).unwrap_or(5);
}

static_lazy_lock! {
    /// The root of the GitHub REST API. Set by GitHub Actions on Enterprise Server runners.
    pub GITHUB_API_URL: String = env::var("GITHUB_API_URL")
        .map(|url| url.trim_end_matches('/').to_owned())
        .unwrap_or_else(|_| String::from("https://api.github.com"));
}
