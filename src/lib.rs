//! Relays packages built by GitHub Actions workflows into the package registry of another repository.
//!
//! The pipeline scans recent workflow runs ([`scanner`]), extracts publication claims from job logs
//! ([`claims`]), asks the destination registry whether each claim is already satisfied ([`gate`]),
//! downloads and checks the artifact ([`fetch`], [`verify`]) and republishes it ([`publish`]).
//! [`mirror::Mirror`] drives all of it with per-unit failure isolation.

pub mod claims;
pub mod config;
pub mod credentials;
pub mod env;
pub mod error;
pub mod fetch;
pub mod framework;
pub mod gate;
pub mod github;
pub mod mirror;
pub mod package;
pub mod publish;
pub mod report;
pub mod scanner;
pub mod source;
pub mod tool;
pub mod transactions;
pub mod verify;
pub mod workflow;

pub use error::RelayError;

/// A shorthand to define a statically allocated variable using a [`std::sync::LazyLock`].
///
/// # Examples
///
/// ```rust
/// use artifact_relay::static_lazy_lock;
/// use std::sync::LazyLock;
///
/// static_lazy_lock! {
///     pub VAR_1: String = String::from("a static variable");
/// }
/// // ...equals to...
/// pub static VAR_2: LazyLock<String> = LazyLock::new(|| String::from("a static variable"));
///
/// assert_eq!(*VAR_1, *VAR_2);
/// ```
#[macro_export]
macro_rules! static_lazy_lock {
    ($(#[$meta:meta])* $vis:vis $name:ident: $type:ty = $expr:expr $(;)?) => {
        $(#[$meta])*
        $vis static $name: $crate::__priv_macro_use::LazyLock<$type> =
            $crate::__priv_macro_use::LazyLock::new(|| $expr);
    };
}

#[doc(hidden)]
pub mod __priv_macro_use {
    pub use std::sync::LazyLock;
}
