//! # Piccolo (Personal Web File Server)
//!
//! `piccolo` publishes one directory tree over HTTP. Anonymous visitors browse and
//! download the public part of the tree; directories listed in `permissions.json`
//! are private and only reachable by the users named for them.
//!
//! ## Sessions
//!
//! Visitors are tracked with an in-memory session keyed by the `msessionid` cookie.
//! A session expires after a fixed idle lifetime; every response refreshes the cookie.
//!
//! ## Login Guard
//!
//! Failed logins are counted per client IP inside a sliding window. Once the threshold
//! is reached the IP is refused on the login form until older failures age out.
//!
//! ## Access Control
//!
//! Private directories protect everything below them, matched per path segment.
//! Administrators (listed in the `admin_users` parameter) see every directory and
//! manage users, permissions and parameters from the console under `/<admin_path>`.
//!
//! ## Configuration
//!
//! Three JSON files live in the configuration directory: `params.json`, `users.json`
//! and `permissions.json`. Create them with `piccolo init`.

pub mod cli;
pub mod piccolo;
pub mod settings;
pub mod utils;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
