#![deny(unsafe_code)]

pub mod commands;
pub mod container;
pub mod contract;
pub mod conventional;
pub mod error;
pub mod git;
pub mod github;
pub mod pr_authoring;
pub mod release_planner;
pub mod repository;
pub mod semver_engine;
pub mod state;
pub mod workroot;

/// Initialize the rustls cryptographic provider. Must run before any TLS
/// use (reqwest against the GitHub API). Safe to call more than once.
pub fn init_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}
