//! GitHub collaborator for labgrade
//!
//! [`GitHubClient`] implements [`labgrade_core::RepositoryClient`] over the
//! GitHub REST API. Configuration comes from `GITHUB_TOKEN` and
//! `GITHUB_API_URL`, see [`GitHubConfig`].

pub mod client;
pub mod config;
mod wire;

pub use client::{GitHubClient, HISTORY_PAGE_SIZE, MAX_HISTORY_PAGES, WORKFLOWS_DIR};
pub use config::{GitHubConfig, API_VERSION, DEFAULT_API_URL};
