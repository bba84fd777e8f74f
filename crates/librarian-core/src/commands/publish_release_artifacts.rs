//! `publish-release-artifacts` (spec §4.7): load pipeline state/config
//! from the artifact root; for each release, invoke the container
//! `publish-library` subcommand, then create a GitHub release.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::instrument;

use crate::container::{ContainerRunner, SecretCache};
use crate::contract::ReleasesManifest;
use crate::git::format_release_tag;
use crate::github::{GitHubClient, is_prerelease_version};
use crate::state::PipelineConfig;

use super::support::{invoke_exit_only, prepare_env_file};

pub struct PublishedRelease {
    pub library_id: String,
    pub version: String,
    pub release_url: String,
}

#[instrument(skip(runner, github))]
pub async fn run_publish_release_artifacts(
    runner: &dyn ContainerRunner,
    image: &str,
    github: &GitHubClient,
    artifact_root: &Path,
) -> Result<Vec<PublishedRelease>> {
    let manifest_raw = std::fs::read_to_string(artifact_root.join("releases.json"))
        .context("reading releases.json")?;
    let manifest: ReleasesManifest = serde_json::from_str(&manifest_raw)?;

    // `create-release-artifacts` copies pipeline-config.json alongside the
    // manifest; fall back to an empty config (no env injection) if it is
    // missing, e.g. an artifact root built by an older run.
    let config: PipelineConfig = std::fs::read_to_string(artifact_root.join("pipeline-config.json"))
        .ok()
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default();
    let secrets = SecretCache::new();
    let env_dir = artifact_root.join(".librarian-scratch/env");

    let mut published = Vec::new();
    for release in &manifest.releases {
        let repo_dir = artifact_root.join(&release.library_id);
        let publish_env = prepare_env_file(&config, &secrets, "publish-library", &env_dir)?;
        invoke_exit_only(runner, image, "publish-library", &repo_dir, publish_env.as_ref().map(|g| g.path()))?;

        let tag = format_release_tag(&release.library_id, &release.version);
        let release_url = github
            .create_release(
                &tag,
                &tag,
                &format!("Release {} {}", release.library_id, release.version),
                is_prerelease_version(&release.version),
            )
            .await?;

        published.push(PublishedRelease {
            library_id: release.library_id.clone(),
            version: release.version.clone(),
            release_url,
        });
    }

    Ok(published)
}
