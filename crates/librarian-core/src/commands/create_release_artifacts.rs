//! `create-release-artifacts` (spec §4.7): checkout the language repo,
//! parse release commits by Release-ID, build/test/package each release,
//! then copy state/config and a `releases.json` manifest into the
//! artifact root.

use std::path::Path;

use anyhow::Result;
use tracing::instrument;

use crate::contract::{ReleaseArtifactEntry, ReleasesManifest};
use crate::git;
use crate::state;

use super::support::{invoke_exit_only, invoke_exit_only_with_output, prepare_env_file};
use super::CommandContext;

#[instrument(skip(ctx))]
pub fn run_create_release_artifacts(
    ctx: &CommandContext<'_>,
    release_id: &str,
    artifact_root: &Path,
) -> Result<ReleasesManifest> {
    let repo = git::open(&ctx.repo_dir)?;
    let releases = git::commits_for_release_id(&repo, release_id)?;

    let mut manifest = ReleasesManifest::default();
    let mut last_commit = String::new();
    let env_dir = ctx.repo_dir.join(".librarian-scratch/env");

    for release_commit in &releases {
        git::checkout(&ctx.repo_dir, &release_commit.id)?;

        let build_env = prepare_env_file(&ctx.config, &ctx.secrets, "build", &env_dir)?;
        invoke_exit_only(ctx.runner, &ctx.image, "build", &ctx.repo_dir, build_env.as_ref().map(|g| g.path()))?;
        let test_env = prepare_env_file(&ctx.config, &ctx.secrets, "integration-test-library", &env_dir)?;
        invoke_exit_only(
            ctx.runner,
            &ctx.image,
            "integration-test-library",
            &ctx.repo_dir,
            test_env.as_ref().map(|g| g.path()),
        )?;

        let library_id = release_commit
            .message()
            .lines()
            .find_map(|l| l.strip_prefix("Librarian-Release-Library: "))
            .unwrap_or_default()
            .to_string();
        let version = release_commit
            .message()
            .lines()
            .find_map(|l| l.strip_prefix("Librarian-Release-Version: "))
            .unwrap_or_default()
            .to_string();

        let output_dir = artifact_root.join(&library_id);
        let package_env = prepare_env_file(&ctx.config, &ctx.secrets, "package-library", &env_dir)?;
        invoke_exit_only_with_output(
            ctx.runner,
            &ctx.image,
            "package-library",
            &ctx.repo_dir,
            &output_dir,
            package_env.as_ref().map(|g| g.path()),
        )?;

        manifest.releases.push(ReleaseArtifactEntry {
            library_id,
            version,
            commit_hash: release_commit.id.to_string(),
        });
        last_commit = release_commit.id.to_string();
    }

    if !last_commit.is_empty() {
        git::checkout(&ctx.repo_dir, &last_commit)?;
    }

    std::fs::create_dir_all(artifact_root)?;
    std::fs::copy(
        ctx.repo_dir.join(state::STATE_PATH),
        artifact_root.join("pipeline-state.json"),
    )?;
    std::fs::copy(
        ctx.repo_dir.join(state::CONFIG_PATH),
        artifact_root.join("pipeline-config.json"),
    )?;
    let manifest_json = serde_json::to_string_pretty(&manifest)?;
    std::fs::write(artifact_root.join("releases.json"), manifest_json)?;

    Ok(manifest)
}
