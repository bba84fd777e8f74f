//! Command Orchestrators (spec §4.7): one module per high-level command,
//! composing the state store, container layer, git/GitHub facades, the
//! release planner, and PR authoring into the full pipeline with batch
//! error accumulation.

mod configure;
pub mod create_release_artifacts;
pub mod create_release_pr;
mod generate;
pub mod merge_release_pr;
pub mod publish_release_artifacts;
mod support;
mod update_apis;
pub mod update_image_tag;

pub use configure::{discover_api_paths, run_configure};
pub use create_release_artifacts::run_create_release_artifacts;
pub use create_release_pr::run_create_release_pr;
pub use generate::run_generate;
pub use merge_release_pr::run_merge_release_pr;
pub use publish_release_artifacts::run_publish_release_artifacts;
pub use update_apis::run_update_apis;
pub use update_image_tag::run_update_image_tag;

use std::path::PathBuf;

use crate::container::{ContainerRunner, SecretCache};
use crate::github::GitHubClient;
use crate::pr_authoring::{BatchOutcome, LibraryError, LibraryOutcome};
use crate::state::PipelineConfig;

/// Process exit code for a finished command (spec §4.7/§6).
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    ErrorsNoPr = 1,
}

/// Everything one command invocation needs, reified instead of read from
/// process-wide globals (spec §9 "global state").
pub struct CommandContext<'a> {
    pub repo_dir: PathBuf,
    pub image: String,
    pub runner: &'a dyn ContainerRunner,
    pub github: Option<&'a GitHubClient>,
    pub push: bool,
    pub git_user_name: String,
    pub git_user_email: String,
    /// Environment-variable descriptors per container subcommand (spec
    /// §4.4). Defaults to an empty config when the repo has none.
    pub config: PipelineConfig,
    /// Per-invocation cache for `SecretName` lookups (spec §4.4 "cached
    /// per-process").
    pub secrets: SecretCache,
}

/// Outcome common to every batch orchestrator: a PR is created iff there
/// is at least one success, following the four-state table in spec §4.7.
pub struct OrchestratorResult {
    pub exit: ExitCode,
    pub pr_number: Option<u64>,
    pub batch: BatchOutcome,
}

pub(crate) fn finish_batch(
    successes: Vec<LibraryOutcome>,
    errors: Vec<LibraryError>,
) -> (ExitCode, BatchOutcome) {
    let batch = crate::pr_authoring::classify_batch(&successes, &errors);
    let exit = match &batch {
        BatchOutcome::AllFailed => ExitCode::ErrorsNoPr,
        _ => ExitCode::Success,
    };
    (exit, batch)
}

/// Opens (or, with `push=false`, logs) the PR for a batch outcome that has
/// at least one success, applying `do-not-merge` when the batch also
/// contains errors (spec §4.7).
pub(crate) async fn open_pr_for_batch(
    ctx: &CommandContext<'_>,
    command_type: &str,
    title_prefix: &str,
    timestamp: &str,
    batch: &BatchOutcome,
) -> anyhow::Result<Option<u64>> {
    let body = match batch {
        BatchOutcome::AllSucceeded { body } | BatchOutcome::PartialFailure { body } => body,
        _ => return Ok(None),
    };

    let branch = crate::pr_authoring::branch_name(command_type, timestamp);
    let title = crate::pr_authoring::pr_title(title_prefix, timestamp);

    let Some(github) = ctx.github else {
        return Ok(None);
    };
    if !ctx.push {
        tracing::info!(title = %title, body = %body, "push disabled; logging PR content");
        return Ok(None);
    }

    let pr = github.create_pr(&title, body, &branch, "main").await?;
    if matches!(batch, BatchOutcome::PartialFailure { .. }) {
        github
            .add_label(pr.number, crate::pr_authoring::DO_NOT_MERGE_LABEL)
            .await?;
    }
    Ok(Some(pr.number))
}
