//! `create-release-pr` (spec §4.6 + §4.7): runs the Release Planner for
//! every non-blocked library in declared order, then hands the aggregated
//! result to PR authoring.

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::git;
use crate::pr_authoring::{BatchOutcome, LibraryError, LibraryOutcome};
use crate::release_planner::{plan_release, previous_release_tag, release_commit_message};
use crate::state::{AutomationLevel, PipelineState};

use super::support::{invoke_exit_only, prepare_env_file};
use super::{CommandContext, open_pr_for_batch};

pub struct CreateReleasePrOptions {
    pub release_id: String,
    pub skip_build: bool,
    pub timestamp: String,
}

pub struct CreateReleasePrResult {
    pub pr_number: Option<u64>,
    pub batch: BatchOutcome,
}

#[instrument(skip(ctx, state, options))]
pub async fn run_create_release_pr(
    ctx: &CommandContext<'_>,
    state: &mut PipelineState,
    options: &CreateReleasePrOptions,
) -> Result<CreateReleasePrResult> {
    let mut successes = Vec::new();
    let mut errors = Vec::new();

    let library_ids: Vec<String> = state.libraries.iter().map(|l| l.id.clone()).collect();

    for library_id in library_ids {
        let library = state.library(&library_id).expect("id from state").clone();
        if library.release_automation_level == AutomationLevel::Blocked {
            continue;
        }

        let repo = match git::open(&ctx.repo_dir) {
            Ok(r) => r,
            Err(e) => {
                errors.push(LibraryError {
                    library_id,
                    message: format!("opening repo: {e:#}"),
                });
                continue;
            }
        };

        let mut paths = state.common_library_source_paths.clone();
        paths.extend(library.source_paths.clone());

        let tag = previous_release_tag(&library);
        let commits = match git::commits_for_paths_since_tag(&repo, &paths, &tag) {
            Ok(c) => c,
            Err(e) => {
                errors.push(LibraryError {
                    library_id,
                    message: format!("scanning commits: {e:#}"),
                });
                continue;
            }
        };

        let Some(plan) = plan_release(&library, &commits) else {
            continue;
        };

        let notes_path = ctx
            .repo_dir
            .join(".librarian-scratch/input")
            .join(format!("{}-{}-release-notes.txt", plan.library_id, plan.release_version));
        if let Some(parent) = notes_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = std::fs::write(&notes_path, &plan.release_notes) {
            errors.push(LibraryError {
                library_id: library_id.clone(),
                message: format!("writing release notes: {e}"),
            });
            continue;
        }

        match run_release_steps(ctx, options) {
            Ok(()) => {}
            Err(e) => {
                warn!(library = %library_id, error = %e, "release preparation failed");
                let _ = git::clean_working_tree(&ctx.repo_dir);
                errors.push(LibraryError {
                    library_id: library_id.clone(),
                    message: e.to_string(),
                });
                continue;
            }
        }

        if let Some(lib) = state.library_mut(&library_id) {
            lib.current_version = plan.release_version.clone();
            lib.last_released_commit = git::head_hash(&git::open(&ctx.repo_dir)?).unwrap_or_default();
            lib.release_timestamp = Some(options.timestamp.clone());
            lib.next_version = None;
        }
        if let Err(e) = crate::state::save_state(&ctx.repo_dir, state) {
            return Err(e.context("saving pipeline state in create-release-pr"));
        }
        let message = release_commit_message(&plan, &options.release_id);
        if let Err(e) = git::commit(&ctx.repo_dir, &message, &ctx.git_user_name, &ctx.git_user_email) {
            return Err(e.context("committing release"));
        }

        info!(library = %library_id, version = %plan.release_version, "release prepared");
        successes.push(LibraryOutcome {
            library_id: library_id.clone(),
            description: format!("Released {library_id} {}", plan.release_version),
        });
    }

    let batch = crate::pr_authoring::classify_batch(&successes, &errors);
    let pr_number = open_pr_for_batch(ctx, "release", "chore: release", &options.timestamp, &batch).await?;

    Ok(CreateReleasePrResult { pr_number, batch })
}

fn run_release_steps(ctx: &CommandContext<'_>, options: &CreateReleasePrOptions) -> Result<()> {
    let env_dir = ctx.repo_dir.join(".librarian-scratch/env");
    let prepare_env = prepare_env_file(&ctx.config, &ctx.secrets, "prepare-library-release", &env_dir)?;
    invoke_exit_only(
        ctx.runner,
        &ctx.image,
        "prepare-library-release",
        &ctx.repo_dir,
        prepare_env.as_ref().map(|g| g.path()),
    )?;
    if !options.skip_build {
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
    }
    Ok(())
}
