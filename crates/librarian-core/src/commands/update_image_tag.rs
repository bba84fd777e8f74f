//! `update-image-tag` (spec §4.7): set `PipelineState.ImageTag`,
//! regenerate every library at its last-generated commit, clean, build,
//! commit, and open a PR.

use anyhow::Result;
use tracing::{info, instrument};

use crate::contract::{GenerateRequest, GenerateResponse};
use crate::git;
use crate::pr_authoring::{LibraryError, LibraryOutcome};
use crate::state::PipelineState;

use super::support::{invoke_exit_only, invoke_with_request, prepare_env_file};
use super::{CommandContext, OrchestratorResult, finish_batch, open_pr_for_batch};

pub struct UpdateImageTagOptions {
    pub new_image_tag: String,
    pub timestamp: String,
}

#[instrument(skip(ctx, state, options))]
pub async fn run_update_image_tag(
    ctx: &CommandContext<'_>,
    state: &mut PipelineState,
    options: &UpdateImageTagOptions,
) -> Result<OrchestratorResult> {
    state.image_tag = options.new_image_tag.clone();
    crate::state::save_state(&ctx.repo_dir, state)?;

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    let library_ids: Vec<String> = state.libraries.iter().map(|l| l.id.clone()).collect();
    let inputs_dir = ctx.repo_dir.join(".librarian-scratch/input");
    let output_dir = ctx.repo_dir.join(".librarian-scratch/output");
    let env_dir = ctx.repo_dir.join(".librarian-scratch/env");
    std::fs::create_dir_all(&inputs_dir)?;
    std::fs::create_dir_all(&output_dir)?;

    for library_id in library_ids {
        let library = state.library(&library_id).expect("id from state").clone();
        let request = GenerateRequest {
            library: library.clone(),
        };
        let result: Result<()> = (|| {
            let generate_env = prepare_env_file(&ctx.config, &ctx.secrets, "generate", &env_dir)?;
            let response: GenerateResponse = invoke_with_request(
                ctx.runner,
                &options.new_image_tag,
                "generate",
                &ctx.repo_dir,
                &inputs_dir,
                &output_dir,
                generate_env.as_ref().map(|g| g.path()),
                &request,
            )?;
            if !response.is_success() {
                anyhow::bail!(
                    "generate failed: {}",
                    response.error.unwrap_or_default()
                );
            }
            let clean_env = prepare_env_file(&ctx.config, &ctx.secrets, "clean", &env_dir)?;
            invoke_exit_only(ctx.runner, &options.new_image_tag, "clean", &ctx.repo_dir, clean_env.as_ref().map(|g| g.path()))?;
            let build_env = prepare_env_file(&ctx.config, &ctx.secrets, "build", &env_dir)?;
            invoke_exit_only(ctx.runner, &options.new_image_tag, "build", &ctx.repo_dir, build_env.as_ref().map(|g| g.path()))?;
            Ok(())
        })();

        match result {
            Ok(()) => successes.push(LibraryOutcome {
                library_id: library_id.clone(),
                description: format!("Regenerated {library_id} under new image tag"),
            }),
            Err(e) => {
                let _ = git::clean_working_tree(&ctx.repo_dir);
                errors.push(LibraryError {
                    library_id,
                    message: e.to_string(),
                });
            }
        }
    }

    crate::state::save_state(&ctx.repo_dir, state)?;
    git::commit(
        &ctx.repo_dir,
        &format!("chore: update image tag to {}", options.new_image_tag),
        &ctx.git_user_name,
        &ctx.git_user_email,
    )?;

    let (exit, batch) = finish_batch(successes, errors);
    let pr_number = open_pr_for_batch(
        ctx,
        "image-tag",
        "chore: update image tag",
        &options.timestamp,
        &batch,
    )
    .await?;
    if let Some(pr) = pr_number {
        info!(pr, "opened image-tag update PR");
    }

    Ok(OrchestratorResult {
        exit,
        pr_number,
        batch,
    })
}
