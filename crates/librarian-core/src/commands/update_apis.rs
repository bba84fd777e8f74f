//! `update-apis` (spec §4.7): for each library (optionally restricted by
//! `--library-id`), if its `LastGeneratedCommit` differs from the HEAD of
//! its API paths, regenerate, clean, build, and advance the generated
//! commit. Generated code changes and state changes land in one commit.

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::contract::{GenerateRequest, GenerateResponse};
use crate::pr_authoring::{LibraryError, LibraryOutcome};
use crate::state::PipelineState;

use super::support::{invoke_exit_only, invoke_with_request, prepare_env_file};
use super::{CommandContext, OrchestratorResult, finish_batch, open_pr_for_batch};

#[instrument(skip(ctx, state, api_repo_heads))]
pub async fn run_update_apis(
    ctx: &CommandContext<'_>,
    state: &mut PipelineState,
    library_id_filter: Option<&str>,
    timestamp: &str,
    api_repo_heads: &dyn Fn(&[String]) -> Result<String>,
) -> Result<OrchestratorResult> {
    let mut successes = Vec::new();
    let mut errors = Vec::new();

    let ids: Vec<String> = state
        .libraries
        .iter()
        .filter(|l| library_id_filter.is_none_or(|f| f == l.id))
        .map(|l| l.id.clone())
        .collect();

    for id in ids {
        let current_head = {
            let lib = state.library(&id).expect("id collected from state");
            match api_repo_heads(&lib.api_paths) {
                Ok(head) => head,
                Err(e) => {
                    errors.push(LibraryError {
                        library_id: id.clone(),
                        message: format!("resolving API HEAD: {e:#}"),
                    });
                    continue;
                }
            }
        };

        let needs_update = {
            let lib = state.library(&id).expect("id collected from state");
            lib.last_generated_commit != current_head
        };
        if !needs_update {
            continue;
        }

        match update_one_library(ctx, &id, &current_head) {
            Ok(()) => {
                if let Some(lib) = state.library_mut(&id) {
                    lib.last_generated_commit = current_head.clone();
                }
                if let Err(e) = crate::state::save_state(&ctx.repo_dir, state) {
                    return Err(e.context("saving pipeline state after update-apis"));
                }
                if let Err(e) = crate::git::commit(
                    &ctx.repo_dir,
                    &format!("chore: regenerate library {id}"),
                    &ctx.git_user_name,
                    &ctx.git_user_email,
                ) {
                    return Err(e.context("committing update-apis change"));
                }
                info!(library = %id, "regenerated");
                successes.push(LibraryOutcome {
                    library_id: id.clone(),
                    description: format!("Regenerated library {id} at {current_head}"),
                });
            }
            Err(e) => {
                warn!(library = %id, error = %e, "update-apis failed");
                let _ = crate::git::clean_working_tree(&ctx.repo_dir);
                errors.push(LibraryError {
                    library_id: id,
                    message: e.to_string(),
                });
            }
        }
    }

    let (exit, batch) = finish_batch(successes, errors);
    let pr_number = open_pr_for_batch(ctx, "update-apis", "chore: update APIs", timestamp, &batch).await?;
    Ok(OrchestratorResult {
        exit,
        pr_number,
        batch,
    })
}

fn update_one_library(ctx: &CommandContext<'_>, library_id: &str, _head: &str) -> Result<()> {
    let state = crate::state::load_state(&ctx.repo_dir)?;
    let library = state
        .library(library_id)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("library {library_id} not found"))?;

    let inputs_dir = ctx.repo_dir.join(".librarian-scratch/input");
    let output_dir = ctx.repo_dir.join(".librarian-scratch/output");
    let env_dir = ctx.repo_dir.join(".librarian-scratch/env");
    std::fs::create_dir_all(&inputs_dir)?;
    std::fs::create_dir_all(&output_dir)?;

    let request = GenerateRequest { library };
    let generate_env = prepare_env_file(&ctx.config, &ctx.secrets, "generate", &env_dir)?;
    let response: GenerateResponse = invoke_with_request(
        ctx.runner,
        &ctx.image,
        "generate",
        &ctx.repo_dir,
        &inputs_dir,
        &output_dir,
        generate_env.as_ref().map(|g| g.path()),
        &request,
    )?;
    if !response.is_success() {
        anyhow::bail!(
            "generate failed for {library_id}: {}",
            response.error.unwrap_or_default()
        );
    }

    let clean_env = prepare_env_file(&ctx.config, &ctx.secrets, "clean", &env_dir)?;
    invoke_exit_only(ctx.runner, &ctx.image, "clean", &ctx.repo_dir, clean_env.as_ref().map(|g| g.path()))?;
    let build_env = prepare_env_file(&ctx.config, &ctx.secrets, "build", &env_dir)?;
    invoke_exit_only(ctx.runner, &ctx.image, "build", &ctx.repo_dir, build_env.as_ref().map(|g| g.path()))?;
    Ok(())
}
