//! `generate` (spec §6): invoke the container `generate` subcommand for a
//! single library and write the generated files under `/output`. Unlike
//! `update-apis` this does not mutate `PipelineState`, commit, or open a PR —
//! it is the raw single-library primitive `update-apis` builds on top of.

use anyhow::Result;
use tracing::instrument;

use crate::contract::{GenerateRequest, GenerateResponse};
use crate::state::PipelineState;

use super::support::{invoke_with_request, prepare_env_file};
use super::CommandContext;

#[instrument(skip(ctx, state))]
pub fn run_generate(
    ctx: &CommandContext<'_>,
    state: &PipelineState,
    library_id: &str,
) -> Result<GenerateResponse> {
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
    let env_file = prepare_env_file(&ctx.config, &ctx.secrets, "generate", &env_dir)?;
    invoke_with_request(
        ctx.runner,
        &ctx.image,
        "generate",
        &ctx.repo_dir,
        &inputs_dir,
        &output_dir,
        env_file.as_ref().map(|g| g.path()),
        &request,
    )
}
