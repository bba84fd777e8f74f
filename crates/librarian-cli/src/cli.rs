use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use tracing::info;

use librarian_core::commands::{
    self, CommandContext,
    create_release_pr::CreateReleasePrOptions,
    merge_release_pr::MergeReleasePrOptions,
    update_image_tag::UpdateImageTagOptions,
};
use librarian_core::container::{SecretCache, SubprocessRunner};
use librarian_core::error::LibrarianError;
use librarian_core::git;
use librarian_core::github::{GitHubClient, GitHubError};
use librarian_core::pr_authoring::BatchOutcome;
use librarian_core::repository::parse_pr_url;
use librarian_core::state;
use librarian_core::workroot::{self, WorkRoot};

use crate::cli_def::{Cli, Commands, ContainerArgs};
use crate::logging;

/// Parses the CLI, dispatches to the matching orchestrator, and returns the
/// process exit code (spec §6). Errors are converted to [`LibrarianError`]
/// at this boundary so `main` can print the right message and exit code;
/// internal plumbing stays on `anyhow::Result` throughout (spec's §10.3
/// two-tier error model).
pub async fn run() -> Result<i32> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    librarian_core::init_crypto_provider();
    dispatch(cli).await.map_err(classify_error)
}

async fn dispatch(cli: Cli) -> Result<i32> {
    let repo_dir = resolve_repo_dir(&cli)?;
    let work_root = resolve_work_root(&cli, &repo_dir);
    let timestamp = now_timestamp();

    match cli.command {
        Commands::Configure {
            api_path,
            api_root,
            language,
            container,
        } => {
            let mut st = state::load_state(&repo_dir)?;
            let resolved_paths = if api_path.is_empty() {
                let api_root = api_root
                    .as_deref()
                    .context("configure requires --api-path, or --api-root to auto-discover")?;
                let language = language
                    .as_deref()
                    .context("configure requires --language to auto-discover from --api-root")?;
                commands::discover_api_paths(Path::new(api_root), language, &st)?
            } else {
                api_path
            };
            if resolved_paths.is_empty() {
                bail!("configure found no API path to configure");
            }
            let ctx = build_context(&repo_dir, &container, &st, container.push).await?;
            let result =
                commands::run_configure(&ctx.ctx(), &mut st, &resolved_paths, &timestamp).await?;
            report_batch(&result.batch);
            Ok(result.exit as i32)
        }

        Commands::Generate {
            library_id,
            container,
        } => {
            let st = state::load_state(&repo_dir)?;
            let ctx = build_context(&repo_dir, &container, &st, false).await?;
            let response = commands::run_generate(&ctx.ctx(), &st, &library_id)?;
            if response.is_success() {
                info!(library = %library_id, "generate succeeded");
                Ok(0)
            } else {
                eprintln!(
                    "librarian: generate failed for {library_id}: {}",
                    response.error.unwrap_or_default()
                );
                Ok(1)
            }
        }

        Commands::UpdateApis {
            library_id,
            api_root,
            container,
        } => {
            let Some(api_root) = api_root else {
                bail!("update-apis requires --api-root");
            };
            let api_root = PathBuf::from(api_root);
            let mut st = state::load_state(&repo_dir)?;
            let ctx = build_context(&repo_dir, &container, &st, container.push).await?;
            let api_repo_heads = |_paths: &[String]| -> Result<String> {
                let repo = git::open(&api_root)?;
                git::head_hash(&repo)
            };
            let result = commands::run_update_apis(
                &ctx.ctx(),
                &mut st,
                library_id.as_deref(),
                &timestamp,
                &api_repo_heads,
            )
            .await?;
            report_batch(&result.batch);
            Ok(result.exit as i32)
        }

        Commands::CreateReleasePr {
            release_id,
            skip_build,
            skip_integration_tests: _,
            container,
        }
        | Commands::Release {
            release_id,
            skip_build,
            skip_integration_tests: _,
            container,
        } => {
            let mut st = state::load_state(&repo_dir)?;
            let ctx = build_context(&repo_dir, &container, &st, container.push).await?;
            let release_id = release_id.unwrap_or_else(|| workroot::new_release_id(&timestamp));
            let options = CreateReleasePrOptions {
                release_id: release_id.clone(),
                skip_build,
                timestamp: timestamp.clone(),
            };
            let result = commands::run_create_release_pr(&ctx.ctx(), &mut st, &options).await?;
            let wr = WorkRoot::create(&work_root, container.env_file.as_deref().map(Path::new))?;
            wr.append_env_result("_RELEASE_ID", &release_id)?;
            if let Some(pr) = result.pr_number {
                wr.append_env_result("_PR_NUMBER", &pr.to_string())?;
            }
            report_batch(&result.batch);
            let exit = if matches!(result.batch, BatchOutcome::AllFailed) { 1 } else { 0 };
            Ok(exit)
        }

        Commands::MergeReleasePr {
            release_pr_url,
            baseline_commit,
            env_file,
        } => {
            let (owner, name, pr_number) = parse_pr_url(&release_pr_url)?;
            let token = required_github_token()?;
            let github = GitHubClient::new(owner, name, token);
            let pr = github.get_pr(pr_number).await?;
            let options = MergeReleasePrOptions {
                pr_number,
                pr_head_ref: pr.head_sha,
                baseline_commit,
            };
            let result = commands::run_merge_release_pr(&github, &repo_dir, &options).await?;
            if result.merged {
                let wr = WorkRoot::create(&work_root, env_file.as_deref().map(Path::new))?;
                if let Some(sha) = &result.merged_commit {
                    wr.append_env_result("_MERGED_RELEASE_COMMIT", sha)?;
                }
                info!(pr = pr_number, "merged release PR");
                Ok(0)
            } else {
                for s in &result.suspects {
                    eprintln!("librarian: suspected-changed library {}: {}", s.library_id, s.reason);
                }
                eprintln!("librarian: did not merge release PR due to suspected-changed libraries");
                Ok(1)
            }
        }

        Commands::CreateReleaseArtifacts {
            release_id,
            repo_url: _,
            artifact_root,
            container,
        } => {
            let st = state::load_state(&repo_dir)?;
            let ctx = build_context(&repo_dir, &container, &st, false).await?;
            let manifest = commands::run_create_release_artifacts(
                &ctx.ctx(),
                &release_id,
                Path::new(&artifact_root),
            )?;
            info!(count = manifest.releases.len(), "built release artifacts");
            Ok(0)
        }

        Commands::PublishReleaseArtifacts {
            artifact_root,
            tag: _,
            tag_repo_url: _,
            container,
        } => {
            let image = workroot::derive_image(container.image.as_deref(), "");
            let runner = SubprocessRunner::default();
            let token = required_github_token()?;
            let repo = git::open(&repo_dir)?;
            let (owner, name) = git::github_repo_from_remote(&repo)?;
            let github = GitHubClient::new(owner, name, token);
            let published = commands::run_publish_release_artifacts(
                &runner,
                &image,
                &github,
                Path::new(&artifact_root),
            )
            .await?;
            for p in &published {
                info!(library = %p.library_id, version = %p.version, url = %p.release_url, "published");
            }
            Ok(0)
        }

        Commands::UpdateImageTag {
            new_image_tag,
            container,
        } => {
            let mut st = state::load_state(&repo_dir)?;
            let ctx = build_context(&repo_dir, &container, &st, container.push).await?;
            let options = UpdateImageTagOptions {
                new_image_tag,
                timestamp,
            };
            let result = commands::run_update_image_tag(&ctx.ctx(), &mut st, &options).await?;
            report_batch(&result.batch);
            Ok(result.exit as i32)
        }

        Commands::Completions(args) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(args.shell, &mut cmd, name, &mut std::io::stdout());
            Ok(0)
        }
    }
}

fn resolve_repo_dir(cli: &Cli) -> Result<PathBuf> {
    match &cli.repo_root {
        Some(p) => Ok(PathBuf::from(p)),
        None => std::env::current_dir().context("resolving current directory"),
    }
}

fn resolve_work_root(cli: &Cli, repo_dir: &Path) -> PathBuf {
    cli.work_root
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| repo_dir.join(".librarian-work"))
}

fn now_timestamp() -> String {
    workroot::format_timestamp(jiff::Zoned::now)
}

/// Maps an internal `anyhow::Error` to a [`LibrarianError`] by inspecting
/// its source chain for a known error type, the way the teacher's
/// `pipeline.rs` funnels `git2`/`io`/network failures into one fatal-error
/// enum at the command boundary.
fn classify_error(e: anyhow::Error) -> anyhow::Error {
    if e.downcast_ref::<LibrarianError>().is_some() {
        return e;
    }
    if let Some(err) = e.downcast_ref::<GitHubError>() {
        return LibrarianError::GitHub(err.to_string()).into();
    }
    if let Some(err) = e.downcast_ref::<std::io::Error>() {
        return LibrarianError::Io(err.to_string()).into();
    }
    if let Some(err) = e.downcast_ref::<serde_json::Error>() {
        return LibrarianError::State(err.to_string()).into();
    }
    if let Some(err) = e.downcast_ref::<gix::open::Error>() {
        return LibrarianError::Git(err.to_string()).into();
    }
    LibrarianError::Other(format!("{e:#}")).into()
}

fn required_github_token() -> Result<String> {
    std::env::var("LIBRARIAN_GITHUB_TOKEN")
        .context("LIBRARIAN_GITHUB_TOKEN must be set for any command that pushes or calls GitHub")
}

/// Owns the pieces a [`CommandContext`] borrows from, so callers can build
/// one per command invocation without fighting borrow lifetimes.
struct ContextParts {
    repo_dir: PathBuf,
    image: String,
    runner: SubprocessRunner,
    github: Option<GitHubClient>,
    push: bool,
    git_user_name: String,
    git_user_email: String,
    config: state::PipelineConfig,
}

impl ContextParts {
    fn ctx(&self) -> CommandContext<'_> {
        CommandContext {
            repo_dir: self.repo_dir.clone(),
            image: self.image.clone(),
            runner: &self.runner,
            github: self.github.as_ref(),
            push: self.push,
            git_user_name: self.git_user_name.clone(),
            git_user_email: self.git_user_email.clone(),
            config: self.config.clone(),
            secrets: SecretCache::new(),
        }
    }
}

/// Loads `pipeline-config.json`, falling back to an empty config (no
/// env-var descriptors declared) rather than failing the command — a
/// freshly onboarded repo legitimately has no config yet.
fn load_config_or_default(repo_dir: &Path) -> state::PipelineConfig {
    state::load_config(repo_dir).unwrap_or_default()
}

async fn build_context(
    repo_dir: &Path,
    container: &ContainerArgs,
    state: &state::PipelineState,
    needs_github: bool,
) -> Result<ContextParts> {
    let image = workroot::derive_image(container.image.as_deref(), &state.image_tag);
    let github = if needs_github {
        let token = required_github_token()?;
        let repo = git::open(repo_dir)?;
        let (owner, name) = git::github_repo_from_remote(&repo)?;
        Some(GitHubClient::new(owner, name, token))
    } else {
        None
    };
    Ok(ContextParts {
        repo_dir: repo_dir.to_path_buf(),
        image,
        runner: SubprocessRunner::default(),
        github,
        push: container.push,
        git_user_name: container.git_user_name.clone(),
        git_user_email: container.git_user_email.clone(),
        config: load_config_or_default(repo_dir),
    })
}

fn report_batch(batch: &BatchOutcome) {
    match batch {
        BatchOutcome::NothingToDo => info!("nothing to do"),
        BatchOutcome::AllFailed => info!("all libraries failed; no PR created"),
        BatchOutcome::AllSucceeded { .. } => info!("batch succeeded"),
        BatchOutcome::PartialFailure { .. } => info!("batch partially failed; PR marked do-not-merge"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_help_generates() {
        Cli::command().debug_assert();
    }
}
