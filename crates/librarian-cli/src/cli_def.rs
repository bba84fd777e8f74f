use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "librarian",
    version,
    about = "Generate, build, and release client libraries from API definitions."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Language repository to operate on (defaults to the current directory).
    #[arg(long, global = true, env = "LIBRARIAN_REPO_ROOT")]
    pub repo_root: Option<String>,

    /// Scratch directory for container inputs/outputs and the env-result file.
    #[arg(long, global = true)]
    pub work_root: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv).
    #[arg(short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Args, Debug, Clone)]
pub struct ContainerArgs {
    /// Container image to invoke (flag > LIBRARIAN_REPOSITORY env > default).
    #[arg(long)]
    pub image: Option<String>,
    /// Push the resulting commit(s) and open a pull request.
    #[arg(long)]
    pub push: bool,
    #[arg(long, default_value = "librarian-bot")]
    pub git_user_name: String,
    #[arg(long, default_value = "librarian-bot@users.noreply.github.com")]
    pub git_user_email: String,
    /// Append `NAME=value` results here instead of `<work-root>/env-vars.txt`.
    #[arg(long)]
    pub env_file: Option<String>,
    /// Secret Manager project used to resolve env-var descriptors without a default value.
    #[arg(long)]
    pub secrets_project: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Onboard new API paths as libraries.
    Configure {
        #[arg(long)]
        api_path: Vec<String>,
        #[arg(long)]
        api_root: Option<String>,
        #[arg(long)]
        language: Option<String>,
        #[command(flatten)]
        container: ContainerArgs,
    },
    /// Invoke the container's `generate` step for a single library.
    Generate {
        #[arg(long)]
        library_id: String,
        #[command(flatten)]
        container: ContainerArgs,
    },
    /// Regenerate libraries whose API sources moved since the last generation.
    UpdateApis {
        #[arg(long)]
        library_id: Option<String>,
        #[arg(long)]
        api_root: Option<String>,
        #[command(flatten)]
        container: ContainerArgs,
    },
    /// Plan and open the batched release pull request.
    CreateReleasePr {
        #[arg(long)]
        release_id: Option<String>,
        #[arg(long)]
        skip_build: bool,
        #[arg(long)]
        skip_integration_tests: bool,
        #[command(flatten)]
        container: ContainerArgs,
    },
    /// Legacy alias of `create-release-pr`.
    Release {
        #[arg(long)]
        release_id: Option<String>,
        #[arg(long)]
        skip_build: bool,
        #[arg(long)]
        skip_integration_tests: bool,
        #[command(flatten)]
        container: ContainerArgs,
    },
    /// Verify and merge a previously opened release pull request.
    MergeReleasePr {
        #[arg(long)]
        release_pr_url: String,
        #[arg(long)]
        baseline_commit: String,
        #[arg(long)]
        env_file: Option<String>,
    },
    /// Build, test, and package every release in a release commit chain.
    CreateReleaseArtifacts {
        #[arg(long)]
        release_id: String,
        #[arg(long)]
        repo_url: Option<String>,
        #[arg(long)]
        artifact_root: String,
        #[command(flatten)]
        container: ContainerArgs,
    },
    /// Publish previously built release artifacts and create GitHub releases.
    PublishReleaseArtifacts {
        #[arg(long)]
        artifact_root: String,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        tag_repo_url: Option<String>,
        #[command(flatten)]
        container: ContainerArgs,
    },
    /// Regenerate every library under a new container image tag.
    UpdateImageTag {
        #[arg(long)]
        new_image_tag: String,
        #[command(flatten)]
        container: ContainerArgs,
    },
    /// Print shell completions.
    Completions(Completions),
}

#[derive(Args, Debug)]
pub struct Completions {
    /// The shell to generate completions for.
    #[arg(value_enum)]
    pub shell: crate::shells::Shell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_help_generates() {
        Cli::command().debug_assert();
    }
}
