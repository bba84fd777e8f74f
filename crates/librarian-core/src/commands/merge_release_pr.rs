//! `merge-release-pr` (spec §4.7): given a PR URL and a baseline commit,
//! verify no suspect releases, then merge via rebase.

use std::path::Path;

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::git;
use crate::github::GitHubClient;
use crate::pr_authoring::DO_NOT_MERGE_LABEL;
use crate::state::{self, PipelineState};

pub struct MergeReleasePrOptions {
    pub pr_number: u64,
    pub pr_head_ref: String,
    pub baseline_commit: String,
}

pub struct SuspectRelease {
    pub library_id: String,
    pub reason: String,
}

pub struct MergeReleasePrResult {
    pub merged: bool,
    pub merged_commit: Option<String>,
    pub suspects: Vec<SuspectRelease>,
}

/// Verifies every release commit on the PR branch, then either merges or
/// posts a comment and refuses. `repo_dir` is expected to be checked out at
/// the PR head, so the source-path scan (spec §4.7 step 2 / Scenario #5)
/// can walk its history back to `baseline_commit`.
#[instrument(skip(github, options))]
pub async fn run_merge_release_pr(
    github: &GitHubClient,
    repo_dir: &Path,
    options: &MergeReleasePrOptions,
) -> Result<MergeReleasePrResult> {
    let head_raw = github
        .get_raw_content(&options.pr_head_ref, state::STATE_PATH)
        .await?;
    let baseline_raw = github
        .get_raw_content(&options.baseline_commit, state::STATE_PATH)
        .await?;

    let head_state: PipelineState = serde_json::from_str(&head_raw)?;
    let baseline_state: PipelineState = serde_json::from_str(&baseline_raw)?;

    let repo = git::open(repo_dir)?;
    let mut suspects = Vec::new();
    for head_library in &head_state.libraries {
        let Some(baseline_library) = baseline_state.library(&head_library.id) else {
            suspects.push(SuspectRelease {
                library_id: head_library.id.clone(),
                reason: "library no longer exists on the base branch".to_string(),
            });
            continue;
        };

        let head_json = serde_json::to_string(head_library)?;
        let baseline_json = serde_json::to_string(baseline_library)?;
        if head_json != baseline_json {
            suspects.push(SuspectRelease {
                library_id: head_library.id.clone(),
                reason: "library state differs from the baseline commit".to_string(),
            });
            continue;
        }

        // The state snapshot can be byte-identical even when a commit since
        // the baseline edited the library's own source files, so scan the
        // library's source paths directly rather than trusting the diff
        // above alone.
        let mut paths = head_state.common_library_source_paths.clone();
        paths.extend(head_library.source_paths.clone());
        let touching_commits =
            git::commits_for_paths_since_commit(&repo, &paths, &options.baseline_commit)?;
        if !touching_commits.is_empty() {
            suspects.push(SuspectRelease {
                library_id: head_library.id.clone(),
                reason: "source paths changed since the baseline commit".to_string(),
            });
        }
    }

    if !suspects.is_empty() {
        let comment = format!(
            "Suspected-changed libraries:\n{}",
            suspects
                .iter()
                .map(|s| format!("- {}: {}", s.library_id, s.reason))
                .collect::<Vec<_>>()
                .join("\n")
        );
        github.add_comment(options.pr_number, &comment).await?;
        warn!(pr = options.pr_number, "refusing to merge: suspected-changed libraries");
        return Ok(MergeReleasePrResult {
            merged: false,
            merged_commit: None,
            suspects,
        });
    }

    github
        .remove_label(options.pr_number, DO_NOT_MERGE_LABEL)
        .await?;
    github.merge_pr_rebase(options.pr_number).await?;
    let merged_pr = github.get_pr(options.pr_number).await?;

    info!(pr = options.pr_number, sha = %merged_pr.head_sha, "merged release PR");
    Ok(MergeReleasePrResult {
        merged: true,
        merged_commit: Some(merged_pr.head_sha),
        suspects: Vec::new(),
    })
}
