//! Git Repository Facade (spec §4.5).
//!
//! Read-side queries (tag scan, commit walk, status, dirty check) go
//! through `gix`, mirroring the changelog engine this crate is built from.
//! Working-tree mutations that engine never needed — clone, checkout,
//! hard reset, push — shell out to the system `git` binary, the same way
//! the container layer shells out to the OCI runtime: a narrow, stubbable
//! subprocess boundary rather than a partial from-scratch reimplementation
//! of porcelain gix does not yet expose.

use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, anyhow, bail};
use ecow::{EcoString, EcoVec};
use gix::Repository;

#[derive(Debug, Clone)]
pub struct RawCommit {
    pub id: EcoString,
    pub short_id: EcoString,
    pub summary: EcoString,
    pub body: EcoString,
    pub author_name: EcoString,
    pub author_email: EcoString,
    pub timestamp: i64,
}

impl RawCommit {
    pub fn message(&self) -> String {
        if self.body.is_empty() {
            self.summary.to_string()
        } else {
            format!("{}\n\n{}", self.summary, self.body)
        }
    }
}

pub fn open(dir: &Path) -> Result<Repository> {
    gix::discover(dir).map_err(anyhow::Error::from)
}

/// `CloneOrOpen`: open if `dir` already holds a repository, else clone
/// (with submodules) from `url`.
pub fn clone_or_open(dir: &Path, url: &str) -> Result<Repository> {
    if dir.join(".git").exists() {
        return open(dir);
    }
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    run_git(dir.parent().unwrap_or(Path::new(".")), &[
        "clone",
        "--recurse-submodules",
        url,
        &dir.to_string_lossy(),
    ])?;
    open(dir)
}

fn run_git(cwd: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .current_dir(cwd)
        .args(args)
        .output()
        .with_context(|| format!("spawning git {args:?}"))?;
    if !output.status.success() {
        bail!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

pub fn is_clean(repo: &Repository) -> Result<bool> {
    Ok(!is_dirty(repo)?)
}

pub fn is_dirty(repo: &Repository) -> Result<bool> {
    let status_platform = repo.status(gix::progress::Discard)?;
    let status_iter = status_platform.into_iter(None)?;
    for status_item in status_iter {
        let item = status_item?;
        if matches!(item, gix::status::Item::IndexWorktree(_)) {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn add_all(repo_dir: &Path) -> Result<()> {
    run_git(repo_dir, &["add", "-A"]).map(|_| ())
}

/// `Commit(msg, name, email)` — fails if the working tree is clean.
pub fn commit(repo_dir: &Path, message: &str, name: &str, email: &str) -> Result<String> {
    let repo = open(repo_dir)?;
    if is_clean(&repo)? {
        bail!("working tree is clean; nothing to commit");
    }
    add_all(repo_dir)?;
    run_git(
        repo_dir,
        &["-c", &format!("user.name={name}"), "-c", &format!("user.email={email}"), "commit", "-m", message],
    )?;
    head_hash(&open(repo_dir)?)
}

pub fn head_hash(repo: &Repository) -> Result<String> {
    Ok(repo.head_id().map_err(anyhow::Error::from)?.to_string())
}

pub fn checkout(repo_dir: &Path, sha: &str) -> Result<()> {
    run_git(repo_dir, &["checkout", "--detach", sha]).map(|_| ())
}

/// Hard reset plus untracked removal.
pub fn clean_working_tree(repo_dir: &Path) -> Result<()> {
    run_git(repo_dir, &["reset", "--hard"])?;
    run_git(repo_dir, &["clean", "-fdx"])?;
    Ok(())
}

/// Reset to `HEAD^` and clean. Fails if HEAD has more than one parent.
pub fn clean_and_revert_head_commit(repo_dir: &Path) -> Result<()> {
    let repo = open(repo_dir)?;
    let head = repo.head_commit().map_err(anyhow::Error::from)?;
    let parent_count = head.parent_ids().count();
    if parent_count > 1 {
        bail!("HEAD has {parent_count} parents; refusing to revert a merge commit");
    }
    run_git(repo_dir, &["reset", "--hard", "HEAD^"])?;
    clean_working_tree(repo_dir)
}

pub fn push_branch(repo_dir: &Path, branch: &str, remote_url: &str, token: &str) -> Result<()> {
    let authed_url = inject_token(remote_url, token)?;
    run_git(
        repo_dir,
        &["push", &authed_url, &format!("HEAD:refs/heads/{branch}")],
    )
    .map(|_| ())
}

fn inject_token(url: &str, token: &str) -> Result<String> {
    let rest = url
        .strip_prefix("https://")
        .ok_or_else(|| anyhow!("remote url is not https: {url}"))?;
    Ok(format!("https://x-access-token:{token}@{rest}"))
}

/// Requires exactly one remote whose first URL starts with
/// `https://github.com/`; returns `(owner, name)` parsed from it.
pub fn github_repo_from_remote(repo: &Repository) -> Result<(String, String)> {
    let remote_names: Vec<_> = repo.remote_names().into_iter().collect();
    if remote_names.len() != 1 {
        bail!(
            "expected exactly one git remote, found {}",
            remote_names.len()
        );
    }
    let remote = repo
        .find_remote(remote_names[0].as_ref())
        .map_err(anyhow::Error::from)?;
    let url = remote
        .url(gix::remote::Direction::Fetch)
        .ok_or_else(|| anyhow!("remote has no fetch URL"))?
        .to_bstring()
        .to_string();
    if !url.starts_with("https://github.com/") {
        bail!("remote URL does not start with https://github.com/: {url}");
    }
    crate::repository::parse_github_owner_name(&url)
}

fn to_raw_commit(commit: &gix::Commit) -> Result<RawCommit> {
    let id = commit.id().to_string();
    let short_id = id[..id.len().min(7)].to_string();
    let message_bstr = commit
        .message_raw()
        .map_err(|e| anyhow!("missing commit message: {e}"))?;
    let message = String::from_utf8_lossy(message_bstr).to_string();
    let mut lines = message.lines();
    let summary = lines.next().unwrap_or("").to_string();
    let body = lines.collect::<Vec<_>>().join("\n");
    let author = commit
        .author()
        .map_err(|e| anyhow!("missing author: {e}"))?;
    let author_name = String::from_utf8_lossy(author.name).to_string();
    let author_email = String::from_utf8_lossy(author.email).to_string();
    let timestamp = commit.time().map(|t| t.seconds).unwrap_or(0);
    Ok(RawCommit {
        id: id.into(),
        short_id: short_id.into(),
        summary: summary.into(),
        body: body.into(),
        author_name: author_name.into(),
        author_email: author_email.into(),
        timestamp,
    })
}

/// Does the tree entry at `path` in `commit` differ from the same path in
/// `parent`? Comparing tree-entry hashes (not full diffs) is what makes
/// this tractable on large histories (spec §9).
fn path_changed(commit: &gix::Commit, parent: Option<&gix::Commit>, path: &str) -> Result<bool> {
    let this_id = lookup_path_id(commit, path)?;
    let parent_id = match parent {
        Some(p) => lookup_path_id(p, path)?,
        None => None,
    };
    Ok(this_id != parent_id)
}

fn lookup_path_id(commit: &gix::Commit, path: &str) -> Result<Option<gix::ObjectId>> {
    let tree = commit.tree().map_err(anyhow::Error::from)?;
    match tree.lookup_entry_by_path(path).map_err(anyhow::Error::from)? {
        Some(entry) => Ok(Some(entry.object_id())),
        None => Ok(None),
    }
}

/// `GetCommitsForPathsSinceCommit`: walks history in committer-time order
/// from HEAD. A commit is included iff, for any of `paths`, its tree-entry
/// hash differs from its single parent's. Merge commits are skipped.
/// Stops (exclusive) at `since_sha`; if non-empty and never reached, errors.
/// Empty `paths` is an error.
pub fn commits_for_paths_since_commit(
    repo: &Repository,
    paths: &[String],
    since_sha: &str,
) -> Result<EcoVec<RawCommit>> {
    if paths.is_empty() {
        bail!("GetCommitsForPathsSinceCommit requires at least one path");
    }

    let head_id = repo.head_id().map_err(anyhow::Error::from)?.detach();
    let mut out = EcoVec::new();
    let mut found_since = since_sha.is_empty();

    for info in repo.rev_walk([head_id]).all()? {
        let commit_id = info?.id;
        let commit = repo.find_commit(commit_id)?;

        if !since_sha.is_empty() && commit_id.to_string() == since_sha {
            found_since = true;
            break;
        }

        let parents: Vec<_> = commit.parent_ids().collect();
        if parents.len() > 1 {
            continue;
        }
        let parent_commit = match parents.first() {
            Some(p) => Some(repo.find_commit(*p)?),
            None => None,
        };

        let mut matched = false;
        for path in paths {
            if path_changed(&commit, parent_commit.as_ref(), path)? {
                matched = true;
                break;
            }
        }
        if matched {
            out.push(to_raw_commit(&commit)?);
        }
    }

    if !since_sha.is_empty() && !found_since {
        bail!("since commit {since_sha} was not found in history from HEAD");
    }

    Ok(out)
}

/// `GetCommitsForPathsSinceTag`: resolves `tag` to a commit hash, then
/// delegates. Empty `tag` means "from repo start".
pub fn commits_for_paths_since_tag(
    repo: &Repository,
    paths: &[String],
    tag: &str,
) -> Result<EcoVec<RawCommit>> {
    let since_sha = if tag.is_empty() {
        String::new()
    } else {
        let tag_ref = format!("refs/tags/{tag}");
        let obj = repo
            .rev_parse_single(tag_ref.as_str())
            .map_err(anyhow::Error::from)?;
        obj.object()?
            .peel_to_kind(gix::object::Kind::Commit)?
            .id
            .to_string()
    };
    commits_for_paths_since_commit(repo, paths, &since_sha)
}

/// `GetCommitsForReleaseID`: walks linearly from HEAD via single-parent
/// links, collecting commits whose message contains a line
/// `Librarian-Release-ID: <releaseID>`. Stops at the first non-matching
/// commit. Errors if a collected commit has != 1 parent, or none matched.
/// Returns results in forward-chronological order.
pub fn commits_for_release_id(repo: &Repository, release_id: &str) -> Result<EcoVec<RawCommit>> {
    let marker = format!("Librarian-Release-ID: {release_id}");
    let head_id = repo.head_id().map_err(anyhow::Error::from)?.detach();
    let mut current = Some(head_id);
    let mut collected: Vec<RawCommit> = Vec::new();

    while let Some(id) = current {
        let commit = repo.find_commit(id)?;
        let message_bstr = commit
            .message_raw()
            .map_err(|e| anyhow!("missing commit message: {e}"))?;
        let message = String::from_utf8_lossy(message_bstr);
        if !message.lines().any(|line| line == marker) {
            break;
        }

        let parents: Vec<_> = commit.parent_ids().collect();
        if parents.len() != 1 {
            bail!(
                "commit {} for release {release_id} has {} parents, expected 1",
                id,
                parents.len()
            );
        }

        collected.push(to_raw_commit(&commit)?);
        current = Some(parents[0]);
    }

    if collected.is_empty() {
        bail!("no commits found for release ID {release_id}");
    }

    collected.reverse();
    Ok(collected.into_iter().collect())
}

/// `formatReleaseTag` — the single authority for the release-tag format;
/// both tag creation and "commits since last tag" must call this.
pub fn format_release_tag(library_id: &str, version: &str) -> String {
    format!("{library_id}-v{version}")
}

pub fn create_tag(repo: &mut Repository, name: &str, message: &str, annotated: bool) -> Result<gix::ObjectId> {
    let head_commit_id = repo.head_id().map_err(anyhow::Error::from)?.detach();
    if annotated {
        let sig_ref = repo
            .committer_or_set_generic_fallback()
            .map_err(anyhow::Error::from)?;
        let sig = sig_ref.to_owned().map_err(anyhow::Error::from)?;
        let mut time_buf = gix::date::parse::TimeBuf::default();
        let sig_ref_borrowed = sig.to_ref(&mut time_buf);
        let tag_ref = repo
            .tag(
                name,
                head_commit_id,
                gix::object::Kind::Commit,
                Some(sig_ref_borrowed),
                message,
                gix::refs::transaction::PreviousValue::MustNotExist,
            )
            .map_err(anyhow::Error::from)?;
        Ok(tag_ref.target().id().to_owned())
    } else {
        let tag_ref = repo
            .tag_reference(
                name,
                head_commit_id,
                gix::refs::transaction::PreviousValue::MustNotExist,
            )
            .map_err(anyhow::Error::from)?;
        Ok(tag_ref.target().id().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_test_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        run_git(dir.path(), &["init"]).unwrap();
        run_git(dir.path(), &["config", "user.name", "Tester"]).unwrap();
        run_git(dir.path(), &["config", "user.email", "tester@example.com"]).unwrap();
        let repo = open(dir.path()).unwrap();
        (dir, repo)
    }

    fn write_and_commit(dir: &Path, path: &str, contents: &str, message: &str) -> String {
        let full = dir.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, contents).unwrap();
        commit(dir, message, "Tester", "tester@example.com").unwrap()
    }

    #[test]
    fn format_release_tag_is_consistent() {
        assert_eq!(format_release_tag("example", "1.2.3"), "example-v1.2.3");
    }

    #[test]
    fn commits_for_paths_since_commit_requires_nonempty_paths() {
        let (dir, repo) = init_test_repo();
        let _ = &dir;
        assert!(commits_for_paths_since_commit(&repo, &[], "").is_err());
    }

    #[test]
    fn commits_since_empty_sha_returns_all_matching_commits() {
        let (dir, _repo) = init_test_repo();
        write_and_commit(dir.path(), "a.txt", "1", "feat: a");
        write_and_commit(dir.path(), "b.txt", "1", "feat: b");
        let repo = open(dir.path()).unwrap();
        let commits = commits_for_paths_since_commit(
            &repo,
            &["a.txt".to_string(), "b.txt".to_string()],
            "",
        )
        .unwrap();
        assert_eq!(commits.len(), 2);
    }

    #[test]
    fn nonexistent_since_sha_is_an_error() {
        let (dir, _repo) = init_test_repo();
        write_and_commit(dir.path(), "a.txt", "1", "feat: a");
        let repo = open(dir.path()).unwrap();
        let result = commits_for_paths_since_commit(
            &repo,
            &["a.txt".to_string()],
            "0000000000000000000000000000000000000000",
        );
        assert!(result.is_err());
    }
}
