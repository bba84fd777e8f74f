//! Release Planner (spec §4.6): per library, finds commits since the last
//! release tag, classifies them, decides release-worthiness, computes the
//! next version, and produces release notes.

use crate::conventional::{ConventionalCommit, ParseOutcome, parse_commit_message};
use crate::git::{RawCommit, format_release_tag};
use crate::semver_engine::{ChangeLevel, Version};
use crate::state::LibraryState;

#[derive(Debug, Clone)]
pub struct ReleasePlan {
    pub library_id: String,
    pub release_version: String,
    pub release_notes: String,
    pub commits: Vec<ConventionalCommit>,
}

/// A commit's `ChangeLevel` contribution, independent of any one library.
fn change_level_of(commit: &ConventionalCommit) -> ChangeLevel {
    if commit.is_breaking {
        return ChangeLevel::Major;
    }
    match commit.r#type.as_str() {
        "feat" => ChangeLevel::Minor,
        "fix" | "perf" => ChangeLevel::Patch,
        _ => ChangeLevel::None,
    }
}

/// A commit contributes to `library_id` iff it has no scope, or its scope
/// equals the library ID (spec §9 open question: no-scope commits are
/// applied to every library, matching the source this was distilled from).
fn contributes_to(commit: &ConventionalCommit, library_id: &str) -> bool {
    match &commit.scope {
        None => true,
        Some(scope) => scope == library_id,
    }
}

/// Parses raw commits, keeping only the ones conventional and applicable to
/// `library_id`. Non-conventional commits are silently skipped, per spec
/// §4.1/§4.6 — they are not errors and contribute `None` to ChangeLevel.
pub fn classify_commits(raw_commits: &[RawCommit], library_id: &str) -> Vec<ConventionalCommit> {
    raw_commits
        .iter()
        .filter_map(|raw| match parse_commit_message(&raw.message(), &raw.id) {
            Ok(ParseOutcome::Conventional(c)) => Some(c),
            Ok(ParseOutcome::Plain) | Err(_) => None,
        })
        .filter(|c| contributes_to(c, library_id))
        .collect()
}

pub fn highest_change(commits: &[ConventionalCommit]) -> ChangeLevel {
    commits
        .iter()
        .map(change_level_of)
        .fold(ChangeLevel::None, ChangeLevel::max)
}

pub fn is_release_worthy(commits: &[ConventionalCommit]) -> bool {
    highest_change(commits) > ChangeLevel::None
}

/// Grouped "New features" / "Bug fixes" / "Documentation improvements"
/// sections; empty sections omitted; if every section is empty, the
/// literal "No specific release notes."
pub fn render_release_notes(commits: &[ConventionalCommit]) -> String {
    let section = |label: &str, r#type: &str| -> Option<String> {
        let lines: Vec<String> = commits
            .iter()
            .filter(|c| c.r#type == r#type)
            .map(|c| format!("- {}", c.description))
            .collect();
        if lines.is_empty() {
            None
        } else {
            Some(format!("## {label}\n\n{}", lines.join("\n")))
        }
    };

    let sections: Vec<String> = [
        section("New features", "feat"),
        section("Bug fixes", "fix"),
        section("Documentation improvements", "docs"),
    ]
    .into_iter()
    .flatten()
    .collect();

    if sections.is_empty() {
        "No specific release notes.".to_string()
    } else {
        sections.join("\n\n")
    }
}

/// Runs steps 1-10 of the release planner for a single library: tag
/// formatting, release-worthiness, next-version computation, and release
/// notes. Commit scanning (step 4) and container/git mutation (steps
/// 11-13) are the caller's responsibility (they need the repo and the
/// container runner), kept out of this pure-decision module.
pub fn plan_release(library: &LibraryState, raw_commits: &[RawCommit]) -> Option<ReleasePlan> {
    let commits = classify_commits(raw_commits, &library.id);
    if !is_release_worthy(&commits) {
        return None;
    }

    let release_version = match &library.next_version {
        Some(v) if !v.is_empty() => v.clone(),
        _ => {
            let current = if library.current_version.is_empty() {
                Version {
                    major: 0,
                    minor: 0,
                    patch: 0,
                    prerelease: None,
                }
            } else {
                Version::parse(&library.current_version)?
            };
            current.derive_next(highest_change(&commits)).to_string()
        }
    };

    Some(ReleasePlan {
        library_id: library.id.clone(),
        release_version,
        release_notes: render_release_notes(&commits),
        commits,
    })
}

pub fn previous_release_tag(library: &LibraryState) -> String {
    if library.current_version.is_empty() {
        String::new()
    } else {
        format_release_tag(&library.id, &library.current_version)
    }
}

/// Release commit message (spec §4.6 step 13).
pub fn release_commit_message(plan: &ReleasePlan, release_id: &str) -> String {
    format!(
        "chore: Release library {} version {}\n{}\n\nLibrarian-Release-Library: {}\nLibrarian-Release-Version: {}\nLibrarian-Release-ID: {}\n",
        plan.library_id, plan.release_version, plan.release_notes,
        plan.library_id, plan.release_version, release_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AutomationLevel;

    fn library(id: &str, current_version: &str) -> LibraryState {
        LibraryState {
            id: id.to_string(),
            current_version: current_version.to_string(),
            next_version: None,
            last_generated_commit: String::new(),
            last_released_commit: String::new(),
            release_timestamp: None,
            api_paths: vec![],
            source_paths: vec![],
            release_automation_level: AutomationLevel::Automatic,
            generation_automation_level: AutomationLevel::Automatic,
        }
    }

    fn raw(message: &str, sha: &str) -> RawCommit {
        let mut lines = message.splitn(2, "\n\n");
        let summary = lines.next().unwrap_or("").to_string();
        let body = lines.next().unwrap_or("").to_string();
        RawCommit {
            id: sha.into(),
            short_id: sha.into(),
            summary: summary.into(),
            body: body.into(),
            author_name: "Tester".into(),
            author_email: "t@example.com".into(),
            timestamp: 0,
        }
    }

    #[test]
    fn docs_only_commits_are_not_release_worthy() {
        let commits = vec![raw("docs: update readme", "a")];
        let classified = classify_commits(&commits, "example");
        assert!(!is_release_worthy(&classified));
    }

    #[test]
    fn breaking_change_forces_major_bump_post_1_0() {
        let commits = vec![raw("feat!: drop legacy support", "a")];
        let lib = library("example", "1.2.3");
        let plan = plan_release(&lib, &commits).unwrap();
        assert_eq!(plan.release_version, "2.0.0");
    }

    #[test]
    fn breaking_change_pre_1_0_promotes_to_1_0_0() {
        let commits = vec![raw("feat!: drop legacy support", "a")];
        let lib = library("example", "0.4.0");
        let plan = plan_release(&lib, &commits).unwrap();
        assert_eq!(plan.release_version, "1.0.0");
    }

    #[test]
    fn prerelease_digit_width_preserved_on_any_non_none_change() {
        let commits = vec![raw("fix: patch something", "a")];
        let lib = library("example", "1.2.3-beta01");
        let plan = plan_release(&lib, &commits).unwrap();
        assert_eq!(plan.release_version, "1.2.3-beta02");

        let lib = library("example", "1.2.3-alpha99");
        let plan = plan_release(&lib, &commits).unwrap();
        assert_eq!(plan.release_version, "1.2.3-alpha100");
    }

    #[test]
    fn feat_only_pre_1_0_bumps_patch() {
        let commits = vec![raw("feat: add widget", "a")];
        let lib = library("example", "0.2.3");
        let plan = plan_release(&lib, &commits).unwrap();
        assert_eq!(plan.release_version, "0.2.4");
    }

    #[test]
    fn unscoped_commit_applies_to_every_library() {
        let commits = vec![raw("feat: shared change", "a")];
        assert!(is_release_worthy(&classify_commits(&commits, "lib-a")));
        assert!(is_release_worthy(&classify_commits(&commits, "lib-b")));
    }

    #[test]
    fn scoped_commit_applies_only_to_matching_library() {
        let commits = vec![raw("feat(lib-a): add widget", "a")];
        assert!(is_release_worthy(&classify_commits(&commits, "lib-a")));
        assert!(!is_release_worthy(&classify_commits(&commits, "lib-b")));
    }

    #[test]
    fn empty_sections_are_omitted_and_all_empty_falls_back() {
        let notes = render_release_notes(&[]);
        assert_eq!(notes, "No specific release notes.");
    }

    #[test]
    fn release_commit_message_carries_release_id_markers() {
        let commits = vec![raw("feat: add widget", "a")];
        let lib = library("example", "1.0.0");
        let plan = plan_release(&lib, &commits).unwrap();
        let message = release_commit_message(&plan, "release-20260101T000000");
        assert!(message.contains("Librarian-Release-ID: release-20260101T000000"));
        assert!(message.contains("Librarian-Release-Library: example"));
    }
}
