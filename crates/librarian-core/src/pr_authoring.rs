//! Pull-Request Authoring (spec §4.8): aggregates per-library successes and
//! errors into a PR title+body with a deterministic policy.

/// A single item an orchestrator reports on completion of one library/API.
#[derive(Debug, Clone)]
pub struct LibraryOutcome {
    pub library_id: String,
    pub description: String,
}

/// A per-item failure (spec §7): never aborts the batch, always recorded.
#[derive(Debug, Clone)]
pub struct LibraryError {
    pub library_id: String,
    pub message: String,
}

/// The four-state outcome table from spec §4.7.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// 0 successes, 0 errors: no PR, exit 0.
    NothingToDo,
    /// 0 successes, >0 errors: no PR, exit non-zero.
    AllFailed,
    /// >0 successes, 0 errors: plain PR body, exit 0.
    AllSucceeded { body: String },
    /// >0 successes, >0 errors: split body, `do-not-merge` label, exit 0.
    PartialFailure { body: String },
}

pub fn classify_batch(
    successes: &[LibraryOutcome],
    errors: &[LibraryError],
) -> BatchOutcome {
    match (successes.is_empty(), errors.is_empty()) {
        (true, true) => BatchOutcome::NothingToDo,
        (true, false) => BatchOutcome::AllFailed,
        (false, true) => BatchOutcome::AllSucceeded {
            body: plain_body(successes),
        },
        (false, false) => BatchOutcome::PartialFailure {
            body: split_body(successes, errors),
        },
    }
}

fn plain_body(successes: &[LibraryOutcome]) -> String {
    successes
        .iter()
        .map(|s| format!("- {}", s.description))
        .collect::<Vec<_>>()
        .join("\n")
}

fn split_body(successes: &[LibraryOutcome], errors: &[LibraryError]) -> String {
    let mut body = String::new();
    body.push_str("Errors:\n");
    for e in errors {
        body.push_str(&format!("- {}: {}\n", e.library_id, e.message));
    }
    body.push_str("\nChanges Included:\n");
    for s in successes {
        body.push_str(&format!("- {}\n", s.description));
    }
    body
}

pub const DO_NOT_MERGE_LABEL: &str = "do-not-merge";

/// Branch name: `librarian-<type>-<timestamp>`, timestamp `YYYYMMDDTHHMMSS`.
pub fn branch_name(command_type: &str, timestamp: &str) -> String {
    format!("librarian-{command_type}-{timestamp}")
}

/// Title: `<prefix>: <timestamp>`.
pub fn pr_title(prefix: &str, timestamp: &str) -> String {
    format!("{prefix}: {timestamp}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_to_do_when_both_empty() {
        assert_eq!(classify_batch(&[], &[]), BatchOutcome::NothingToDo);
    }

    #[test]
    fn all_failed_when_only_errors() {
        let errors = vec![LibraryError {
            library_id: "a".to_string(),
            message: "boom".to_string(),
        }];
        assert_eq!(classify_batch(&[], &errors), BatchOutcome::AllFailed);
    }

    #[test]
    fn all_succeeded_produces_plain_body() {
        let successes = vec![LibraryOutcome {
            library_id: "a".to_string(),
            description: "Released a 1.0.0".to_string(),
        }];
        match classify_batch(&successes, &[]) {
            BatchOutcome::AllSucceeded { body } => {
                assert_eq!(body, "- Released a 1.0.0");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn partial_failure_splits_errors_and_changes() {
        let successes = vec![LibraryOutcome {
            library_id: "a".to_string(),
            description: "Released a 1.0.0".to_string(),
        }];
        let errors = vec![LibraryError {
            library_id: "b".to_string(),
            message: "build failed".to_string(),
        }];
        match classify_batch(&successes, &errors) {
            BatchOutcome::PartialFailure { body } => {
                assert!(body.contains("Errors:\n- b: build failed"));
                assert!(body.contains("Changes Included:\n- Released a 1.0.0"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn branch_and_title_format() {
        assert_eq!(
            branch_name("release", "20260130T120000"),
            "librarian-release-20260130T120000"
        );
        assert_eq!(
            pr_title("feat: API configuration", "20260130T120000"),
            "feat: API configuration: 20260130T120000"
        );
    }
}
