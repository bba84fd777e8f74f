use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_every_subcommand() {
    let mut cmd = Command::cargo_bin("librarian").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("configure"))
        .stdout(predicate::str::contains("update-apis"))
        .stdout(predicate::str::contains("create-release-pr"))
        .stdout(predicate::str::contains("merge-release-pr"))
        .stdout(predicate::str::contains("create-release-artifacts"))
        .stdout(predicate::str::contains("publish-release-artifacts"))
        .stdout(predicate::str::contains("update-image-tag"))
        .stdout(predicate::str::contains("completions"));
}

#[test]
fn configure_without_api_path_or_api_root_fails_clearly() {
    let dir = assert_fs::TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("librarian").unwrap();
    cmd.arg("--repo-root")
        .arg(dir.path())
        .arg("configure");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--api-root to auto-discover"));
}

#[test]
fn completions_for_bash_emits_a_script() {
    let mut cmd = Command::cargo_bin("librarian").unwrap();
    cmd.arg("completions").arg("bash");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("librarian"));
}
