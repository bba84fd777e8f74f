//! Process Entry & Work Root (spec §2, §4.9): creates the scratch
//! directory, derives the image, and owns the environment-variable result
//! file that downstream steps read from.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub const DEFAULT_ENV_RESULT_FILE: &str = "env-vars.txt";
pub const DEFAULT_REPOSITORY: &str = "us-docker.pkg.dev/librarian/images";

#[derive(Debug, Clone)]
pub struct WorkRoot {
    pub root: PathBuf,
    pub repo_dir: PathBuf,
    pub inputs_dir: PathBuf,
    pub output_dir: PathBuf,
    pub env_result_file: PathBuf,
}

impl WorkRoot {
    /// Creates the scratch directory tree for one command. Temporary work
    /// directories are scoped to one command and owned by that command
    /// (spec §3) — created eagerly, deletion optional.
    pub fn create(root: &Path, env_file_override: Option<&Path>) -> Result<Self> {
        let repo_dir = root.join("repo");
        let inputs_dir = root.join("input");
        let output_dir = root.join("output");
        for dir in [root, &repo_dir, &inputs_dir, &output_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating work-root directory {}", dir.display()))?;
        }
        let env_result_file = env_file_override
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.join(DEFAULT_ENV_RESULT_FILE));
        Ok(Self {
            root: root.to_path_buf(),
            repo_dir,
            inputs_dir,
            output_dir,
            env_result_file,
        })
    }

    /// Appends `NAME=value` to the env-result file. Keys in use:
    /// `_RELEASE_ID`, `_PR_NUMBER`, `_MERGED_RELEASE_COMMIT`.
    pub fn append_env_result(&self, name: &str, value: &str) -> Result<()> {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.env_result_file)
            .with_context(|| format!("opening {}", self.env_result_file.display()))?;
        writeln!(file, "{name}={value}")
            .with_context(|| format!("writing to {}", self.env_result_file.display()))?;
        Ok(())
    }
}

/// Derives the image reference to use: `--image` flag if given, else
/// `LIBRARIAN_REPOSITORY`-prefixed default, else the baked-in default.
pub fn derive_image(image_flag: Option<&str>, state_image_tag: &str) -> String {
    if let Some(image) = image_flag {
        return image.to_string();
    }
    let repository =
        std::env::var("LIBRARIAN_REPOSITORY").unwrap_or_else(|_| DEFAULT_REPOSITORY.to_string());
    if state_image_tag.is_empty() {
        format!("{repository}:latest")
    } else {
        format!("{repository}:{state_image_tag}")
    }
}

/// A per-batch identifier stamped into every release commit message in one
/// invocation of `create-release-pr` (spec GLOSSARY: "Release ID").
pub fn new_release_id(timestamp: &str) -> String {
    format!("release-{timestamp}")
}

/// Formats a release/PR timestamp as `YYYYMMDDTHHMMSS` (spec §4.8). Takes
/// the clock as an injected closure so tests can supply a fixed instant.
pub fn format_timestamp(now_provider: impl Fn() -> jiff::Zoned) -> String {
    now_provider().strftime("%Y%m%dT%H%M%S").to_string()
}

/// Resolves `--repo-root`/`--work-root` flags against a cached lookup of
/// environment variable defaults. Kept free of a global mutable flag
/// record (spec §9 "global state"): callers build one `WorkRootOptions`
/// per command and pass it through.
#[derive(Debug, Clone, Default)]
pub struct WorkRootOptions {
    pub work_root: Option<PathBuf>,
    pub repo_root: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_builds_full_directory_tree() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("work");
        let wr = WorkRoot::create(&root, None).unwrap();
        assert!(wr.repo_dir.is_dir());
        assert!(wr.inputs_dir.is_dir());
        assert!(wr.output_dir.is_dir());
        assert_eq!(wr.env_result_file, root.join(DEFAULT_ENV_RESULT_FILE));
    }

    #[test]
    fn env_file_override_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("work");
        let custom = dir.path().join("custom-env.txt");
        let wr = WorkRoot::create(&root, Some(&custom)).unwrap();
        assert_eq!(wr.env_result_file, custom);
    }

    #[test]
    fn append_env_result_writes_name_equals_value_lines() {
        let dir = tempfile::tempdir().unwrap();
        let wr = WorkRoot::create(&dir.path().join("work"), None).unwrap();
        wr.append_env_result("_RELEASE_ID", "release-20260101T000000")
            .unwrap();
        wr.append_env_result("_PR_NUMBER", "42").unwrap();
        let contents = std::fs::read_to_string(&wr.env_result_file).unwrap();
        assert_eq!(
            contents,
            "_RELEASE_ID=release-20260101T000000\n_PR_NUMBER=42\n"
        );
    }

    #[test]
    fn derive_image_prefers_explicit_flag() {
        assert_eq!(derive_image(Some("gcr.io/x/y:z"), "ignored"), "gcr.io/x/y:z");
    }
}
