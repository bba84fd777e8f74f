//! Shared helpers for command orchestrators: request/response file
//! plumbing around one container invocation.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::container::{ContainerRunner, EnvFileGuard, Mount, NullSecretLookup, SecretCache};
use crate::state::PipelineConfig;

/// Writes `request` as JSON to `<inputs_dir>/<subcommand>-request.json`,
/// invokes the container, and reads back
/// `<inputs_dir>/<subcommand>-response.json`. Mirrors the fixed mount
/// points from spec §4.4: `.librarian/` read-only at `/librarian`, scratch
/// at `/input` and/or `/output`.
pub fn invoke_with_request<Req: Serialize, Resp: DeserializeOwned>(
    runner: &dyn ContainerRunner,
    image: &str,
    subcommand: &str,
    repo_dir: &Path,
    inputs_dir: &Path,
    output_dir: &Path,
    env_file: Option<&Path>,
    request: &Req,
) -> Result<Resp> {
    let request_path = inputs_dir.join(format!("{subcommand}-request.json"));
    let response_path = inputs_dir.join(format!("{subcommand}-response.json"));

    let json = serde_json::to_string_pretty(request)
        .with_context(|| format!("serializing {subcommand} request"))?;
    std::fs::write(&request_path, json)
        .with_context(|| format!("writing {}", request_path.display()))?;

    let librarian_dir = repo_dir.join(".librarian");
    let mounts = vec![
        Mount::new(&librarian_dir, "/librarian", true),
        Mount::new(inputs_dir, "/input", false),
        Mount::new(output_dir, "/output", false),
    ];

    let status = runner.run(image, subcommand, &mounts, &[], env_file)?;
    if status != 0 {
        bail!("container subcommand {subcommand} exited with status {status}");
    }

    let raw = std::fs::read_to_string(&response_path)
        .with_context(|| format!("reading {}", response_path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", response_path.display()))
}

/// Invokes a container subcommand that takes no request/response files and
/// only signals success via exit code (`build`, `integration-test-library`,
/// `clean`, …).
pub fn invoke_exit_only(
    runner: &dyn ContainerRunner,
    image: &str,
    subcommand: &str,
    repo_dir: &Path,
    env_file: Option<&Path>,
) -> Result<()> {
    let mounts = vec![Mount::new(repo_dir, "/repo", false)];
    let status = runner.run(image, subcommand, &mounts, &[], env_file)?;
    if status != 0 {
        bail!("container subcommand {subcommand} exited with status {status}");
    }
    Ok(())
}

/// Like [`invoke_exit_only`], but also mounts `output_dir` at `/output` —
/// for subcommands that produce files there without a request/response pair
/// (`package-library`, spec §4.4: "package files under `/output`").
pub fn invoke_exit_only_with_output(
    runner: &dyn ContainerRunner,
    image: &str,
    subcommand: &str,
    repo_dir: &Path,
    output_dir: &Path,
    env_file: Option<&Path>,
) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;
    let mounts = vec![
        Mount::new(repo_dir, "/repo", false),
        Mount::new(output_dir, "/output", false),
    ];
    let status = runner.run(image, subcommand, &mounts, &[], env_file)?;
    if status != 0 {
        bail!("container subcommand {subcommand} exited with status {status}");
    }
    Ok(())
}

/// Resolves the environment-variable descriptors `config` declares for
/// `subcommand` and writes them to an [`EnvFileGuard`] under
/// `scratch_dir`, so the file is deleted once the guard drops regardless
/// of how the calling step returns (spec §4.4 "environment injection").
/// Returns `None` when `config` declares nothing for `subcommand`, so
/// callers skip passing `--env-file` entirely.
pub fn prepare_env_file(
    config: &PipelineConfig,
    secrets: &SecretCache,
    subcommand: &str,
    scratch_dir: &Path,
) -> Result<Option<EnvFileGuard>> {
    if !config.commands.contains_key(subcommand) {
        return Ok(None);
    }
    std::fs::create_dir_all(scratch_dir)
        .with_context(|| format!("creating {}", scratch_dir.display()))?;
    let resolved = crate::container::resolve_env_for_subcommand(
        config,
        subcommand,
        secrets,
        &NullSecretLookup,
    )?;
    let path = scratch_dir.join(format!("{subcommand}.env"));
    Ok(Some(EnvFileGuard::write(path, &resolved)?))
}
