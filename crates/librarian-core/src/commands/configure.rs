//! `configure` (spec §4.7): for each API path to configure — explicitly
//! named, or discovered by scanning service-config YAMLs under the API
//! root — invoke the container `configure` subcommand, verify a new or
//! ignored library exists, and — if new — commit the configuration then
//! run `generate → clean → build`. Any container failure rolls back the
//! configuration commit and records the error.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::contract::{ConfigureRequest, ConfigureResponse, GenerateRequest, GenerateResponse};
use crate::pr_authoring::{LibraryError, LibraryOutcome};
use crate::state::PipelineState;

use super::support::{invoke_exit_only, invoke_with_request, prepare_env_file};
use super::{CommandContext, OrchestratorResult, finish_batch, open_pr_for_batch};

#[instrument(skip(ctx, state))]
pub async fn run_configure(
    ctx: &CommandContext<'_>,
    state: &mut PipelineState,
    api_paths: &[String],
    timestamp: &str,
) -> Result<OrchestratorResult> {
    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for api_path in api_paths {
        match configure_one(ctx, state, api_path) {
            Ok(Some(library_id)) => {
                info!(api_path = %api_path, library = %library_id, "configured");
                successes.push(LibraryOutcome {
                    library_id,
                    description: format!("Configured library for API {api_path}"),
                });
            }
            Ok(None) => {
                // Already generated or ignored: nothing to report.
            }
            Err(e) => {
                warn!(api_path = %api_path, error = %e, "configure failed");
                let _ = crate::git::clean_and_revert_head_commit(&ctx.repo_dir);
                errors.push(LibraryError {
                    library_id: api_path.clone(),
                    message: e.to_string(),
                });
            }
        }
    }

    let (exit, batch) = finish_batch(successes, errors);
    let pr_number = open_pr_for_batch(ctx, "configure", "feat: configure libraries", timestamp, &batch).await?;
    Ok(OrchestratorResult {
        exit,
        pr_number,
        batch,
    })
}

/// Returns `Ok(Some(library_id))` when a new library was configured and
/// committed, `Ok(None)` when the API path was already generated or
/// ignored (nothing to do).
fn configure_one(
    ctx: &CommandContext<'_>,
    state: &mut PipelineState,
    api_path: &str,
) -> Result<Option<String>> {
    if state.ignored_api_paths.iter().any(|p| p == api_path) {
        return Ok(None);
    }
    if state
        .libraries
        .iter()
        .any(|l| l.api_paths.iter().any(|p| p == api_path))
    {
        return Ok(None);
    }

    let inputs_dir = ctx.repo_dir.join(".librarian-scratch/input");
    let output_dir = ctx.repo_dir.join(".librarian-scratch/output");
    let env_dir = ctx.repo_dir.join(".librarian-scratch/env");
    std::fs::create_dir_all(&inputs_dir)?;
    std::fs::create_dir_all(&output_dir)?;

    let request = ConfigureRequest {
        api_path: api_path.to_string(),
        existing_libraries: state.libraries.clone(),
    };
    let configure_env = prepare_env_file(&ctx.config, &ctx.secrets, "configure", &env_dir)?;
    let response: ConfigureResponse = invoke_with_request(
        ctx.runner,
        &ctx.image,
        "configure",
        &ctx.repo_dir,
        &inputs_dir,
        &output_dir,
        configure_env.as_ref().map(|g| g.path()),
        &request,
    )?;

    let library = response.library;
    let library_id = library.id.clone();

    let already_present = state.library(&library_id).is_some()
        || state.ignored_api_paths.iter().any(|p| p == api_path);
    if !already_present {
        anyhow::bail!(
            "configure did not produce a new or ignored library for {api_path}"
        );
    }

    if state.library(&library_id).is_none() {
        state.libraries.push(library.clone());
    }
    crate::state::save_state(&ctx.repo_dir, state)?;
    crate::git::commit(
        &ctx.repo_dir,
        &format!("feat: configure library {library_id}"),
        &ctx.git_user_name,
        &ctx.git_user_email,
    )?;

    let generate_request = GenerateRequest {
        library: library.clone(),
    };
    let generate_env = prepare_env_file(&ctx.config, &ctx.secrets, "generate", &env_dir)?;
    let generate_response: GenerateResponse = invoke_with_request(
        ctx.runner,
        &ctx.image,
        "generate",
        &ctx.repo_dir,
        &inputs_dir,
        &output_dir,
        generate_env.as_ref().map(|g| g.path()),
        &generate_request,
    )?;
    if !generate_response.is_success() {
        anyhow::bail!(
            "generate failed for {library_id}: {}",
            generate_response.error.unwrap_or_default()
        );
    }
    let clean_env = prepare_env_file(&ctx.config, &ctx.secrets, "clean", &env_dir)?;
    invoke_exit_only(ctx.runner, &ctx.image, "clean", &ctx.repo_dir, clean_env.as_ref().map(|g| g.path()))?;
    let build_env = prepare_env_file(&ctx.config, &ctx.secrets, "build", &env_dir)?;
    invoke_exit_only(ctx.runner, &ctx.image, "build", &ctx.repo_dir, build_env.as_ref().map(|g| g.path()))?;

    Ok(Some(library_id))
}

#[derive(Debug, Deserialize)]
struct ServiceConfig {
    #[serde(default)]
    publishing: Option<Publishing>,
}

#[derive(Debug, Deserialize)]
struct Publishing {
    #[serde(default)]
    library_settings: Vec<LibrarySettings>,
}

// Deserializes the remaining keys as raw YAML values rather than a typed
// map: `library_settings` entries mix per-language settings objects with
// plain scalars (`version`, `launch_stage`), so only the one key this scan
// actually needs (`<language>_settings`) is parsed further.
#[derive(Debug, Deserialize)]
struct LibrarySettings {
    #[serde(flatten)]
    raw: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Deserialize)]
struct LanguageSettings {
    common: Option<CommonSettings>,
}

#[derive(Debug, Deserialize)]
struct CommonSettings {
    #[serde(default)]
    destinations: Vec<String>,
}

const ELIGIBLE_DESTINATIONS: [&str; 2] = ["GITHUB", "PACKAGE_MANAGER"];

/// Absent `--api-path`, spec §4.7 `configure` scans every service-config
/// YAML under `api_root` and onboards the ones that declare a
/// `library_settings` destination of `GITHUB` or `PACKAGE_MANAGER` for
/// `language` and are not already generated or ignored. The API path
/// reported for each hit is the YAML's directory, relative to `api_root`.
pub fn discover_api_paths(
    api_root: &Path,
    language: &str,
    state: &PipelineState,
) -> Result<Vec<String>> {
    let settings_key = format!("{language}_settings");
    let mut out = Vec::new();
    let mut yaml_files = Vec::new();
    collect_yaml_files(api_root, &mut yaml_files)?;

    for path in &yaml_files {
        let Some(api_path) = relative_api_path(api_root, path) else {
            continue;
        };
        if state.ignored_api_paths.iter().any(|p| p == &api_path) {
            continue;
        }
        if state
            .libraries
            .iter()
            .any(|l| l.api_paths.iter().any(|p| p == &api_path))
        {
            continue;
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let Ok(config) = serde_yaml::from_str::<ServiceConfig>(&raw) else {
            continue;
        };
        let Some(publishing) = config.publishing else {
            continue;
        };
        let declares_destination = publishing.library_settings.iter().any(|settings| {
            settings
                .raw
                .get(&settings_key)
                .and_then(|value| serde_yaml::from_value::<LanguageSettings>(value.clone()).ok())
                .and_then(|lang| lang.common)
                .is_some_and(|common| {
                    common
                        .destinations
                        .iter()
                        .any(|d| ELIGIBLE_DESTINATIONS.contains(&d.as_str()))
                })
        });
        if declares_destination {
            out.push(api_path);
        }
    }

    out.sort();
    out.dedup();
    Ok(out)
}

fn relative_api_path(api_root: &Path, yaml_path: &Path) -> Option<String> {
    let relative = yaml_path.strip_prefix(api_root).ok()?;
    let dir = relative.parent()?;
    if dir.as_os_str().is_empty() {
        return None;
    }
    Some(dir.to_string_lossy().replace('\\', "/"))
}

fn collect_yaml_files(dir: &Path, out: &mut Vec<std::path::PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_yaml_files(&path, out)?;
        } else if matches!(path.extension().and_then(|e| e.to_str()), Some("yaml" | "yml")) {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod discovery_tests {
    use super::*;

    fn write(dir: &Path, relative: &str, contents: &str) {
        let full = dir.join(relative);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, contents).unwrap();
    }

    const GITHUB_DOTNET_YAML: &str = "
publishing:
  library_settings:
    - version: google.cloud.example.v1
      dotnet_settings:
        common:
          destinations:
            - GITHUB
";

    #[test]
    fn discovers_paths_declaring_an_eligible_destination() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "google/cloud/example/v1/example_v1.yaml",
            GITHUB_DOTNET_YAML,
        );

        let found = discover_api_paths(dir.path(), "dotnet", &PipelineState::default()).unwrap();
        assert_eq!(found, vec!["google/cloud/example/v1".to_string()]);
    }

    #[test]
    fn skips_languages_not_declared() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "google/cloud/example/v1/example_v1.yaml",
            GITHUB_DOTNET_YAML,
        );

        let found = discover_api_paths(dir.path(), "java", &PipelineState::default()).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn skips_already_configured_or_ignored_paths() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "google/cloud/example/v1/example_v1.yaml",
            GITHUB_DOTNET_YAML,
        );
        write(
            dir.path(),
            "google/cloud/other/v1/other_v1.yaml",
            GITHUB_DOTNET_YAML,
        );

        let mut state = PipelineState::default();
        state.ignored_api_paths.push("google/cloud/other/v1".to_string());

        let found = discover_api_paths(dir.path(), "dotnet", &state).unwrap();
        assert_eq!(found, vec!["google/cloud/example/v1".to_string()]);
    }

    #[test]
    fn skips_yaml_with_no_publishing_section() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "google/cloud/example/v1/example_v1.yaml",
            "type: google.api.Service\nname: example.googleapis.com\n",
        );

        let found = discover_api_paths(dir.path(), "dotnet", &PipelineState::default()).unwrap();
        assert!(found.is_empty());
    }
}
