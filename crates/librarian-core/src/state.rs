//! Pipeline State Store (spec §4.3): persisted per-repository state and
//! configuration, loaded from and saved to a well-known path inside the
//! language repo.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub const STATE_PATH: &str = "generator-input/pipeline-state.json";
pub const CONFIG_PATH: &str = "generator-input/pipeline-config.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AutomationLevel {
    Automatic,
    Blocked,
    ManualReview,
}

impl fmt::Display for AutomationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Automatic => "AUTOMATIC",
            Self::Blocked => "BLOCKED",
            Self::ManualReview => "MANUAL_REVIEW",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryState {
    pub id: String,
    #[serde(default)]
    pub current_version: String,
    #[serde(default)]
    pub next_version: Option<String>,
    #[serde(default)]
    pub last_generated_commit: String,
    #[serde(default)]
    pub last_released_commit: String,
    #[serde(default)]
    pub release_timestamp: Option<String>,
    #[serde(default)]
    pub api_paths: Vec<String>,
    #[serde(default)]
    pub source_paths: Vec<String>,
    pub release_automation_level: AutomationLevel,
    pub generation_automation_level: AutomationLevel,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineState {
    #[serde(default)]
    pub image_tag: String,
    #[serde(default)]
    pub libraries: Vec<LibraryState>,
    #[serde(default)]
    pub common_library_source_paths: Vec<String>,
    #[serde(default)]
    pub ignored_api_paths: Vec<String>,
}

impl PipelineState {
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for lib in &self.libraries {
            if lib.id.is_empty() {
                bail!("library state has an empty ID");
            }
            if !seen.insert(lib.id.clone()) {
                bail!("duplicate library ID in pipeline state: {}", lib.id);
            }
        }
        Ok(())
    }

    pub fn library(&self, id: &str) -> Option<&LibraryState> {
        self.libraries.iter().find(|l| l.id == id)
    }

    pub fn library_mut(&mut self, id: &str) -> Option<&mut LibraryState> {
        self.libraries.iter_mut().find(|l| l.id == id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvVarDescriptor {
    pub name: String,
    #[serde(default)]
    pub default_value: String,
    #[serde(default)]
    pub secret_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Command name -> ordered environment variable descriptors.
    #[serde(default)]
    pub commands: std::collections::BTreeMap<String, Vec<EnvVarDescriptor>>,
}

/// Deterministic two-space-indent JSON, matching the field order declared
/// on the struct (serde_json preserves declaration order for structs).
fn to_pretty_json<T: Serialize>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"  ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser).context("serializing JSON")?;
    let mut s = String::from_utf8(buf).context("JSON output was not UTF-8")?;
    s.push('\n');
    Ok(s)
}

pub fn load_state(repo_dir: &Path) -> Result<PipelineState> {
    let path = repo_dir.join(STATE_PATH);
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("reading pipeline state at {}", path.display()))?;
    let state: PipelineState =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    state.validate()?;
    Ok(state)
}

/// Writes deterministically: marshal, reformat with two-space indent, write
/// to the same path. Resaving after a load reformats even if the file on
/// disk was unformatted (e.g. written by the container).
pub fn save_state(repo_dir: &Path, state: &PipelineState) -> Result<()> {
    state.validate()?;
    let path = repo_dir.join(STATE_PATH);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = to_pretty_json(state)?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn load_config(repo_dir: &Path) -> Result<PipelineConfig> {
    let path = repo_dir.join(CONFIG_PATH);
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("reading pipeline config at {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

pub fn save_config(repo_dir: &Path, config: &PipelineConfig) -> Result<()> {
    let path = repo_dir.join(CONFIG_PATH);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = to_pretty_json(config)?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Reads a human-authored TOML `PipelineConfig` (spec's environment
/// descriptor table, hand-edited before being normalized into the
/// committed JSON). The JSON at [`CONFIG_PATH`] remains the canonical
/// artifact `load_config`/`save_config` round-trip.
pub fn load_config_toml(path: &Path) -> Result<PipelineConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    toml_edit::de::from_str(&raw).with_context(|| format!("parsing {} as TOML", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sample_library(id: &str) -> LibraryState {
        LibraryState {
            id: id.to_string(),
            current_version: "1.0.0".to_string(),
            next_version: None,
            last_generated_commit: "abc".to_string(),
            last_released_commit: "def".to_string(),
            release_timestamp: None,
            api_paths: vec!["google/cloud/example/v1".to_string()],
            source_paths: vec!["libraries/example".to_string()],
            release_automation_level: AutomationLevel::Automatic,
            generation_automation_level: AutomationLevel::Automatic,
        }
    }

    #[test]
    fn rejects_duplicate_ids() {
        let state = PipelineState {
            libraries: vec![sample_library("a"), sample_library("a")],
            ..Default::default()
        };
        assert!(state.validate().is_err());
    }

    #[test]
    fn rejects_empty_id() {
        let state = PipelineState {
            libraries: vec![sample_library("")],
            ..Default::default()
        };
        assert!(state.validate().is_err());
    }

    #[test]
    fn round_trips_through_disk_with_two_space_indent() {
        let dir = tempfile::tempdir().unwrap();
        let state = PipelineState {
            image_tag: "gcr.io/example/librarian:1".to_string(),
            libraries: vec![sample_library("example")],
            common_library_source_paths: vec!["common".to_string()],
            ignored_api_paths: vec![],
        };
        save_state(dir.path(), &state).unwrap();

        let raw = fs::read_to_string(dir.path().join(STATE_PATH)).unwrap();
        assert!(raw.starts_with("{\n  "));

        let loaded = load_state(dir.path()).unwrap();
        assert_eq!(loaded.image_tag, state.image_tag);
        assert_eq!(loaded.libraries.len(), 1);
    }

    #[test]
    fn loads_config_from_hand_authored_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline-config.toml");
        fs::write(
            &path,
            r#"
[[commands.generate]]
name = "MY_SECRET"
defaultValue = ""
secretName = "projects/example/secrets/my-secret"
"#,
        )
        .unwrap();
        let config = load_config_toml(&path).unwrap();
        let descriptors = &config.commands["generate"];
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].name, "MY_SECRET");
        assert_eq!(
            descriptors[0].secret_name.as_deref(),
            Some("projects/example/secrets/my-secret")
        );
    }

    #[test]
    fn invalid_automation_level_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STATE_PATH);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            r#"{"imageTag":"x","libraries":[{"id":"a","releaseAutomationLevel":"NOT_A_LEVEL","generationAutomationLevel":"AUTOMATIC"}]}"#,
        )
        .unwrap();
        assert!(load_state(dir.path()).is_err());
    }
}
