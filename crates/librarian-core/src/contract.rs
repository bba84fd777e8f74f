//! JSON request/response contract with the per-language container (spec
//! §3, §4.4). Schemas here are the core's side of the bargain; the
//! container's internal handling of them is out of scope.

use serde::{Deserialize, Serialize};

use crate::state::LibraryState;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureRequest {
    pub api_path: String,
    #[serde(default)]
    pub existing_libraries: Vec<LibraryState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureResponse {
    pub library: LibraryState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub library: LibraryState,
}

/// Empty map on success, or `{"error": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(default)]
    pub error: Option<String>,
}

impl GenerateResponse {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseTriggeredLibrary {
    pub library_id: String,
    pub version: String,
    pub release_notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseInitRequest {
    #[serde(default)]
    pub libraries: Vec<LibraryState>,
    #[serde(default)]
    pub release_triggered: Vec<ReleaseTriggeredLibrary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseInitResponse {
    #[serde(default)]
    pub error: Option<String>,
}

/// `releases.json` written by `create-release-artifacts` alongside the
/// copied pipeline state/config (spec §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseArtifactEntry {
    pub library_id: String,
    pub version: String,
    pub commit_hash: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleasesManifest {
    pub releases: Vec<ReleaseArtifactEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_response_without_error_is_success() {
        let resp: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.is_success());
    }

    #[test]
    fn generate_response_with_error_is_failure() {
        let resp: GenerateResponse =
            serde_json::from_str(r#"{"error": "boom"}"#).unwrap();
        assert!(!resp.is_success());
        assert_eq!(resp.error.as_deref(), Some("boom"));
    }
}
