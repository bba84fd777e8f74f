//! GitHub Facade (spec §4.5/§4.7): create/get/merge PR, add/remove label,
//! add comment, list diff-commits, create release, raw-content fetch at a
//! ref. Grounded on the release-sync client this crate started from, now
//! widened to the full operation set the orchestrators need.

use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

const USER_AGENT: &str = "librarian";

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected response status {status}: {body}")]
    Status { status: u16, body: String },
}

pub struct GitHubClient {
    client: reqwest::Client,
    owner: String,
    name: String,
    token: String,
    base_url: String,
}

#[derive(Debug, Clone)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
    pub head_sha: String,
}

#[derive(Debug, Clone, Deserialize)]
struct PrResponse {
    number: u64,
    html_url: String,
    head: PrHead,
}

#[derive(Debug, Clone, Deserialize)]
struct PrHead {
    sha: String,
}

impl GitHubClient {
    pub fn new(owner: impl Into<String>, name: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            owner: owner.into(),
            name: name.into(),
            token: token.into(),
            base_url: "https://api.github.com".to_string(),
        }
    }

    /// Redirects every request to `base_url` instead of the real API,
    /// e.g. a `wiremock::MockServer` URI in tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn api_base(&self) -> String {
        format!("{}/repos/{}/{}", self.base_url, self.owner, self.name)
    }

    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, GitHubError> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            Err(GitHubError::Status { status, body })
        }
    }

    #[instrument(skip(self))]
    pub async fn create_pr(
        &self,
        title: &str,
        body: &str,
        head_branch: &str,
        base_branch: &str,
    ) -> Result<PullRequest, GitHubError> {
        #[derive(serde::Serialize)]
        struct CreatePr<'a> {
            title: &'a str,
            body: &'a str,
            head: &'a str,
            base: &'a str,
        }
        let resp = self
            .client
            .post(format!("{}/pulls", self.api_base()))
            .header("User-Agent", USER_AGENT)
            .bearer_auth(&self.token)
            .json(&CreatePr {
                title,
                body,
                head: head_branch,
                base: base_branch,
            })
            .send()
            .await
            .map_err(|e| GitHubError::Network(e.to_string()))?;
        let resp = Self::check_status(resp).await?;
        let data: PrResponse = resp
            .json()
            .await
            .map_err(|e| GitHubError::Network(e.to_string()))?;
        Ok(PullRequest {
            number: data.number,
            html_url: data.html_url,
            head_sha: data.head.sha,
        })
    }

    pub async fn get_pr(&self, number: u64) -> Result<PullRequest, GitHubError> {
        let resp = self
            .client
            .get(format!("{}/pulls/{number}", self.api_base()))
            .header("User-Agent", USER_AGENT)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| GitHubError::Network(e.to_string()))?;
        let resp = Self::check_status(resp).await?;
        let data: PrResponse = resp
            .json()
            .await
            .map_err(|e| GitHubError::Network(e.to_string()))?;
        Ok(PullRequest {
            number: data.number,
            html_url: data.html_url,
            head_sha: data.head.sha,
        })
    }

    pub async fn merge_pr_rebase(&self, number: u64) -> Result<(), GitHubError> {
        #[derive(serde::Serialize)]
        struct MergeBody<'a> {
            merge_method: &'a str,
        }
        let resp = self
            .client
            .put(format!("{}/pulls/{number}/merge", self.api_base()))
            .header("User-Agent", USER_AGENT)
            .bearer_auth(&self.token)
            .json(&MergeBody {
                merge_method: "rebase",
            })
            .send()
            .await
            .map_err(|e| GitHubError::Network(e.to_string()))?;
        Self::check_status(resp).await?;
        Ok(())
    }

    pub async fn add_label(&self, number: u64, label: &str) -> Result<(), GitHubError> {
        #[derive(serde::Serialize)]
        struct Labels<'a> {
            labels: Vec<&'a str>,
        }
        let resp = self
            .client
            .post(format!("{}/issues/{number}/labels", self.api_base()))
            .header("User-Agent", USER_AGENT)
            .bearer_auth(&self.token)
            .json(&Labels { labels: vec![label] })
            .send()
            .await
            .map_err(|e| GitHubError::Network(e.to_string()))?;
        Self::check_status(resp).await?;
        Ok(())
    }

    pub async fn remove_label(&self, number: u64, label: &str) -> Result<(), GitHubError> {
        let resp = self
            .client
            .delete(format!(
                "{}/issues/{number}/labels/{}",
                self.api_base(),
                urlencoding_path_segment(label)
            ))
            .header("User-Agent", USER_AGENT)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| GitHubError::Network(e.to_string()))?;
        // GitHub returns 404 if the label was never present; treat that as
        // success since the desired end state (label absent) already holds.
        if resp.status().as_u16() == 404 {
            return Ok(());
        }
        Self::check_status(resp).await?;
        Ok(())
    }

    pub async fn add_comment(&self, number: u64, body: &str) -> Result<(), GitHubError> {
        #[derive(serde::Serialize)]
        struct Comment<'a> {
            body: &'a str,
        }
        let resp = self
            .client
            .post(format!("{}/issues/{number}/comments", self.api_base()))
            .header("User-Agent", USER_AGENT)
            .bearer_auth(&self.token)
            .json(&Comment { body })
            .send()
            .await
            .map_err(|e| GitHubError::Network(e.to_string()))?;
        Self::check_status(resp).await?;
        Ok(())
    }

    /// Raw file content at a ref (`GetRawContent`), used to fetch the
    /// pipeline state at the PR head and at a baseline commit. Requests the
    /// raw media type so the contents API returns the file body directly
    /// instead of a base64-wrapped JSON envelope.
    pub async fn get_raw_content(&self, git_ref: &str, path: &str) -> Result<String, GitHubError> {
        let resp = self
            .client
            .get(format!("{}/contents/{path}", self.api_base()))
            .query(&[("ref", git_ref)])
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github.raw+json")
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| GitHubError::Network(e.to_string()))?;
        let resp = Self::check_status(resp).await?;
        resp.text().await.map_err(|e| GitHubError::Network(e.to_string()))
    }

    pub async fn create_release(
        &self,
        tag: &str,
        name: &str,
        body: &str,
        prerelease: bool,
    ) -> Result<String, GitHubError> {
        #[derive(serde::Serialize)]
        struct CreateRelease<'a> {
            tag_name: &'a str,
            name: &'a str,
            body: &'a str,
            draft: bool,
            prerelease: bool,
        }
        #[derive(Deserialize)]
        struct ReleaseResponse {
            html_url: String,
        }
        let resp = self
            .client
            .post(format!("{}/releases", self.api_base()))
            .header("User-Agent", USER_AGENT)
            .bearer_auth(&self.token)
            .json(&CreateRelease {
                tag_name: tag,
                name,
                body,
                draft: false,
                prerelease,
            })
            .send()
            .await
            .map_err(|e| GitHubError::Network(e.to_string()))?;
        let resp = Self::check_status(resp).await?;
        let data: ReleaseResponse = resp
            .json()
            .await
            .map_err(|e| GitHubError::Network(e.to_string()))?;
        Ok(data.html_url)
    }
}

fn urlencoding_path_segment(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// `true` iff `version` looks pre-release: starts with `0.` or contains a
/// `-` (spec §4.7, `publish-release-artifacts`).
pub fn is_prerelease_version(version: &str) -> bool {
    version.starts_with("0.") || version.contains('-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prerelease_detection() {
        assert!(is_prerelease_version("0.1.0"));
        assert!(is_prerelease_version("1.0.0-beta1"));
        assert!(!is_prerelease_version("1.0.0"));
    }

    #[test]
    fn path_segment_encoding_escapes_reserved_characters() {
        assert_eq!(urlencoding_path_segment("do-not-merge"), "do-not-merge");
        assert_eq!(urlencoding_path_segment("a b"), "a%20b");
    }
}
