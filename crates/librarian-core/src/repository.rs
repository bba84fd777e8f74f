//! GitHub repository identity parsing (spec §6): "the GitHub URL must start
//! with `https://github.com/`; owner and name are parsed from the first two
//! path segments, with a `.git` suffix stripped."

use anyhow::{Result, bail};

/// Parses `(owner, name)` out of a `https://github.com/<owner>/<name>[.git]`
/// URL.
pub fn parse_github_owner_name(url: &str) -> Result<(String, String)> {
    let Some(rest) = url.strip_prefix("https://github.com/") else {
        bail!("not a github.com URL: {url}");
    };
    let rest = rest.trim_end_matches('/');
    let mut segments = rest.splitn(3, '/');
    let owner = segments.next().filter(|s| !s.is_empty());
    let name = segments.next().filter(|s| !s.is_empty());
    let (Some(owner), Some(name)) = (owner, name) else {
        bail!("could not parse owner/name from {url}");
    };
    let name = name.strip_suffix(".git").unwrap_or(name);
    Ok((owner.to_string(), name.to_string()))
}

/// Parses `(owner, name, pr_number)` out of
/// `https://github.com/<owner>/<name>/pull/<number>`, the `--release-pr-url`
/// flag's shape.
pub fn parse_pr_url(url: &str) -> Result<(String, String, u64)> {
    let (owner, rest) = parse_github_owner_name(url)?;
    let number = url
        .rsplit('/')
        .next()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| anyhow::anyhow!("could not parse PR number from {url}"))?;
    Ok((owner, rest, number))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_owner_and_name() {
        let (owner, name) =
            parse_github_owner_name("https://github.com/librarian-project/librarian").unwrap();
        assert_eq!(owner, "librarian-project");
        assert_eq!(name, "librarian");
    }

    #[test]
    fn strips_dot_git_suffix() {
        let (owner, name) =
            parse_github_owner_name("https://github.com/acme/widgets.git").unwrap();
        assert_eq!(owner, "acme");
        assert_eq!(name, "widgets");
    }

    #[test]
    fn ignores_extra_path_segments() {
        let (owner, name) =
            parse_github_owner_name("https://github.com/acme/widgets/pull/1").unwrap();
        assert_eq!(owner, "acme");
        assert_eq!(name, "widgets");
    }

    #[test]
    fn rejects_non_github_urls() {
        assert!(parse_github_owner_name("https://gitlab.com/acme/widgets").is_err());
    }

    #[test]
    fn parses_pr_url() {
        let (owner, name, number) =
            parse_pr_url("https://github.com/acme/widgets/pull/42").unwrap();
        assert_eq!(owner, "acme");
        assert_eq!(name, "widgets");
        assert_eq!(number, 42);
    }
}
