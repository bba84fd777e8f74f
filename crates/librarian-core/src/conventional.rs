//! Conventional-commit parser (spec §4.1).
//!
//! Three phases: header line, body/footer split, footer parsing. A message
//! that simply isn't conventional is not an error — it is represented by
//! [`ParseOutcome::Plain`], never a null `Option`. Only a genuinely empty
//! message is a parse error.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommitParseError {
    #[error("empty commit message")]
    Empty,
}

/// A single commit parsed into conventional-commit fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConventionalCommit {
    pub r#type: String,
    pub scope: Option<String>,
    pub description: String,
    pub body: String,
    /// Footer key/value pairs, in the order they appeared. Continuation
    /// lines are folded into the previous footer's value with `\n`.
    pub footers: Vec<(String, String)>,
    pub is_breaking: bool,
    pub sha: String,
}

impl ConventionalCommit {
    pub fn footer(&self, key: &str) -> Option<&str> {
        self.footers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// Outcome of attempting to parse a commit message. A message that doesn't
/// match the conventional-commit header shape is `Plain`, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Conventional(ConventionalCommit),
    Plain,
}

/// Parse a raw commit message (+ its SHA) into a [`ParseOutcome`].
pub fn parse_commit_message(message: &str, sha: &str) -> Result<ParseOutcome, CommitParseError> {
    if message.is_empty() {
        return Err(CommitParseError::Empty);
    }

    let mut lines = message.lines();
    let header = lines.next().unwrap_or("");

    let Some((r#type, scope, is_breaking_header, description)) = parse_header(header) else {
        return Ok(ParseOutcome::Plain);
    };

    let rest: Vec<&str> = lines.collect();
    let (body, footers) = split_body_and_footers(&rest);

    let mut is_breaking = is_breaking_header;
    if !is_breaking && footers.iter().any(|(k, _)| k == "BREAKING CHANGE") {
        is_breaking = true;
    }

    Ok(ParseOutcome::Conventional(ConventionalCommit {
        r#type,
        scope,
        description,
        body,
        footers,
        is_breaking,
        sha: sha.to_string(),
    }))
}

/// Match `^type(\(scope\))?!?: description`.
fn parse_header(header: &str) -> Option<(String, Option<String>, bool, String)> {
    let bytes = header.as_bytes();
    let mut pos = 0;

    let type_start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_alphanumeric() {
        pos += 1;
    }
    if pos == type_start {
        return None;
    }
    let r#type = header[type_start..pos].to_string();

    let scope = if pos < bytes.len() && bytes[pos] == b'(' {
        let open = pos;
        pos += 1;
        let scope_start = pos;
        while pos < bytes.len() && bytes[pos] != b')' {
            pos += 1;
        }
        if pos >= bytes.len() {
            // unterminated scope: not a valid header
            let _ = open;
            return None;
        }
        let scope_text = header[scope_start..pos].to_string();
        pos += 1; // skip ')'
        Some(scope_text)
    } else {
        None
    };

    let is_breaking = if pos < bytes.len() && bytes[pos] == b'!' {
        pos += 1;
        true
    } else {
        false
    };

    if pos >= bytes.len() || bytes[pos] != b':' {
        return None;
    }
    pos += 1;
    if pos >= bytes.len() || bytes[pos] != b' ' {
        return None;
    }
    pos += 1;

    let description = header[pos..].trim().to_string();
    if description.is_empty() {
        return None;
    }

    Some((r#type, scope, is_breaking, description))
}

/// Scan forward from the first blank line after the header, looking for a
/// line matching the footer pattern. Everything from there on is footers;
/// everything before is body. If no footer block is found, everything is
/// body.
fn split_body_and_footers(lines: &[&str]) -> (String, Vec<(String, String)>) {
    // Find candidate footer-block start: the line right after the *last*
    // blank line such that every non-continuation line from there on looks
    // like a footer.
    let mut footer_start = None;
    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            let candidate = i + 1;
            if candidate < lines.len() && block_is_all_footers(&lines[candidate..]) {
                footer_start = Some(candidate);
            }
        }
    }

    let Some(start) = footer_start else {
        return (join_trim(lines), Vec::new());
    };

    let body_end = if start > 0 && lines[start - 1].trim().is_empty() {
        start - 1
    } else {
        start
    };
    let body = join_trim(&lines[..body_end]);
    let footers = parse_footers(&lines[start..]);
    (body, footers)
}

fn join_trim(lines: &[&str]) -> String {
    lines.join("\n").trim().to_string()
}

fn block_is_all_footers(lines: &[&str]) -> bool {
    let mut saw_footer = false;
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        if is_continuation_line(line) {
            if !saw_footer {
                return false;
            }
            continue;
        }
        if footer_token(line).is_some() {
            saw_footer = true;
        } else {
            return false;
        }
    }
    saw_footer
}

fn is_continuation_line(line: &str) -> bool {
    line.starts_with(' ') || line.starts_with('\t')
}

/// If `line` starts with a valid footer token followed by `: `, return
/// `(token, rest-of-line-after-colon-and-space)`.
fn footer_token(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim_start();
    if let Some(rest) = trimmed.strip_prefix("BREAKING CHANGE:") {
        return Some(("BREAKING CHANGE", rest.trim_start()));
    }
    let colon = memchr::memchr(b':', trimmed.as_bytes())?;
    let token = &trimmed[..colon];
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_alphabetic() || b == b'-') {
        return None;
    }
    Some((token, trimmed[colon + 1..].trim_start()))
}

fn parse_footers(lines: &[&str]) -> Vec<(String, String)> {
    let mut footers: Vec<(String, String)> = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        if let Some((token, value)) = footer_token(line) {
            footers.push((token.to_string(), value.to_string()));
        } else if is_continuation_line(line) {
            if let Some((_, last_value)) = footers.last_mut() {
                last_value.push('\n');
                last_value.push_str(line.trim());
            }
        }
    }
    footers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conv(msg: &str) -> ConventionalCommit {
        match parse_commit_message(msg, "abc123").unwrap() {
            ParseOutcome::Conventional(c) => c,
            ParseOutcome::Plain => panic!("expected conventional commit: {msg:?}"),
        }
    }

    #[test]
    fn empty_message_is_an_error() {
        assert_eq!(
            parse_commit_message("", "sha").unwrap_err(),
            CommitParseError::Empty
        );
    }

    #[test]
    fn non_conventional_header_is_plain_not_error() {
        let out = parse_commit_message("not conventional at all", "sha").unwrap();
        assert_eq!(out, ParseOutcome::Plain);
    }

    #[test]
    fn simple_feat() {
        let c = conv("feat: add widget");
        assert_eq!(c.r#type, "feat");
        assert_eq!(c.scope, None);
        assert_eq!(c.description, "add widget");
        assert!(!c.is_breaking);
    }

    #[test]
    fn scoped_fix() {
        let c = conv("fix(parser): handle nulls");
        assert_eq!(c.r#type, "fix");
        assert_eq!(c.scope.as_deref(), Some("parser"));
    }

    #[test]
    fn breaking_bang() {
        let c = conv("feat!: drop legacy API");
        assert!(c.is_breaking);
    }

    #[test]
    fn breaking_footer_case_sensitive() {
        let c = conv("feat: change\n\nBREAKING CHANGE: removes flag");
        assert!(c.is_breaking);
        assert_eq!(c.footer("BREAKING CHANGE"), Some("removes flag"));

        // Lower-cased "Breaking change:" is body text, not a footer.
        let c2 = conv("feat: change\n\nBreaking change: not a real footer");
        assert!(!c2.is_breaking);
        assert!(c2.body.contains("Breaking change: not a real footer"));
    }

    #[test]
    fn footers_with_continuation() {
        let c = conv("fix: bug\n\nBody text.\n\nReviewed-by: Alice\n more detail\nRefs: #123");
        assert_eq!(c.body, "Body text.");
        assert_eq!(c.footer("Reviewed-by"), Some("Alice\nmore detail"));
        assert_eq!(c.footer("Refs"), Some("#123"));
    }

    #[test]
    fn entire_body_is_footers() {
        let c = conv("fix: bug\n\nRefs: #1");
        assert_eq!(c.body, "");
        assert_eq!(c.footer("Refs"), Some("#1"));
    }

    #[test]
    fn no_footer_block_keeps_everything_as_body() {
        let c = conv("fix: bug\n\nJust a paragraph of prose, no footers here.");
        assert!(c.body.contains("Just a paragraph"));
        assert!(c.footers.is_empty());
    }
}
