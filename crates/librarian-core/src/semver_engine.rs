//! Semantic version engine (spec §4.2).
//!
//! Deliberately hand-rolled rather than built on the `semver` crate's
//! `Version` type: the prerelease rules here (two shapes, digit-width
//! preserving increment, pre-1.0 promotion) don't map onto it cleanly.

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PrereleaseSeparator {
    None,
    Dot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prerelease {
    pub label: String,
    pub separator: PrereleaseSeparator,
    /// Digits as written, preserving width (leading zeros). `None` means no
    /// trailing digits were present at all.
    pub number: Option<String>,
}

impl Prerelease {
    fn numeric_value(&self) -> Option<u128> {
        self.number.as_deref().and_then(|n| n.parse().ok())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Option<Prerelease>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChangeLevel {
    None,
    Patch,
    Minor,
    Major,
}

impl ChangeLevel {
    pub fn max(self, other: Self) -> Self {
        std::cmp::max(self, other)
    }
}

impl Version {
    /// Strict `X.Y.Z` or `X.Y.Z-<prerelease>`. A leading `v` is rejected.
    pub fn parse(input: &str) -> Option<Version> {
        if input.is_empty() || !input.as_bytes()[0].is_ascii_digit() {
            return None;
        }

        let (core, prerelease_text) = match input.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (input, None),
        };

        let mut parts = core.split('.');
        let major = parts.next()?;
        let minor = parts.next()?;
        let patch = parts.next()?;
        if parts.next().is_some() {
            return None;
        }
        if !is_plain_number(major) || !is_plain_number(minor) || !is_plain_number(patch) {
            return None;
        }

        let major: u64 = major.parse().ok()?;
        let minor: u64 = minor.parse().ok()?;
        let patch: u64 = patch.parse().ok()?;

        let prerelease = match prerelease_text {
            Some(text) if !text.is_empty() => Some(parse_prerelease(text)),
            Some(_) => return None,
            None => None,
        };

        Some(Version {
            major,
            minor,
            patch,
            prerelease,
        })
    }

    pub fn is_pre_1_0(&self) -> bool {
        self.major == 0
    }

    /// `DeriveNext(changeLevel, current)` per spec §4.2.
    pub fn derive_next(&self, change: ChangeLevel) -> Version {
        if let Some(pre) = &self.prerelease {
            return Version {
                prerelease: Some(bump_prerelease(pre)),
                ..self.clone()
            };
        }

        if self.is_pre_1_0() {
            return match change {
                ChangeLevel::Major => Version {
                    major: 1,
                    minor: 0,
                    patch: 0,
                    prerelease: None,
                },
                ChangeLevel::Minor | ChangeLevel::Patch => Version {
                    major: self.major,
                    minor: self.minor,
                    patch: self.patch + 1,
                    prerelease: None,
                },
                ChangeLevel::None => self.clone(),
            };
        }

        match change {
            ChangeLevel::Major => Version {
                major: self.major + 1,
                minor: 0,
                patch: 0,
                prerelease: None,
            },
            ChangeLevel::Minor => Version {
                major: self.major,
                minor: self.minor + 1,
                patch: 0,
                prerelease: None,
            },
            ChangeLevel::Patch => Version {
                major: self.major,
                minor: self.minor,
                patch: self.patch + 1,
                prerelease: None,
            },
            ChangeLevel::None => self.clone(),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.prerelease {
            write!(f, "-{}", pre.label)?;
            match pre.separator {
                PrereleaseSeparator::Dot => {
                    f.write_str(".")?;
                    if let Some(n) = &pre.number {
                        f.write_str(n)?;
                    }
                }
                PrereleaseSeparator::None => {
                    if let Some(n) = &pre.number {
                        f.write_str(n)?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}
impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}
impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl Version {
    pub fn compare(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => a.label.cmp(&b.label).then_with(|| {
                    match (a.numeric_value(), b.numeric_value()) {
                        (None, None) => Ordering::Equal,
                        (None, Some(_)) => Ordering::Less,
                        (Some(_), None) => Ordering::Greater,
                        (Some(x), Some(y)) => x.cmp(&y),
                    }
                }),
            })
    }
}

fn is_plain_number(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_prerelease(text: &str) -> Prerelease {
    if let Some(dot_idx) = text.rfind('.') {
        let after = &text[dot_idx + 1..];
        if !after.is_empty() && after.bytes().all(|b| b.is_ascii_digit()) {
            return Prerelease {
                label: text[..dot_idx].to_string(),
                separator: PrereleaseSeparator::Dot,
                number: Some(after.to_string()),
            };
        }
    }

    let bytes = text.as_bytes();
    let mut split = bytes.len();
    while split > 0 && bytes[split - 1].is_ascii_digit() {
        split -= 1;
    }

    if split == bytes.len() {
        Prerelease {
            label: text.to_string(),
            separator: PrereleaseSeparator::None,
            number: None,
        }
    } else {
        Prerelease {
            label: text[..split].to_string(),
            separator: PrereleaseSeparator::None,
            number: Some(text[split..].to_string()),
        }
    }
}

fn bump_prerelease(pre: &Prerelease) -> Prerelease {
    match &pre.number {
        None => Prerelease {
            label: pre.label.clone(),
            separator: PrereleaseSeparator::Dot,
            number: Some("1".to_string()),
        },
        Some(digits) => {
            let width = digits.len();
            let value: u128 = digits.parse().unwrap_or(0);
            let incremented = value + 1;
            let text = incremented.to_string();
            let padded = if text.len() < width {
                format!("{:0>width$}", text, width = width)
            } else {
                text
            };
            Prerelease {
                label: pre.label.clone(),
                separator: pre.separator,
                number: Some(padded),
            }
        }
    }
}

/// Lexicographically-largest parsable entry; unparsable entries ignored;
/// empty input (or all-unparsable) returns the empty string.
pub fn max_version<'a, I>(versions: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    versions
        .into_iter()
        .filter_map(Version::parse)
        .max()
        .map(|v| v.to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_leading_v() {
        assert!(Version::parse("v1.2.3").is_none());
    }

    #[test]
    fn parses_plain_release() {
        let v = Version::parse("1.2.3").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (1, 2, 3));
        assert!(v.prerelease.is_none());
        assert_eq!(v.to_string(), "1.2.3");
    }

    #[test]
    fn parses_attached_prerelease_digits() {
        let v = Version::parse("1.2.3-beta21").unwrap();
        let pre = v.prerelease.unwrap();
        assert_eq!(pre.label, "beta");
        assert_eq!(pre.number.as_deref(), Some("21"));
        assert_eq!(pre.separator, PrereleaseSeparator::None);
    }

    #[test]
    fn parses_dotted_prerelease_digits() {
        let v = Version::parse("1.2.3-beta.1").unwrap();
        let pre = v.prerelease.unwrap();
        assert_eq!(pre.label, "beta");
        assert_eq!(pre.number.as_deref(), Some("1"));
        assert_eq!(pre.separator, PrereleaseSeparator::Dot);
    }

    #[test]
    fn label_with_no_digits_is_allowed() {
        let v = Version::parse("1.0.0-rc").unwrap();
        let pre = v.prerelease.unwrap();
        assert_eq!(pre.label, "rc");
        assert!(pre.number.is_none());
    }

    #[test]
    fn string_is_exact_inverse_of_parse() {
        for s in ["1.2.3", "1.2.3-beta21", "1.2.3-beta.1", "0.1.0-rc"] {
            assert_eq!(Version::parse(s).unwrap().to_string(), s);
        }
    }

    #[test]
    fn compare_release_vs_prerelease() {
        let release = Version::parse("1.0.0").unwrap();
        let pre = Version::parse("1.0.0-beta1").unwrap();
        assert!(pre < release);
    }

    #[test]
    fn compare_prerelease_labels_then_numeric_tail() {
        let alpha = Version::parse("1.0.0-alpha1").unwrap();
        let beta = Version::parse("1.0.0-beta1").unwrap();
        assert!(alpha < beta);

        let beta1 = Version::parse("1.0.0-beta1").unwrap();
        let beta2 = Version::parse("1.0.0-beta2").unwrap();
        assert!(beta1 < beta2);

        let beta_no_tail = Version::parse("1.0.0-beta").unwrap();
        let beta_tail = Version::parse("1.0.0-beta1").unwrap();
        assert!(beta_no_tail < beta_tail);
    }

    #[test]
    fn derive_next_bumps_prerelease_digit_width_preserving() {
        let v = Version::parse("1.0.0-beta01").unwrap();
        let next = v.derive_next(ChangeLevel::Patch);
        assert_eq!(next.to_string(), "1.0.0-beta02");

        let v = Version::parse("1.0.0-beta99").unwrap();
        let next = v.derive_next(ChangeLevel::Patch);
        assert_eq!(next.to_string(), "1.0.0-beta100");
    }

    #[test]
    fn derive_next_appends_dot_one_when_no_tail() {
        let v = Version::parse("1.0.0-beta").unwrap();
        let next = v.derive_next(ChangeLevel::Patch);
        assert_eq!(next.to_string(), "1.0.0-beta.1");
    }

    #[test]
    fn derive_next_post_1_0_normal_bumps() {
        let v = Version::parse("1.2.3").unwrap();
        assert_eq!(v.derive_next(ChangeLevel::Patch).to_string(), "1.2.4");
        assert_eq!(v.derive_next(ChangeLevel::Minor).to_string(), "1.3.0");
        assert_eq!(v.derive_next(ChangeLevel::Major).to_string(), "2.0.0");
        assert_eq!(v.derive_next(ChangeLevel::None).to_string(), "1.2.3");
    }

    #[test]
    fn derive_next_pre_1_0_special_case() {
        let v = Version::parse("0.3.5").unwrap();
        assert_eq!(v.derive_next(ChangeLevel::Patch).to_string(), "0.3.6");
        assert_eq!(v.derive_next(ChangeLevel::Minor).to_string(), "0.3.6");
        assert_eq!(v.derive_next(ChangeLevel::Major).to_string(), "1.0.0");
    }

    #[test]
    fn max_version_ignores_unparsable_and_handles_empty() {
        assert_eq!(max_version(["1.0.0", "not-a-version", "2.0.0"]), "2.0.0");
        assert_eq!(max_version(Vec::<&str>::new()), "");
        assert_eq!(max_version(["garbage"]), "");
    }

    #[test]
    fn change_level_max_combinator_orders_correctly() {
        assert_eq!(ChangeLevel::None.max(ChangeLevel::Patch), ChangeLevel::Patch);
        assert_eq!(ChangeLevel::Minor.max(ChangeLevel::Major), ChangeLevel::Major);
        assert_eq!(ChangeLevel::Major.max(ChangeLevel::None), ChangeLevel::Major);
    }
}
