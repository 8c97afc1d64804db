use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Error raised when a version, range, relation or metadata value is built
/// from invalid parts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("The {component} version must be >= 0, {value} was used")]
    NegativeComponent { component: &'static str, value: i64 },

    #[error("Empty label identifiers are not allowed, use an empty label if the version has none")]
    BlankLabel,

    #[error("The label \"{0}\" is invalid: numeric identifiers must not include leading zeroes")]
    LeadingZero(String),

    #[error("The label \"{0}\" is invalid: identifiers must comprise only ASCII alphanumerics and hyphen [0-9A-Za-z-]")]
    InvalidLabel(String),

    #[error("The metadata \"{0}\" is invalid: it must be a series of dot separated, non-empty [0-9A-Za-z-] identifiers")]
    InvalidMetadata(String),

    #[error("Invalid version range: {min} must be less than or equal to {max}")]
    InvertedRange { min: String, max: String },

    #[error("Invalid version constraint '{constraint}': {message}")]
    InvalidConstraint { constraint: String, message: String },

    #[error("The relation to '{namespace}:{id}' must declare at least one version range")]
    EmptyRelation { id: String, namespace: String },

    #[error("Invalid plugin id '{0}': it must have 3 to 20 lowercase letters, separated by single underscores, starting and ending with a letter")]
    InvalidId(String),

    #[error("Invalid plugin name '{0}': it must have 3 to 20 characters")]
    InvalidName(String),

    #[error("Invalid library '{0}': group, artifact and version must not be blank")]
    InvalidLibrary(String),
}

/// A version following the Semantic Versioning 2.0.0 rules, extended to
/// accept the loose version strings found in the wild.
///
/// * `0.13.5` is `Version::release(0, 13, 5)`
/// * `2.8.255-beta` is `Version::new(2, 8, 255, ["beta"], "")`
/// * `45.158.9-rc.3.50+build38.sha.5589` is
///   `Version::new(45, 158, 9, ["rc", "3", "50"], "build38.sha.5589")`
///
/// Equality (`==`) is structural and includes the build metadata and the raw
/// text. Precedence is given by [`Version::compare`], which ignores metadata;
/// use [`Version::same_as`] to check two versions for equal precedence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    major: u32,
    minor: u32,
    patch: u32,
    label: Vec<String>,
    metadata: String,
    raw: String,
    stable: bool,
}

impl Version {
    /// Creates a validated version.
    pub fn new<I, S>(major: u32, minor: u32, patch: u32, label: I, metadata: impl Into<String>) -> Result<Self, VersionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let label: Vec<String> = label.into_iter().map(Into::into).collect();
        let metadata = metadata.into();

        for identifier in &label {
            validate_identifier(identifier)?;
        }
        if !metadata.is_empty() && !is_valid_metadata(&metadata) {
            return Err(VersionError::InvalidMetadata(metadata));
        }

        Ok(Self::from_parts(major, minor, patch, label, metadata))
    }

    /// Creates a validated version from signed components, as found in
    /// descriptors written by hand.
    pub fn from_signed<I, S>(major: i64, minor: i64, patch: i64, label: I, metadata: impl Into<String>) -> Result<Self, VersionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let component = |name: &'static str, value: i64| {
            u32::try_from(value).map_err(|_| VersionError::NegativeComponent { component: name, value })
        };
        Self::new(component("major", major)?, component("minor", minor)?, component("patch", patch)?, label, metadata)
    }

    /// A version without label or metadata. Always valid.
    pub fn release(major: u32, minor: u32, patch: u32) -> Self {
        Self::from_parts(major, minor, patch, Vec::new(), String::new())
    }

    /// Parts are assumed valid; `stable` is derived.
    pub(crate) fn from_parts(major: u32, minor: u32, patch: u32, label: Vec<String>, metadata: String) -> Self {
        let stable = label.is_empty() && major > 0;
        Self { major, minor, patch, label, metadata, raw: String::new(), stable }
    }

    /// Overrides the derived stability flag.
    pub fn with_stability(mut self, stable: bool) -> Self {
        self.stable = stable;
        self
    }

    /// Keeps `raw` as the display form of this version.
    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = raw.into();
        self
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn patch(&self) -> u32 {
        self.patch
    }

    /// Pre-release identifiers. Empty for releases.
    pub fn label(&self) -> &[String] {
        &self.label
    }

    /// Build metadata, never part of precedence.
    pub fn metadata(&self) -> &str {
        &self.metadata
    }

    /// The text this version was parsed from, empty when built from parts.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Stable versions have no label and a major version above zero,
    /// unless overridden.
    pub fn is_stable(&self) -> bool {
        self.stable
    }

    /// Parses a string into the closest valid version. Never fails.
    ///
    /// The leading run of dot separated digit groups gives major, minor and
    /// patch (extra groups become label identifiers). What follows is split
    /// into a label and build metadata; characters that are not allowed are
    /// dropped. The exact input is kept for display.
    pub fn parse(text: &str) -> Self {
        let (numbers, rest) = split_leading_numbers(text);

        let component = |index: usize| -> u32 {
            numbers
                .get(index)
                // all-digit groups only fail to parse on overflow
                .map(|group| group.parse::<u32>().unwrap_or(u32::MAX))
                .unwrap_or(0)
        };
        let (major, minor, patch) = (component(0), component(1), component(2));

        let mut label: Vec<String> = numbers.iter().skip(3).map(|group| group.to_string()).collect();

        let rest = rest.strip_prefix('-').unwrap_or(rest);
        let label_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
            .unwrap_or(rest.len());
        let (defined_label, tail) = rest.split_at(label_len);

        label.extend(
            defined_label
                .replace('_', "-")
                .split('.')
                .filter(|identifier| !identifier.is_empty())
                .map(str::to_string),
        );
        for identifier in label.iter_mut() {
            if identifier.len() > 1 && identifier.starts_with('0') && is_numeric(identifier) {
                let trimmed = identifier.trim_start_matches('0');
                *identifier = if trimmed.is_empty() { "0".to_string() } else { trimmed.to_string() };
            }
        }

        let tail = tail.strip_prefix('+').unwrap_or(tail);
        let metadata = sanitize_metadata(tail);

        let unstable = numbers.is_empty() || !label.is_empty();
        let stable = !unstable && major > 0;

        Self { major, minor, patch, label, metadata, raw: text.to_string(), stable }
    }

    /// Compares both versions by SemVer precedence. Metadata is ignored.
    pub fn compare(&self, other: &Version, ignore_case: bool) -> Ordering {
        let numbers = self
            .major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch));
        if numbers != Ordering::Equal {
            return numbers;
        }

        match (self.stable, other.stable) {
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            _ => {}
        }

        match (self.label.is_empty(), other.label.is_empty()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => {}
        }

        for (a, b) in self.label.iter().zip(&other.label) {
            let diff = compare_identifiers(a, b, ignore_case);
            if diff != Ordering::Equal {
                return diff;
            }
        }

        self.label.len().cmp(&other.label.len())
    }

    /// Checks if both versions have the same precedence.
    pub fn same_as(&self, other: &Version) -> bool {
        self.compare(other, true) == Ordering::Equal
    }

    /// Renders the parts, ignoring `raw`.
    pub fn canonical(&self) -> String {
        let mut text = format!("{}.{}.{}", self.major, self.minor, self.patch);
        if !self.label.is_empty() {
            text.push('-');
            text.push_str(&self.label.join("."));
        }
        if !self.metadata.trim().is_empty() {
            text.push('+');
            text.push_str(&self.metadata);
        }
        text
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.raw.trim().is_empty() {
            f.write_str(&self.canonical())
        } else {
            f.write_str(&self.raw)
        }
    }
}

impl FromStr for Version {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Version::parse(s))
    }
}

impl From<&semver::Version> for Version {
    fn from(version: &semver::Version) -> Self {
        let clamp = |value: u64| u32::try_from(value).unwrap_or(u32::MAX);
        let label = if version.pre.is_empty() {
            Vec::new()
        } else {
            version.pre.as_str().split('.').map(str::to_string).collect()
        };
        Self::from_parts(
            clamp(version.major),
            clamp(version.minor),
            clamp(version.patch),
            label,
            version.build.as_str().to_string(),
        )
    }
}

impl TryFrom<&Version> for semver::Version {
    type Error = semver::Error;

    fn try_from(version: &Version) -> Result<Self, Self::Error> {
        semver::Version::parse(&version.canonical())
    }
}

pub(crate) fn is_numeric(identifier: &str) -> bool {
    !identifier.is_empty() && identifier.bytes().all(|b| b.is_ascii_digit())
}

fn validate_identifier(identifier: &str) -> Result<(), VersionError> {
    if identifier.trim().is_empty() {
        return Err(VersionError::BlankLabel);
    }
    if is_numeric(identifier) {
        if identifier.len() > 1 && identifier.starts_with('0') {
            return Err(VersionError::LeadingZero(identifier.to_string()));
        }
    } else if !identifier.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        return Err(VersionError::InvalidLabel(identifier.to_string()));
    }
    Ok(())
}

fn is_valid_metadata(metadata: &str) -> bool {
    metadata
        .split('.')
        .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-'))
}

/// Returns the leading `digits(.digits)*` groups and the remaining text.
fn split_leading_numbers(text: &str) -> (Vec<&str>, &str) {
    let bytes = text.as_bytes();
    let digits_from = |start: usize| {
        let mut end = start;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        end
    };

    let mut groups = Vec::new();
    let mut end = digits_from(0);
    if end == 0 {
        return (groups, text);
    }
    groups.push(&text[..end]);

    while end + 1 < bytes.len() && bytes[end] == b'.' && bytes[end + 1].is_ascii_digit() {
        let start = end + 1;
        end = digits_from(start);
        groups.push(&text[start..end]);
    }

    (groups, &text[end..])
}

fn sanitize_metadata(text: &str) -> String {
    let kept: String = text
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-'))
        .collect();
    kept.split('.').filter(|part| !part.is_empty()).collect::<Vec<_>>().join(".")
}

fn compare_identifiers(a: &str, b: &str, ignore_case: bool) -> Ordering {
    match (is_numeric(a), is_numeric(b)) {
        (true, true) => {
            let a = a.trim_start_matches('0');
            let b = b.trim_start_matches('0');
            a.len().cmp(&b.len()).then_with(|| a.cmp(b))
        }
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => {
            let fold = |c: char| if ignore_case { c.to_ascii_lowercase() } else { c };
            for (ac, bc) in a.chars().zip(b.chars()) {
                let diff = fold(ac).cmp(&fold(bc));
                if diff != Ordering::Equal {
                    return diff;
                }
            }
            a.chars().count().cmp(&b.chars().count())
        }
    }
}
