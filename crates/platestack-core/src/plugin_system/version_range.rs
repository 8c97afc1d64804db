use std::cmp::Ordering;
use std::fmt;

use semver::{Comparator, Op, VersionReq};

use crate::plugin_system::version::{Version, VersionError};

/// A predicate over versions: inclusive bounds, minus nested exclusions.
///
/// Unset bounds are open. `unstable` controls whether versions carrying a
/// pre-release label may match; `case_sensitive` controls how label
/// identifiers are compared against the bounds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    min: Option<Version>,
    max: Option<Version>,
    exclusions: Vec<VersionRange>,
    unstable: bool,
    case_sensitive: bool,
}

impl VersionRange {
    pub fn new(min: Option<Version>, max: Option<Version>, exclusions: Vec<VersionRange>) -> Result<Self, VersionError> {
        if let (Some(min), Some(max)) = (&min, &max) {
            if min.compare(max, true) == Ordering::Greater {
                return Err(VersionError::InvertedRange { min: min.to_string(), max: max.to_string() });
            }
        }
        Ok(Self { min, max, exclusions, unstable: true, case_sensitive: false })
    }

    /// Matches every version.
    pub fn any() -> Self {
        Self { min: None, max: None, exclusions: Vec::new(), unstable: true, case_sensitive: false }
    }

    pub fn exactly(version: Version) -> Self {
        Self { min: Some(version.clone()), max: Some(version), ..Self::any() }
    }

    pub fn at_least(version: Version) -> Self {
        Self { min: Some(version), ..Self::any() }
    }

    pub fn at_most(version: Version) -> Self {
        Self { max: Some(version), ..Self::any() }
    }

    pub fn between(min: Version, max: Version) -> Result<Self, VersionError> {
        Self::new(Some(min), Some(max), Vec::new())
    }

    pub fn excluding(mut self, range: VersionRange) -> Self {
        self.exclusions.push(range);
        self
    }

    pub fn accept_unstable(mut self, unstable: bool) -> Self {
        self.unstable = unstable;
        self
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn min(&self) -> Option<&Version> {
        self.min.as_ref()
    }

    pub fn max(&self) -> Option<&Version> {
        self.max.as_ref()
    }

    pub fn exclusions(&self) -> &[VersionRange] {
        &self.exclusions
    }

    pub fn accepts_unstable(&self) -> bool {
        self.unstable
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Checks the bounds, the stability requirement and the exclusions.
    pub fn contains(&self, version: &Version) -> bool {
        let ignore_case = !self.case_sensitive;

        if !self.unstable && !version.label().is_empty() {
            return false;
        }
        if let Some(min) = &self.min {
            if min.compare(version, ignore_case) == Ordering::Greater {
                return false;
            }
        }
        if let Some(max) = &self.max {
            if version.compare(max, ignore_case) == Ordering::Greater {
                return false;
            }
        }

        !self.excludes(version)
    }

    /// Checks if any nested exclusion matches the version.
    pub fn excludes(&self, version: &Version) -> bool {
        self.exclusions.iter().any(|exclusion| exclusion.contains(version))
    }

    /// Parses a dynamic constraint such as `^1.2`, `~2.0.1`, `>=1.0, <2.0` or
    /// `1.*` into bounds and exclusions.
    ///
    /// Exclusive upper bounds are expressed with the lowest pre-release of the
    /// bound (`<2.0.0` becomes `max = 2.0.0-0`, with `2.0.0-0` itself
    /// excluded), so every version below the bound, pre-releases of lower
    /// versions included, still matches.
    pub fn parse_dynamic(text: &str) -> Result<Self, VersionError> {
        let requirement = VersionReq::parse(text.trim()).map_err(|e| VersionError::InvalidConstraint {
            constraint: text.to_string(),
            message: e.to_string(),
        })?;

        let mut min: Option<Version> = None;
        let mut max: Option<Version> = None;
        let mut exclusions = Vec::new();

        for comparator in &requirement.comparators {
            let bounds = comparator_bounds(comparator).ok_or_else(|| VersionError::InvalidConstraint {
                constraint: text.to_string(),
                message: format!("unsupported operator in '{comparator}'"),
            })?;

            if let Some(lower) = bounds.min {
                min = match min {
                    Some(current) if current.compare(&lower, true) != Ordering::Less => Some(current),
                    _ => Some(lower),
                };
            }
            if let Some(upper) = bounds.max {
                max = match max {
                    Some(current) if current.compare(&upper, true) != Ordering::Greater => Some(current),
                    _ => Some(upper),
                };
            }
            exclusions.extend(bounds.exclusions);
        }

        Self::new(min, max, exclusions).map_err(|e| VersionError::InvalidConstraint {
            constraint: text.to_string(),
            message: e.to_string(),
        })
    }
}

impl Default for VersionRange {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.min, &self.max) {
            (None, None) => f.write_str("*")?,
            (Some(min), Some(max)) if min == max => write!(f, "={min}")?,
            (Some(min), Some(max)) => write!(f, ">={min}, <={max}")?,
            (Some(min), None) => write!(f, ">={min}")?,
            (None, Some(max)) => write!(f, "<={max}")?,
        }
        if !self.exclusions.is_empty() {
            let excluded: Vec<String> = self.exclusions.iter().map(ToString::to_string).collect();
            write!(f, " except ({})", excluded.join(" | "))?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct Bounds {
    min: Option<Version>,
    max: Option<Version>,
    exclusions: Vec<VersionRange>,
}

impl Bounds {
    fn between(min: Version, below: Version) -> Self {
        let mut bounds = Self::below(below);
        bounds.min = Some(min);
        bounds
    }

    /// Everything lower than `version`, expressed inclusively.
    fn below(version: Version) -> Self {
        let bound = if version.label().is_empty() {
            Version::from_parts(version.major(), version.minor(), version.patch(), vec!["0".to_string()], String::new())
        } else {
            version
        };
        Self { min: None, max: Some(bound.clone()), exclusions: vec![VersionRange::exactly(bound)] }
    }
}

fn comparator_bounds(comparator: &Comparator) -> Option<Bounds> {
    let clamp = |value: u64| u32::try_from(value).unwrap_or(u32::MAX);

    let major = clamp(comparator.major);
    let minor = comparator.minor.map(clamp);
    let patch = comparator.patch.map(clamp);
    let label: Vec<String> = if comparator.pre.is_empty() {
        Vec::new()
    } else {
        comparator.pre.as_str().split('.').map(str::to_string).collect()
    };

    let floor = Version::from_parts(major, minor.unwrap_or(0), patch.unwrap_or(0), label, String::new());
    let next_major = Version::release(major.saturating_add(1), 0, 0);
    let next_minor = |minor: u32| Version::release(major, minor.saturating_add(1), 0);
    // first version past the one written, honoring missing components
    let next = match (minor, patch) {
        (None, _) => next_major.clone(),
        (Some(minor), None) => next_minor(minor),
        (Some(minor), Some(patch)) => Version::release(major, minor, patch.saturating_add(1)),
    };

    let bounds = match comparator.op {
        Op::Exact => match (minor, patch) {
            (Some(_), Some(_)) => Bounds { min: Some(floor.clone()), max: Some(floor), exclusions: Vec::new() },
            _ => Bounds::between(floor, next),
        },
        Op::Greater => match (minor, patch) {
            (Some(_), Some(_)) => Bounds {
                min: Some(floor.clone()),
                max: None,
                exclusions: vec![VersionRange::exactly(floor)],
            },
            _ => Bounds { min: Some(next), ..Bounds::default() },
        },
        Op::GreaterEq => Bounds { min: Some(floor), ..Bounds::default() },
        Op::Less => Bounds::below(floor),
        Op::LessEq => match (minor, patch) {
            (Some(_), Some(_)) => Bounds { max: Some(floor), ..Bounds::default() },
            _ => Bounds::below(next),
        },
        Op::Tilde => match minor {
            Some(minor) => Bounds::between(floor, next_minor(minor)),
            None => Bounds::between(floor, next_major),
        },
        Op::Caret => {
            let upper = match (major, minor, patch) {
                (0, None, _) => Version::release(1, 0, 0),
                (0, Some(0), None) => Version::release(0, 1, 0),
                (0, Some(0), Some(patch)) => Version::release(0, 0, patch.saturating_add(1)),
                (0, Some(minor), _) => next_minor(minor),
                _ => next_major,
            };
            Bounds::between(floor, upper)
        }
        Op::Wildcard => Bounds::between(floor, next),
        _ => return None,
    };

    Some(bounds)
}
