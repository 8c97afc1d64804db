use std::fmt;

use serde::{Deserialize, Serialize};

use crate::kernel::constants::{PLATE_NAMESPACE, PLATFORM_NAMESPACE};
use crate::plugin_system::metadata::PlateMetadata;
use crate::plugin_system::version::{Version, VersionError};
use crate::plugin_system::version_range::VersionRange;

/// How a plugin relates to another plugin or platform entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    /// The target must be present and is loaded before the declaring plugin.
    RequiredBefore,
    /// The target must be present and is loaded after the declaring plugin.
    RequiredAfter,
    /// If present, the target is loaded before the declaring plugin.
    OptionalBefore,
    /// If present, the target is loaded after the declaring plugin.
    OptionalAfter,
    /// The declaring plugin refuses to load alongside the target.
    Incompatible,
    /// The target ships inside the declaring plugin's container; the
    /// declaring plugin refuses to work when the target comes from another
    /// container.
    Included,
}

impl RelationType {
    pub fn is_required(self) -> bool {
        matches!(self, RelationType::RequiredBefore | RelationType::RequiredAfter)
    }

    pub fn is_optional(self) -> bool {
        matches!(self, RelationType::OptionalBefore | RelationType::OptionalAfter)
    }

    /// Target loads before the declaring plugin.
    pub fn is_before(self) -> bool {
        matches!(self, RelationType::RequiredBefore | RelationType::OptionalBefore)
    }

    /// Target loads after the declaring plugin.
    pub fn is_after(self) -> bool {
        matches!(self, RelationType::RequiredAfter | RelationType::OptionalAfter)
    }

    pub fn is_ordering(self) -> bool {
        self.is_before() || self.is_after()
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RelationType::RequiredBefore => "REQUIRED_BEFORE",
            RelationType::RequiredAfter => "REQUIRED_AFTER",
            RelationType::OptionalBefore => "OPTIONAL_BEFORE",
            RelationType::OptionalAfter => "OPTIONAL_AFTER",
            RelationType::Incompatible => "INCOMPATIBLE",
            RelationType::Included => "INCLUDED",
        };
        f.write_str(name)
    }
}

/// A relation declared by a plugin towards `namespace:id`, matching any of
/// `versions`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Relation {
    kind: RelationType,
    id: String,
    namespace: String,
    versions: Vec<VersionRange>,
}

impl Relation {
    pub fn new(
        kind: RelationType,
        id: impl Into<String>,
        namespace: impl Into<String>,
        versions: Vec<VersionRange>,
    ) -> Result<Self, VersionError> {
        let id = id.into();
        let namespace = namespace.into();
        if versions.is_empty() {
            return Err(VersionError::EmptyRelation { id, namespace });
        }
        Ok(Self { kind, id, namespace, versions })
    }

    /// A relation to another plugin, accepting any version.
    pub fn plate(kind: RelationType, id: impl Into<String>) -> Self {
        Self { kind, id: id.into(), namespace: PLATE_NAMESPACE.to_string(), versions: vec![VersionRange::any()] }
    }

    pub fn kind(&self) -> RelationType {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn versions(&self) -> &[VersionRange] {
        &self.versions
    }

    pub fn is_plate(&self) -> bool {
        self.namespace == PLATE_NAMESPACE
    }

    pub fn is_platform(&self) -> bool {
        self.namespace == PLATFORM_NAMESPACE
    }

    pub fn accepts(&self, version: &Version) -> bool {
        self.versions.iter().any(|range| range.contains(version))
    }

    /// Checks if the plugin described by `metadata` satisfies this relation.
    pub fn contains(&self, metadata: &PlateMetadata) -> bool {
        self.is_plate() && self.id == metadata.id() && self.accepts(metadata.version())
    }

    /// Checks if the platform entry `id` at `version` satisfies this relation.
    pub fn matches_platform(&self, id: &str, version: &Version) -> bool {
        self.is_platform() && self.id == id && self.accepts(version)
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ranges: Vec<String> = self.versions.iter().map(ToString::to_string).collect();
        write!(f, "{} {}:{} [{}]", self.kind, self.namespace, self.id, ranges.join(" | "))
    }
}
