use std::fmt;

use serde::{Deserialize, Serialize};

use crate::kernel::constants::{MAX_ID_LENGTH, MIN_ID_LENGTH, PLATE_NAMESPACE};
use crate::plugin_system::relation::{Relation, RelationType};
use crate::plugin_system::version::{Version, VersionError};
use crate::plugin_system::version_range::VersionRange;

/// Identity and declared relations of a plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlateMetadata {
    /// Unique identifier, lowercase letters separated by single underscores
    id: String,

    /// Human-readable name
    name: String,

    /// Plugin version
    version: Version,

    /// Minimum runtime version the plugin needs, blank when unconstrained
    runtime: String,

    /// Relations to other plugins and platform entries
    relations: Vec<Relation>,

    /// Libraries the plugin needs on its class path
    libraries: Vec<Library>,
}

impl PlateMetadata {
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: Version) -> Result<Self, VersionError> {
        MetadataBuilder::new(id, name, version).build()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn runtime(&self) -> &str {
        &self.runtime
    }

    /// Parsed runtime requirement, if any was declared.
    pub fn runtime_requirement(&self) -> Option<Version> {
        let runtime = self.runtime.trim();
        (!runtime.is_empty()).then(|| Version::parse(runtime))
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn relations_of(&self, kind: RelationType) -> impl Iterator<Item = &Relation> {
        self.relations.iter().filter(move |relation| relation.kind() == kind)
    }

    pub fn libraries(&self) -> &[Library] {
        &self.libraries
    }
}

impl fmt::Display for PlateMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} (#{})", self.name, self.version, self.id)
    }
}

/// Builder for [`PlateMetadata`]; validation happens in [`MetadataBuilder::build`].
pub struct MetadataBuilder {
    id: String,
    name: String,
    version: Version,
    runtime: String,
    relations: Vec<Relation>,
    libraries: Vec<Library>,
}

impl MetadataBuilder {
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: Version) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version,
            runtime: String::new(),
            relations: Vec::new(),
            libraries: Vec::new(),
        }
    }

    pub fn runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = runtime.into();
        self
    }

    pub fn relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn relations(mut self, relations: impl IntoIterator<Item = Relation>) -> Self {
        self.relations.extend(relations);
        self
    }

    pub fn library(mut self, library: Library) -> Self {
        self.libraries.push(library);
        self
    }

    pub fn build(self) -> Result<PlateMetadata, VersionError> {
        validate_id(&self.id)?;
        validate_name(&self.name)?;
        Ok(PlateMetadata {
            id: self.id,
            name: self.name,
            version: self.version,
            runtime: self.runtime,
            relations: self.relations,
            libraries: self.libraries,
        })
    }
}

/// Checks a plugin id: 3 to 20 lowercase ASCII letters, single underscores
/// between letters.
pub fn validate_id(id: &str) -> Result<(), VersionError> {
    let bytes = id.as_bytes();
    let valid = (MIN_ID_LENGTH..=MAX_ID_LENGTH).contains(&bytes.len())
        && bytes.iter().all(|b| b.is_ascii_lowercase() || *b == b'_')
        && bytes.first().is_some_and(u8::is_ascii_lowercase)
        && bytes.last().is_some_and(u8::is_ascii_lowercase)
        && !id.contains("__");

    if valid { Ok(()) } else { Err(VersionError::InvalidId(id.to_string())) }
}

pub fn validate_name(name: &str) -> Result<(), VersionError> {
    if (MIN_ID_LENGTH..=MAX_ID_LENGTH).contains(&name.chars().count()) {
        Ok(())
    } else {
        Err(VersionError::InvalidName(name.to_string()))
    }
}

/// A Maven-style library coordinate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Library {
    group: String,
    artifact: String,
    version: String,
}

impl Library {
    pub fn new(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self, VersionError> {
        let library = Self { group: group.into(), artifact: artifact.into(), version: version.into() };
        library.validate()?;
        Ok(library)
    }

    fn validate(&self) -> Result<(), VersionError> {
        if [&self.group, &self.artifact, &self.version].iter().any(|part| part.trim().is_empty()) {
            return Err(VersionError::InvalidLibrary(self.to_string()));
        }
        Ok(())
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// `artifact-version.jar`
    pub fn artifact_file_name(&self) -> String {
        format!("{}-{}.jar", self.artifact, self.version)
    }

    /// Repository layout path: `group/as/dirs/artifact/version/file`.
    pub fn relative_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.group.replace('.', "/"),
            self.artifact,
            self.version,
            self.artifact_file_name()
        )
    }
}

impl fmt::Display for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)
    }
}

/// The declarative `plate` annotation block attached to a plugin class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateDescriptor {
    pub id: String,
    pub name: String,
    pub version: VersionSpec,
    #[serde(default)]
    pub relations: Vec<RelationSpec>,
    #[serde(default)]
    pub runtime: String,
    #[serde(default)]
    pub requires: Vec<Library>,
}

/// A version written either as text or as its parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VersionSpec {
    Text(String),
    Parts {
        major: i64,
        #[serde(default)]
        minor: i64,
        #[serde(default)]
        patch: i64,
        #[serde(default)]
        label: Vec<String>,
        #[serde(default)]
        metadata: String,
    },
}

impl VersionSpec {
    pub fn to_version(&self) -> Result<Version, VersionError> {
        match self {
            VersionSpec::Text(text) => Ok(Version::parse(text)),
            VersionSpec::Parts { major, minor, patch, label, metadata } => {
                Version::from_signed(*major, *minor, *patch, label.iter().cloned(), metadata.clone())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationSpec {
    #[serde(rename = "type")]
    pub kind: RelationType,
    pub id: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub versions: Vec<RangeSpec>,
}

fn default_namespace() -> String {
    PLATE_NAMESPACE.to_string()
}

fn accept_unstable_default() -> bool {
    true
}

/// A version range written as a dynamic constraint or as explicit bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RangeSpec {
    Constraint(String),
    Dynamic {
        dynamic: String,
    },
    Bounds {
        #[serde(default)]
        min: Option<VersionSpec>,
        #[serde(default)]
        max: Option<VersionSpec>,
        #[serde(default)]
        exclusions: Vec<RangeSpec>,
        #[serde(default = "accept_unstable_default")]
        unstable: bool,
        #[serde(default)]
        case_sensitive: bool,
    },
}

impl RangeSpec {
    pub fn to_range(&self) -> Result<VersionRange, VersionError> {
        match self {
            RangeSpec::Constraint(text) | RangeSpec::Dynamic { dynamic: text } => VersionRange::parse_dynamic(text),
            RangeSpec::Bounds { min, max, exclusions, unstable, case_sensitive } => {
                let min = min.as_ref().map(VersionSpec::to_version).transpose()?;
                let max = max.as_ref().map(VersionSpec::to_version).transpose()?;
                let exclusions = exclusions.iter().map(RangeSpec::to_range).collect::<Result<Vec<_>, _>>()?;
                Ok(VersionRange::new(min, max, exclusions)?
                    .accept_unstable(*unstable)
                    .case_sensitive(*case_sensitive))
            }
        }
    }
}

impl TryFrom<&RelationSpec> for Relation {
    type Error = VersionError;

    fn try_from(spec: &RelationSpec) -> Result<Self, Self::Error> {
        let mut versions = spec.versions.iter().map(RangeSpec::to_range).collect::<Result<Vec<_>, _>>()?;
        if versions.is_empty() {
            versions.push(VersionRange::any());
        }
        Relation::new(spec.kind, spec.id.clone(), spec.namespace.clone(), versions)
    }
}

impl TryFrom<PlateDescriptor> for PlateMetadata {
    type Error = VersionError;

    fn try_from(descriptor: PlateDescriptor) -> Result<Self, Self::Error> {
        let relations = descriptor.relations.iter().map(Relation::try_from).collect::<Result<Vec<_>, _>>()?;
        for library in &descriptor.requires {
            library.validate()?;
        }

        let mut builder = MetadataBuilder::new(descriptor.id, descriptor.name, descriptor.version.to_version()?)
            .runtime(descriptor.runtime)
            .relations(relations);
        for library in descriptor.requires {
            builder = builder.library(library);
        }
        builder.build()
    }
}
