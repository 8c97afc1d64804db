use std::io;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigFormat, LoaderConfig};
use crate::kernel::constants::{DEFAULT_CLASS_SUFFIXES, DEFAULT_MAX_ENTRIES, DEFAULT_MAX_ENTRY_BYTES};
use crate::plugin_system::container::Container;

/// An annotation attached to a class. The value is kept opaque until the
/// loader interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Header information of a class found in a container.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedClass {
    pub class_name: String,
    pub is_public: bool,
    pub annotations: Vec<Annotation>,
    /// Entry the class was read from
    pub entry: String,
}

impl ScannedClass {
    pub fn annotation(&self, kind: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|annotation| annotation.kind == kind)
    }

    /// Nested classes carry a `$` in their name. [`DescriptorScanner`] also
    /// drops headers whose name does not match their entry path.
    pub fn is_top_level(&self) -> bool {
        !self.class_name.contains('$')
    }
}

/// Reads class headers out of a container.
#[async_trait]
pub trait ClassScanner: Send + Sync {
    async fn scan(&self, container: &dyn Container) -> io::Result<Vec<ScannedClass>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
enum Visibility {
    #[default]
    Public,
    Internal,
    Private,
}

#[derive(Debug, Deserialize)]
struct ClassHeader {
    class: String,
    #[serde(default)]
    visibility: Visibility,
    #[serde(default)]
    annotations: Vec<Annotation>,
}

/// Scans class-header descriptor entries (`Foo.class.json`, `.class.toml`,
/// `.class.yaml`). Only the header is deserialized; annotation values stay
/// untyped.
#[derive(Debug, Clone)]
pub struct DescriptorScanner {
    suffixes: Vec<String>,
    max_entries: usize,
    max_entry_bytes: u64,
}

impl Default for DescriptorScanner {
    fn default() -> Self {
        Self {
            suffixes: DEFAULT_CLASS_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            max_entries: DEFAULT_MAX_ENTRIES,
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
        }
    }
}

impl DescriptorScanner {
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            suffixes: config.class_suffixes.clone(),
            max_entries: config.max_entries,
            max_entry_bytes: config.max_entry_bytes,
        }
    }

    fn matches(&self, entry: &str) -> bool {
        self.suffixes.iter().any(|suffix| entry.ends_with(suffix.as_str()))
    }

    /// Class name implied by an entry path: `com/example/Foo.class.json`
    /// holds `com.example.Foo`.
    fn expected_class_name(&self, entry: &str) -> Option<String> {
        self.suffixes
            .iter()
            .filter_map(|suffix| entry.strip_suffix(suffix.as_str()))
            .min_by_key(|stem| stem.len())
            .map(|stem| stem.replace('/', "."))
    }

    fn parse_header(&self, entry: &str, data: &[u8]) -> io::Result<Option<ClassHeader>> {
        let invalid = |message: String| io::Error::new(io::ErrorKind::InvalidData, format!("{entry}: {message}"));

        let Some(format) = ConfigFormat::from_path(Path::new(entry)) else {
            log::debug!("Skipping '{entry}', unsupported header format");
            return Ok(None);
        };
        let text = std::str::from_utf8(data).map_err(|e| invalid(e.to_string()))?;
        let header = format.deserialize(text).map_err(|e| invalid(e.to_string()))?;
        Ok(Some(header))
    }
}

#[async_trait]
impl ClassScanner for DescriptorScanner {
    async fn scan(&self, container: &dyn Container) -> io::Result<Vec<ScannedClass>> {
        let entries: Vec<String> = container
            .entry_names()
            .await?
            .into_iter()
            .filter(|entry| self.matches(entry))
            .collect();

        if entries.len() > self.max_entries {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "container '{}' has {} class entries, more than the {} allowed",
                    container.name(),
                    entries.len(),
                    self.max_entries
                ),
            ));
        }

        let mut classes = Vec::with_capacity(entries.len());
        for entry in entries {
            let data = container.read_entry(&entry, self.max_entry_bytes).await?;
            if let Some(header) = self.parse_header(&entry, &data)? {
                let expected = self.expected_class_name(&entry);
                if expected.as_deref() != Some(header.class.as_str()) {
                    log::warn!(
                        "Skipping '{entry}' in '{}': declares class '{}' but its path names '{}'",
                        container.name(),
                        header.class,
                        expected.unwrap_or_default()
                    );
                    continue;
                }
                classes.push(ScannedClass {
                    class_name: header.class,
                    is_public: header.visibility == Visibility::Public,
                    annotations: header.annotations,
                    entry,
                });
            }
        }

        log::debug!("Scanned {} classes in '{}'", classes.len(), container.name());
        Ok(classes)
    }
}
