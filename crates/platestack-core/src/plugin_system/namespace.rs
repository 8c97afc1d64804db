use std::collections::BTreeMap;

use crate::kernel::constants::PLATFORM_NAMESPACE;
use crate::plugin_system::version::Version;

/// Versions of the platform components plugins can declare relations on,
/// such as the game version or the server implementation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformNamespace {
    entries: BTreeMap<String, Version>,
}

impl PlatformNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, id: impl Into<String>, version: Version) -> Self {
        self.insert(id, version);
        self
    }

    pub fn insert(&mut self, id: impl Into<String>, version: Version) -> Option<Version> {
        self.entries.insert(id.into(), version)
    }

    pub fn get(&self, id: &str) -> Option<&Version> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Version)> {
        self.entries.iter().map(|(id, version)| (id.as_str(), version))
    }

    pub fn namespace(&self) -> &'static str {
        PLATFORM_NAMESPACE
    }
}

impl<K: Into<String>, V: AsRef<str>> FromIterator<(K, V)> for PlatformNamespace {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let entries = iter
            .into_iter()
            .map(|(id, version)| (id.into(), Version::parse(version.as_ref())))
            .collect();
        Self { entries }
    }
}
