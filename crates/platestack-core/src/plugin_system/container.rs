use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;

use async_trait::async_trait;
use tokio::fs;

/// A named set of addressable entries plugin classes are discovered in,
/// such as a plugin directory or an in-memory bundle.
#[async_trait]
pub trait Container: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Entry names, `/` separated, in a stable order.
    async fn entry_names(&self) -> io::Result<Vec<String>>;

    /// Reads one entry, failing with `InvalidData` when it is larger than
    /// `max_bytes`.
    async fn read_entry(&self, name: &str, max_bytes: u64) -> io::Result<Vec<u8>>;
}

fn too_large(name: &str, size: u64, max_bytes: u64) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("entry '{name}' has {size} bytes, more than the {max_bytes} allowed"),
    )
}

/// A directory on disk; entries are the regular files below it.
#[derive(Debug, Clone)]
pub struct DirectoryContainer {
    name: String,
    root: PathBuf,
}

impl DirectoryContainer {
    /// Uses the path itself as container name.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        Self { name: root.display().to_string(), root }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> io::Result<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)));
        if name.is_empty() || escapes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("entry name '{name}' does not stay inside the container"),
            ));
        }
        Ok(self.root.join(relative))
    }

    fn walk_boxed<'a>(
        &'a self,
        dir: PathBuf,
        prefix: String,
        names: &'a mut Vec<String>,
    ) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + 'a>> {
        Box::pin(self.walk(dir, prefix, names))
    }

    async fn walk(&self, dir: PathBuf, prefix: String, names: &mut Vec<String>) -> io::Result<()> {
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                log::warn!("Skipping non UTF-8 entry in {}", dir.display());
                continue;
            };
            let name = format!("{prefix}{file_name}");

            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                self.walk_boxed(entry.path(), format!("{name}/"), names).await?;
            } else if file_type.is_file() {
                names.push(name);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Container for DirectoryContainer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn entry_names(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        self.walk_boxed(self.root.clone(), String::new(), &mut names).await?;
        names.sort();
        Ok(names)
    }

    async fn read_entry(&self, name: &str, max_bytes: u64) -> io::Result<Vec<u8>> {
        let path = self.resolve(name)?;
        let size = fs::metadata(&path).await?.len();
        if size > max_bytes {
            return Err(too_large(name, size, max_bytes));
        }
        fs::read(&path).await
    }
}

/// Entries held in memory, mostly for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryContainer {
    name: String,
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemoryContainer {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), entries: BTreeMap::new() }
    }

    pub fn with_entry(mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(name, data);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.entries.insert(name.into(), data.into());
    }
}

#[async_trait]
impl Container for MemoryContainer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn entry_names(&self) -> io::Result<Vec<String>> {
        Ok(self.entries.keys().cloned().collect())
    }

    async fn read_entry(&self, name: &str, max_bytes: u64) -> io::Result<Vec<u8>> {
        let data = self
            .entries
            .get(name)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no entry named '{name}'")))?;
        let size = data.len() as u64;
        if size > max_bytes {
            return Err(too_large(name, size, max_bytes));
        }
        Ok(data.clone())
    }
}
