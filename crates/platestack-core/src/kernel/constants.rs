/// Application name
pub const APP_NAME: &str = "PlateStack";

/// Current API version
pub const API_VERSION: &str = "0.1.0";

/// Namespace owning every plugin loaded by the plugin loader
pub const PLATE_NAMESPACE: &str = "plate";

/// Namespace for platform entries (server software, game version)
pub const PLATFORM_NAMESPACE: &str = "platform";

/// Annotation type marking a class as a plugin entry point
pub const PLATE_ANNOTATION: &str = "plate";

/// Suffixes of container entries holding a class header
pub const DEFAULT_CLASS_SUFFIXES: &[&str] = &[".class.json", ".class.toml", ".class.yaml", ".class.yml"];

/// Upper bound on entries read from a single container
pub const DEFAULT_MAX_ENTRIES: usize = 65_536;

/// Upper bound on the size of a single container entry
pub const DEFAULT_MAX_ENTRY_BYTES: u64 = 1024 * 1024;

/// Plugin ids and names must be at least this long
pub const MIN_ID_LENGTH: usize = 3;

/// Plugin ids and names must be at most this long
pub const MAX_ID_LENGTH: usize = 20;
