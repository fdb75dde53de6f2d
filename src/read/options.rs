//! Options for opening resource files.

use std::fmt;
use std::str::FromStr;

/// Which fork of a file to read resources from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForkMode {
    /// Use the primary source if it is plausible, otherwise the fallback.
    #[default]
    Auto,
    /// Always use the primary source (the resource fork).
    Primary,
    /// Always use the fallback source (the data fork).
    Fallback,
}

impl ForkMode {
    /// Returns the command line spelling of this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            ForkMode::Auto => "auto",
            ForkMode::Primary => "rsrc",
            ForkMode::Fallback => "data",
        }
    }
}

impl fmt::Display for ForkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(ForkMode::Auto),
            "rsrc" | "primary" => Ok(ForkMode::Primary),
            "data" | "fallback" => Ok(ForkMode::Fallback),
            other => Err(format!(
                "unknown fork '{other}', expected one of: auto, rsrc, data"
            )),
        }
    }
}

/// Limits applied while opening and reading resource files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Maximum size of the resource map in bytes.
    pub max_map_bytes: u64,
    /// Maximum number of resources across all types.
    pub max_resources: usize,
    /// Maximum declared decompressed length of a single resource.
    pub max_decompressed_bytes: u64,
    /// Maximum number of data section bytes a forward-only source keeps for
    /// reads behind its cursor.
    pub max_retained_bytes: u64,
}

impl Default for ResourceLimits {
    /// Creates resource limits with the following default values:
    ///
    /// | Limit | Default Value |
    /// |-------|---------------|
    /// | `max_map_bytes` | 16 MiB |
    /// | `max_resources` | 1,048,576 |
    /// | `max_decompressed_bytes` | 256 MiB |
    /// | `max_retained_bytes` | 32 MiB |
    ///
    /// The map limit is far above what the format's 16-bit offsets can
    /// address; the others bound memory use for hostile input. Use
    /// [`ResourceLimits::unlimited()`] to disable all limits.
    fn default() -> Self {
        Self {
            max_map_bytes: 16 << 20,
            max_resources: 65_536 * 16,
            max_decompressed_bytes: 256 << 20,
            max_retained_bytes: 32 << 20,
        }
    }
}

impl ResourceLimits {
    /// Creates new resource limits with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates resource limits with no restrictions.
    pub fn unlimited() -> Self {
        Self {
            max_map_bytes: u64::MAX,
            max_resources: usize::MAX,
            max_decompressed_bytes: u64::MAX,
            max_retained_bytes: u64::MAX,
        }
    }

    /// Sets the maximum map size.
    pub fn max_map_bytes(mut self, max: u64) -> Self {
        self.max_map_bytes = max;
        self
    }

    /// Sets the maximum number of resources.
    pub fn max_resources(mut self, max: usize) -> Self {
        self.max_resources = max;
        self
    }

    /// Sets the maximum decompressed length of a single resource.
    pub fn max_decompressed_bytes(mut self, max: u64) -> Self {
        self.max_decompressed_bytes = max;
        self
    }

    /// Sets how many data section bytes a forward-only source may retain.
    pub fn max_retained_bytes(mut self, max: u64) -> Self {
        self.max_retained_bytes = max;
        self
    }
}

/// Options for opening a resource file.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Fork selection mode, used when opening by path or through a
    /// [`ForkSelector`](super::ForkSelector).
    pub fork: ForkMode,
    /// Resource limits.
    pub limits: ResourceLimits,
    /// Whether a forward-only source keeps a data section that precedes the
    /// map, so resources stay readable after the map has been parsed.
    pub retain_data: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            fork: ForkMode::Auto,
            limits: ResourceLimits::default(),
            retain_data: true,
        }
    }
}

impl OpenOptions {
    /// Creates open options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the fork selection mode.
    pub fn fork(mut self, mode: ForkMode) -> Self {
        self.fork = mode;
        self
    }

    /// Sets the resource limits.
    pub fn limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Sets whether forward-only sources retain the data section.
    pub fn retain_data(mut self, retain: bool) -> Self {
        self.retain_data = retain;
        self
    }
}
