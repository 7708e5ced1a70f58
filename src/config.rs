//! Configuration for PolyKV backends
//!
//! One config type per adapter, with sensible defaults. A caller-supplied
//! native options object overrides the defaults wholesale; everything else
//! is derived from the data directory.

use std::fmt;
use std::path::PathBuf;

// =============================================================================
// Sled Configuration
// =============================================================================

/// Configuration for the sled backend
#[derive(Clone)]
pub struct SledConfig {
    /// Directory for the store's data files
    pub dir: PathBuf,

    /// Optional native sled options. When set, these are used as-is and
    /// the path inside them wins over `dir`.
    pub options: Option<sled::Config>,
}

impl SledConfig {
    /// Create a config rooted at the given data directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), options: None }
    }

    /// Override the native sled options entirely
    pub fn options(mut self, options: sled::Config) -> Self {
        self.options = Some(options);
        self
    }
}

impl fmt::Debug for SledConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SledConfig")
            .field("dir", &self.dir)
            .field("options", &self.options.is_some())
            .finish()
    }
}

// =============================================================================
// Redb Configuration
// =============================================================================

/// Configuration for the redb backend
#[derive(Debug, Clone)]
pub struct RedbConfig {
    /// Directory for the store's data files. The database file lives at
    /// `{dir}/polykv.redb`.
    pub dir: PathBuf,

    /// Page cache size in bytes. When unset, redb's default is used.
    pub cache_size: Option<usize>,
}

impl RedbConfig {
    /// Create a config rooted at the given data directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), cache_size: None }
    }

    /// Set the page cache size (in bytes)
    pub fn cache_size(mut self, size: usize) -> Self {
        self.cache_size = Some(size);
        self
    }
}
