//! Pool configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default arena size: 1 GiB.
///
/// Backing files are sparse, so an arena only costs disk and memory for the
/// pages actually touched.
pub const DEFAULT_ARENA_SIZE: usize = 1024 * 1024 * 1024;

/// Name of the subdirectory that holds backing files.
pub const ARENA_SUBDIR: &str = "shem";

/// Configuration for arena pool creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Data directory; backing files go to `<directory>/shem`.
    pub directory: PathBuf,
    /// Size of the first arena and minimum size of every arena added by
    /// lazy growth.
    pub arena_size: usize,
    /// Unlink backing files right after they are mapped.
    ///
    /// The mapping stays valid until the arena is dropped. Used by pools that
    /// live for the whole process and are therefore never dropped.
    pub ephemeral: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            directory: std::env::temp_dir(),
            arena_size: DEFAULT_ARENA_SIZE,
            ephemeral: false,
        }
    }
}

impl PoolConfig {
    /// Create a configuration for testing.
    ///
    /// Uses a fresh directory under the system temp dir and 1 MB arenas.
    pub fn in_temp() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        Self {
            directory: std::env::temp_dir()
                .join(format!("shem_test_{}_{:x}", std::process::id(), nanos)),
            arena_size: 1024 * 1024,
            ephemeral: false,
        }
    }

    /// Create config with custom directory.
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    /// Create config with custom arena size.
    pub fn with_arena_size(mut self, arena_size: usize) -> Self {
        self.arena_size = arena_size;
        self
    }

    /// Unlink backing files as soon as they are mapped.
    pub fn with_ephemeral(mut self, ephemeral: bool) -> Self {
        self.ephemeral = ephemeral;
        self
    }

    /// The directory backing files are placed in.
    pub fn arena_dir(&self) -> PathBuf {
        self.directory.join(ARENA_SUBDIR)
    }

    /// Create a pool config from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SHEM_DATA_DIR`: data directory (backing files go to `<dir>/shem`)
    /// - `SHEM_ARENA_SIZE`: default arena size in bytes
    /// - `SHEM_EPHEMERAL`: `1`/`true` to unlink backing files after mapping
    ///
    /// # Returns
    ///
    /// Returns `None` if none of the variables is set. Malformed values are
    /// logged and the default is kept.
    pub fn from_env() -> Option<Self> {
        let dir = std::env::var("SHEM_DATA_DIR").ok();
        let size = std::env::var("SHEM_ARENA_SIZE").ok();
        let ephemeral = std::env::var("SHEM_EPHEMERAL").ok();
        if dir.is_none() && size.is_none() && ephemeral.is_none() {
            return None;
        }

        let mut config = Self::default();
        if let Some(dir) = dir {
            config.directory = PathBuf::from(dir);
        }
        if let Some(size) = size {
            match size.trim().parse::<usize>() {
                Ok(size) if size > 0 => config.arena_size = size,
                _ => {
                    tracing::warn!(value = %size, "Invalid SHEM_ARENA_SIZE, using default");
                }
            }
        }
        if let Some(flag) = ephemeral {
            match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" => config.ephemeral = true,
                "0" | "false" | "no" => config.ephemeral = false,
                other => {
                    tracing::warn!(value = %other, "Invalid SHEM_EPHEMERAL, using default");
                }
            }
        }
        Some(config)
    }

    /// Create a pool config from environment variables, or use the default.
    pub fn from_env_or_default() -> Self {
        Self::from_env().unwrap_or_default()
    }
}
