use matryoshka_pack::DEFAULT_BUFFER_SIZE;
use matryoshka_types::ChunkSize;
use serde::{Deserialize, Serialize};

use crate::error::{VfsError, VfsResult};

/// Chunk size used by front ends when the caller names none.
pub const DEFAULT_CHUNK_SIZE: i64 = 8192;

/// Tunables for a loaded container. Every field has a default, so a
/// partial TOML file only overrides what it names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Initialize a new container when the file does not exist.
    pub create_if_missing: bool,
    /// Chunk size for pushes that do not specify one; zero or negative
    /// stores entries unchunked.
    pub default_chunk_size: i64,
    /// Flush to stable storage at every commit.
    pub sync_on_commit: bool,
    /// Size of the buffer used to stream bytes in and out.
    pub copy_buffer_size: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            default_chunk_size: DEFAULT_CHUNK_SIZE,
            sync_on_commit: true,
            copy_buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl ContainerConfig {
    /// Parse from TOML text.
    pub fn from_toml(text: &str) -> VfsResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| VfsError::Config(e.to_string()))?;
        if config.copy_buffer_size == 0 {
            return Err(VfsError::Config("copy_buffer_size must be positive".into()));
        }
        Ok(config)
    }

    pub fn default_chunk(&self) -> ChunkSize {
        ChunkSize::from_raw(self.default_chunk_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = ContainerConfig::default();
        assert!(c.create_if_missing);
        assert!(c.sync_on_commit);
        assert_eq!(c.default_chunk_size, 8192);
        assert_eq!(c.copy_buffer_size, 64 * 1024);
        assert_eq!(c.default_chunk().bytes(), Some(8192));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = ContainerConfig::from_toml("default_chunk_size = -1\nsync_on_commit = false\n")
            .unwrap();
        assert_eq!(c.default_chunk(), ChunkSize::Unchunked);
        assert!(!c.sync_on_commit);
        assert!(c.create_if_missing);
    }

    #[test]
    fn bad_toml_is_rejected() {
        assert!(matches!(
            ContainerConfig::from_toml("create_if_missing = \"yes\""),
            Err(VfsError::Config(_))
        ));
        assert!(matches!(
            ContainerConfig::from_toml("copy_buffer_size = 0"),
            Err(VfsError::Config(_))
        ));
    }
}
