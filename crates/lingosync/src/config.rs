//! # Configuration
//!
//! Engine settings are declared with [`confique`] and loaded in layers:
//!
//! 1. **Environment variables**: `LINGOSYNC_FILE_CACHE_SIZE`, `LINGOSYNC_STATS_TTL_SECS`, ...
//! 2. **Project Config**: `<project>/lingosync.toml`.
//! 3. **Compiled Defaults**: `#[config(default = ...)]`.
//!
//! Library callers and tests usually start from [`SyncConfig::default()`].
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `file_cache_size` | `64` | Parsed files kept in the LRU cache |
//! | `stats_ttl_secs` | `3600` | Lifetime of a cached statistics entry |
//! | `pending_suffix` | `.pending` | Suffix of the suggestion side file |
//! | `tm_suffix` | `.tm` | Suffix of the translation-memory side file |
//! | `index_dir` | `.translation_index` | Search index directory inside the project |
//! | `db_dir` | `.lingosync` | Projection database directory inside the project |
//! | `indexing_enabled` | `true` | Maintain the search index on mutation |
//! | `cache.project_segment` | `2` | Path segment naming the project in cache keys |
//! | `cache.max_invalidation_depth` | unset | Ancestor levels walked on invalidation |

use crate::error::Result;
use confique::Config;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "lingosync.toml";

/// Settings for the statistics cache key scheme.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Index of the path segment that names the project (`/projects/<segment>/`).
    #[config(default = 2, env = "LINGOSYNC_CACHE_PROJECT_SEGMENT")]
    pub project_segment: usize,

    /// How many ancestor directories are invalidated above a store. Unset walks to the root.
    #[config(env = "LINGOSYNC_CACHE_MAX_INVALIDATION_DEPTH")]
    pub max_invalidation_depth: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            project_segment: 2,
            max_invalidation_depth: None,
        }
    }
}

/// Configuration for a translation project, stored in `lingosync.toml`.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    #[config(default = 64, env = "LINGOSYNC_FILE_CACHE_SIZE")]
    pub file_cache_size: usize,

    #[config(default = 3600, env = "LINGOSYNC_STATS_TTL_SECS")]
    pub stats_ttl_secs: u64,

    #[config(default = ".pending", env = "LINGOSYNC_PENDING_SUFFIX")]
    pub pending_suffix: String,

    #[config(default = ".tm", env = "LINGOSYNC_TM_SUFFIX")]
    pub tm_suffix: String,

    #[config(default = ".translation_index", env = "LINGOSYNC_INDEX_DIR")]
    pub index_dir: String,

    #[config(default = ".lingosync", env = "LINGOSYNC_DB_DIR")]
    pub db_dir: String,

    #[config(default = true, env = "LINGOSYNC_INDEXING_ENABLED")]
    pub indexing_enabled: bool,

    #[config(nested)]
    pub cache: CacheConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            file_cache_size: 64,
            stats_ttl_secs: 3600,
            pending_suffix: ".pending".to_string(),
            tm_suffix: ".tm".to_string(),
            index_dir: ".translation_index".to_string(),
            db_dir: ".lingosync".to_string(),
            indexing_enabled: true,
            cache: CacheConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Loads the layered configuration for the project rooted at `project_root`.
    pub fn load(project_root: &Path) -> Result<Self> {
        let config = SyncConfig::builder()
            .env()
            .file(project_root.join(CONFIG_FILE_NAME))
            .load()?;
        Ok(config)
    }

    pub fn stats_ttl(&self) -> Duration {
        Duration::from_secs(self.stats_ttl_secs)
    }

    /// Suffixes that mark side files rather than primary translation files.
    pub fn side_suffixes(&self) -> [&str; 2] {
        [self.pending_suffix.as_str(), self.tm_suffix.as_str()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.file_cache_size, 64);
        assert_eq!(config.stats_ttl(), Duration::from_secs(3600));
        assert_eq!(config.side_suffixes(), [".pending", ".tm"]);
        assert_eq!(config.cache.project_segment, 2);
        assert!(config.cache.max_invalidation_depth.is_none());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = SyncConfig::load(dir.path()).unwrap();
        assert_eq!(config.index_dir, ".translation_index");
        assert_eq!(config.db_dir, ".lingosync");
        assert!(config.indexing_enabled);
    }

    #[test]
    fn test_load_reads_project_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "file_cache_size = 4\nindexing_enabled = false\n\n[cache]\nmax_invalidation_depth = 1\n",
        )
        .unwrap();

        let config = SyncConfig::load(dir.path()).unwrap();
        assert_eq!(config.file_cache_size, 4);
        assert!(!config.indexing_enabled);
        assert_eq!(config.cache.max_invalidation_depth, Some(1));
        assert_eq!(config.pending_suffix, ".pending");
    }

    #[test]
    fn test_config_serializes_to_toml() {
        let text = toml::to_string(&SyncConfig::default()).unwrap();
        assert!(text.contains("file_cache_size = 64"));
        assert!(text.contains("[cache]"));
    }
}
