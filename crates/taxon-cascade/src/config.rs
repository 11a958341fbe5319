//! # Cascade Configuration
//!
//! Configuration for the cache, the propagator and the deletion guard.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TAXON_CACHE_TTL_SECS=60                                            │
//! │     TAXON_BATCH_SIZE=25                                                │
//! │     TAXON_CASCADE_TIMEOUT_MS=5000                                      │
//! │     TAXON_SUBCATEGORY_DELETE_POLICY=reject                             │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/taxon/taxon.toml (Linux)                                 │
//! │     ~/Library/Application Support/com.taxon.taxon/taxon.toml (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     ttl 600s, batch 50, no timeout, reassign to category               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # taxon.toml
//! [cache]
//! ttl_secs = 600        # 0 disables caching
//!
//! [cascade]
//! batch_size = 50
//! timeout_ms = 5000     # omit for no deadline
//!
//! [deletion]
//! sub_category_policy = "reassign_to_category"  # or "reject"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{CascadeError, CascadeResult};
use taxon_core::{DEFAULT_BATCH_SIZE, DEFAULT_CACHE_TTL_SECS};

// =============================================================================
// SubCategory Delete Policy
// =============================================================================

/// What happens to the items of a subcategory that is being deleted.
///
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  REASSIGN_TO_CATEGORY (Default)     │  REJECT                          │
/// │  ──────────────────────────────     │  ──────                          │
/// │  • Items lose sub_category_id       │  • HasChildren if any item       │
/// │  • Items now inherit from category  │    points at the subcategory     │
/// │  • Their totals are recomputed      │  • Nothing is modified           │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubCategoryDeletePolicy {
    /// Refuse to delete a subcategory that still has items.
    Reject,

    /// Move the items up to the category, then delete.
    #[default]
    ReassignToCategory,
}

impl std::fmt::Display for SubCategoryDeletePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubCategoryDeletePolicy::Reject => write!(f, "reject"),
            SubCategoryDeletePolicy::ReassignToCategory => write!(f, "reassign_to_category"),
        }
    }
}

impl std::str::FromStr for SubCategoryDeletePolicy {
    type Err = CascadeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reject" | "fail" => Ok(SubCategoryDeletePolicy::Reject),
            "reassign_to_category" | "reassign" => Ok(SubCategoryDeletePolicy::ReassignToCategory),
            other => Err(CascadeError::InvalidConfig(format!(
                "Unknown subcategory delete policy: '{}'. Valid options: reject, reassign_to_category",
                other
            ))),
        }
    }
}

// =============================================================================
// Sections
// =============================================================================

/// Tax cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Lifetime of a cached descriptor (seconds). 0 disables caching.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            ttl_secs: default_ttl_secs(),
        }
    }
}

/// Propagator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationSettings {
    /// Items recomputed concurrently per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Deadline for a whole cascade (milliseconds). None means no deadline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl Default for PropagationSettings {
    fn default() -> Self {
        PropagationSettings {
            batch_size: default_batch_size(),
            timeout_ms: None,
        }
    }
}

/// Deletion guard settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionSettings {
    #[serde(default)]
    pub sub_category_policy: SubCategoryDeletePolicy,
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeConfig {
    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub cascade: PropagationSettings,

    #[serde(default)]
    pub deletion: DeletionSettings,
}

impl CascadeConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (taxon.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> CascadeResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading cascade config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load cascade config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> CascadeResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| CascadeError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Cascade config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> CascadeResult<()> {
        if self.cascade.batch_size == 0 {
            return Err(CascadeError::InvalidConfig(
                "batch_size must be greater than 0".into(),
            ));
        }

        if self.cascade.timeout_ms == Some(0) {
            return Err(CascadeError::InvalidConfig(
                "timeout_ms must be greater than 0 when set".into(),
            ));
        }

        Ok(())
    }

    /// Applies `TAXON_*` overrides read through `lookup`.
    ///
    /// Unparseable values are logged and ignored.
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ttl) = lookup("TAXON_CACHE_TTL_SECS") {
            match ttl.parse::<u64>() {
                Ok(secs) => {
                    debug!(ttl_secs = secs, "Overriding cache TTL from environment");
                    self.cache.ttl_secs = secs;
                }
                Err(_) => warn!(value = %ttl, "Invalid TAXON_CACHE_TTL_SECS"),
            }
        }

        if let Some(size) = lookup("TAXON_BATCH_SIZE") {
            match size.parse::<usize>() {
                Ok(n) => {
                    debug!(batch_size = n, "Overriding batch size from environment");
                    self.cascade.batch_size = n;
                }
                Err(_) => warn!(value = %size, "Invalid TAXON_BATCH_SIZE"),
            }
        }

        if let Some(timeout) = lookup("TAXON_CASCADE_TIMEOUT_MS") {
            match timeout.parse::<u64>() {
                Ok(ms) => {
                    debug!(timeout_ms = ms, "Overriding cascade timeout from environment");
                    self.cascade.timeout_ms = Some(ms);
                }
                Err(_) => warn!(value = %timeout, "Invalid TAXON_CASCADE_TIMEOUT_MS"),
            }
        }

        if let Some(policy) = lookup("TAXON_SUBCATEGORY_DELETE_POLICY") {
            match policy.parse() {
                Ok(parsed) => {
                    debug!(policy = %policy, "Overriding subcategory delete policy from environment");
                    self.deletion.sub_category_policy = parsed;
                }
                Err(e) => warn!("{}", e),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "taxon", "taxon")
            .map(|dirs| dirs.config_dir().join("taxon.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Cache TTL as a Duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    /// Items per batch.
    pub fn batch_size(&self) -> usize {
        self.cascade.batch_size
    }

    /// Cascade deadline, if any.
    pub fn cascade_timeout(&self) -> Option<Duration> {
        self.cascade.timeout_ms.map(Duration::from_millis)
    }

    /// Policy applied when deleting a subcategory.
    pub fn sub_category_policy(&self) -> SubCategoryDeletePolicy {
        self.deletion.sub_category_policy
    }

    /// Builder-style setter for the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.cascade.batch_size = batch_size;
        self
    }

    /// Builder-style setter for the cascade deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.cascade.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Builder-style setter for the cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache.ttl_secs = ttl.as_secs();
        self
    }

    /// Builder-style setter for the subcategory delete policy.
    pub fn with_sub_category_policy(mut self, policy: SubCategoryDeletePolicy) -> Self {
        self.deletion.sub_category_policy = policy;
        self
    }
}
