//! Configuration service implementation.
//!
//! Loads the root configuration from `~/.config/aduana/config.toml` and
//! caches it. TTL windows per report kind and the planner model names are
//! configuration, never constants at call sites.

use aduana_core::report::TtlConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::warn;

/// Model names for the LLM planner tiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Model for the primary chat-completions tier.
    pub openai_model: Option<String>,
    /// Model for the secondary tier.
    pub gemini_model: Option<String>,
}

/// Root configuration for the report layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AduanaConfig {
    pub ttl: TtlConfig,
    pub planner: PlannerConfig,
}

/// Configuration service that loads and caches the root configuration.
///
/// The cache is explicit and owned by this service, with no module-level
/// globals. `invalidate_cache` forces a reload on next access.
#[derive(Debug, Clone)]
pub struct ConfigService {
    config: Arc<RwLock<Option<AduanaConfig>>>,
}

impl ConfigService {
    /// Creates a new ConfigService; the file is read lazily on first
    /// access.
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Gets the root configuration, loading from file if not cached.
    ///
    /// A missing or empty config file yields the defaults; a file that
    /// exists but does not parse is a logged deviation, also yielding the
    /// defaults rather than failing the caller.
    pub fn get_config(&self) -> AduanaConfig {
        {
            let read_lock = self.config.read().unwrap();
            if let Some(ref cached) = *read_lock {
                return cached.clone();
            }
        }

        let loaded = Self::load_config().unwrap_or_else(|e| {
            warn!(error = %e, "failed to load config.toml, using defaults");
            AduanaConfig::default()
        });

        {
            let mut write_lock = self.config.write().unwrap();
            *write_lock = Some(loaded.clone());
        }

        loaded
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut write_lock = self.config.write().unwrap();
        *write_lock = None;
    }

    fn load_config() -> Result<AduanaConfig, String> {
        let Some(config_path) = Self::config_path() else {
            return Ok(AduanaConfig::default());
        };
        if !config_path.exists() {
            return Ok(AduanaConfig::default());
        }

        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| format!("failed to read {config_path:?}: {e}"))?;
        if content.trim().is_empty() {
            return Ok(AduanaConfig::default());
        }

        toml::from_str(&content).map_err(|e| format!("failed to parse {config_path:?}: {e}"))
    }

    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("aduana").join("config.toml"))
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}
