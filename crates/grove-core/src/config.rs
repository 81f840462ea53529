//! Engine configuration
//!
//! Loaded from TOML, every field optional:
//!
//! ```toml
//! points_per_stage = 50
//! total_stages = 5
//! points_per_correct = 10
//! coins_per_correct = 5
//! submit_timeout_secs = 10
//! backend = "fallback"          # remote | offline | fallback
//! view_cache_capacity = 1000
//! view_cache_ttl_secs = 300     # 0 disables expiry
//! ```

use grove_ledger::GrowthRules;
use grove_reward::RewardRates;
use grove_sync::ViewCache;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Not valid TOML for this config
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Could not render TOML
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Values out of range
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Where submissions go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// Only the remote service
    Remote,
    /// Only the bundled offline backend
    Offline,
    /// Remote, falling back to offline when unreachable
    #[default]
    Fallback,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Growth points per stage
    pub points_per_stage: u32,
    /// Number of stages
    pub total_stages: u32,
    /// Growth points per correct answer
    pub points_per_correct: u32,
    /// Coins per correct answer
    pub coins_per_correct: u32,
    /// Submission timeout in seconds
    pub submit_timeout_secs: u64,
    /// Backend selection
    pub backend: BackendMode,
    /// Maximum cached views
    pub view_cache_capacity: u64,
    /// View expiry in seconds; 0 keeps views until invalidated
    pub view_cache_ttl_secs: u64,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With growth rules
    #[inline]
    #[must_use]
    pub fn with_growth(mut self, points_per_stage: u32, total_stages: u32) -> Self {
        self.points_per_stage = points_per_stage;
        self.total_stages = total_stages;
        self
    }

    /// With reward rates
    #[inline]
    #[must_use]
    pub fn with_rates(mut self, points_per_correct: u32, coins_per_correct: u32) -> Self {
        self.points_per_correct = points_per_correct;
        self.coins_per_correct = coins_per_correct;
        self
    }

    /// With submission timeout, rounded up to whole seconds
    #[inline]
    #[must_use]
    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout_secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
        self
    }

    /// With backend mode
    #[inline]
    #[must_use]
    pub fn with_backend(mut self, backend: BackendMode) -> Self {
        self.backend = backend;
        self
    }

    /// With view cache sizing
    #[inline]
    #[must_use]
    pub fn with_view_cache(mut self, capacity: u64, ttl: Option<Duration>) -> Self {
        self.view_cache_capacity = capacity;
        self.view_cache_ttl_secs = ttl.map_or(0, |t| t.as_secs());
        self
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// `Parse` or `Invalid`
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// `Io`, `Parse` or `Invalid`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Render as TOML
    ///
    /// # Errors
    /// `Serialize`
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// `Invalid` naming the first bad field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.points_per_stage == 0 {
            return Err(ConfigError::Invalid("points_per_stage must be > 0".into()));
        }
        if self.total_stages == 0 {
            return Err(ConfigError::Invalid("total_stages must be > 0".into()));
        }
        if self.submit_timeout_secs == 0 {
            return Err(ConfigError::Invalid("submit_timeout_secs must be > 0".into()));
        }
        if self.view_cache_capacity == 0 {
            return Err(ConfigError::Invalid("view_cache_capacity must be > 0".into()));
        }
        Ok(())
    }

    /// Growth rules
    ///
    /// # Errors
    /// `Invalid` when points per stage or stages are zero
    pub fn growth_rules(&self) -> Result<GrowthRules, ConfigError> {
        GrowthRules::new(self.points_per_stage, self.total_stages)
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Reward rates
    #[inline]
    #[must_use]
    pub fn reward_rates(&self) -> RewardRates {
        RewardRates::new(self.points_per_correct, self.coins_per_correct)
    }

    /// Submission timeout
    #[inline]
    #[must_use]
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }

    /// View cache as configured
    #[must_use]
    pub fn view_cache(&self) -> ViewCache {
        match self.view_cache_ttl_secs {
            0 => ViewCache::new(self.view_cache_capacity),
            ttl => ViewCache::with_ttl(self.view_cache_capacity, Duration::from_secs(ttl)),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            points_per_stage: 50,
            total_stages: 5,
            points_per_correct: 10,
            coins_per_correct: 5,
            submit_timeout_secs: 10,
            backend: BackendMode::Fallback,
            view_cache_capacity: 1_000,
            view_cache_ttl_secs: 300,
        }
    }
}
