use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `REWARDS__` (e.g. `REWARDS__CLAIMS__GRACE_DAYS=14`).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub rewards: RewardsConfig,
    #[serde(default)]
    pub claims: ClaimsConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

// ─── Rewards Config ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct RewardsConfig {
    /// Upper bound on one-year steps taken in a single cycle normalization.
    #[serde(default = "default_max_rollover_iterations")]
    pub max_rollover_iterations: u32,
    #[serde(default = "default_allow_dev_reset")]
    pub allow_dev_reset: bool,
}

fn default_max_rollover_iterations() -> u32 { 100 }
fn default_allow_dev_reset() -> bool { cfg!(debug_assertions) }

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            max_rollover_iterations: default_max_rollover_iterations(),
            allow_dev_reset: default_allow_dev_reset(),
        }
    }
}

// ─── Claims Config ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ClaimsConfig {
    #[serde(default = "default_grace_days")]
    pub grace_days: u32,
    /// Exclusive upper bound on a claimed purchase amount.
    #[serde(default = "default_max_amount")]
    pub max_amount: f64,
    #[serde(default = "default_code_length")]
    pub code_length: usize,
}

fn default_grace_days() -> u32 { 30 }
fn default_max_amount() -> f64 { 10_000.0 }
fn default_code_length() -> usize { 6 }

impl Default for ClaimsConfig {
    fn default() -> Self {
        Self {
            grace_days: default_grace_days(),
            max_amount: default_max_amount(),
            code_length: default_code_length(),
        }
    }
}

// ─── Store Config ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_path() -> String {
    "rewards-store.json".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rewards: RewardsConfig::default(),
            claims: ClaimsConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("REWARDS")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    pub fn validate(&self) -> crate::RewardsResult<()> {
        if self.rewards.max_rollover_iterations == 0 {
            return Err(crate::RewardsError::Config(
                "rewards.max_rollover_iterations must be at least 1".into(),
            ));
        }
        if !(self.claims.max_amount.is_finite() && self.claims.max_amount > 0.0) {
            return Err(crate::RewardsError::Config(format!(
                "claims.max_amount must be a positive number, got {}",
                self.claims.max_amount
            )));
        }
        if self.claims.code_length == 0 {
            return Err(crate::RewardsError::Config(
                "claims.code_length must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
