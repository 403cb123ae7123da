use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_goal_count() -> usize {
    1
}
const fn default_true() -> bool {
    true
}
const fn default_backup_dist() -> f64 {
    0.01
}
const fn default_weight() -> f64 {
    1.5
}
const fn default_log_likelihood_threshold() -> f64 {
    0.5
}

// ---------------------------------------------------------------------------
// GraspFilter
// ---------------------------------------------------------------------------

/// Which grasps a grasp model should enumerate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraspFilter {
    /// Run an IK feasibility check per grasp while enumerating. Slow; the
    /// search does its own IK per placement so this is off by default.
    #[serde(default)]
    pub check_ik: bool,

    /// Distance (meters) the gripper is backed off along its approach
    /// direction when checking a grasp for collisions.
    #[serde(default = "default_backup_dist")]
    pub backup_dist: f64,
}

impl Default for GraspFilter {
    fn default() -> Self {
        Self {
            check_ik: false,
            backup_dist: default_backup_dist(),
        }
    }
}

// ---------------------------------------------------------------------------
// DistributionOptions
// ---------------------------------------------------------------------------

/// Options forwarded to the reachability model when building base
/// distributions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionOptions {
    /// Sharpness applied to the learned densities.
    #[serde(default = "default_weight")]
    pub weight: f64,

    /// Placements whose log-likelihood falls below this are not proposed.
    #[serde(default = "default_log_likelihood_threshold")]
    pub log_likelihood_threshold: f64,
}

impl Default for DistributionOptions {
    fn default() -> Self {
        Self {
            weight: default_weight(),
            log_likelihood_threshold: default_log_likelihood_threshold(),
        }
    }
}

// ---------------------------------------------------------------------------
// SearchConfig
// ---------------------------------------------------------------------------

/// Placement search configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of goals collected by a batch search (default: 1).
    #[serde(default = "default_goal_count")]
    pub goal_count: usize,

    /// Wall-clock budget of a batch search in seconds. `None` = no limit.
    #[serde(default)]
    pub collect_timeout_secs: Option<f64>,

    /// Maximum time without an accepted solution before a search stream
    /// gives up, in seconds. `None` = never give up.
    #[serde(default)]
    pub giveup_time_secs: Option<f64>,

    /// Enumerate grasps in random order.
    #[serde(default)]
    pub random_grasps: bool,

    /// Draw placements randomly instead of in likelihood order.
    #[serde(default)]
    pub random_placement: bool,

    /// Retry failed IK without environment checking to tell unreachable
    /// placements apart from obstructed ones.
    #[serde(default = "default_true")]
    pub classify_failures: bool,

    /// Root seed for source selection and grasp shuffling.
    #[serde(default)]
    pub seed: u64,

    #[serde(default)]
    pub grasp_filter: GraspFilter,

    #[serde(default)]
    pub distribution: DistributionOptions,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            goal_count: default_goal_count(),
            collect_timeout_secs: None,
            giveup_time_secs: None,
            random_grasps: false,
            random_placement: false,
            classify_failures: true,
            seed: 0,
            grasp_filter: GraspFilter::default(),
            distribution: DistributionOptions::default(),
        }
    }
}

impl SearchConfig {
    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.goal_count == 0 {
            return Err(invalid("goal_count", "must be >= 1"));
        }
        check_positive_secs("collect_timeout_secs", self.collect_timeout_secs)?;
        check_positive_secs("giveup_time_secs", self.giveup_time_secs)?;
        if !self.grasp_filter.backup_dist.is_finite() || self.grasp_filter.backup_dist < 0.0 {
            return Err(invalid(
                "grasp_filter.backup_dist",
                "must be finite and >= 0",
            ));
        }
        if !self.distribution.weight.is_finite() || self.distribution.weight <= 0.0 {
            return Err(invalid("distribution.weight", "must be finite and > 0"));
        }
        Ok(())
    }

    /// Batch search budget.
    pub fn collect_timeout(&self) -> Option<Duration> {
        self.collect_timeout_secs.and_then(secs_to_duration)
    }

    /// Stream give-up window.
    pub fn giveup_time(&self) -> Option<Duration> {
        self.giveup_time_secs.and_then(secs_to_duration)
    }

    /// Builder: set the give-up window.
    #[must_use]
    pub fn with_giveup_time(mut self, giveup: Option<Duration>) -> Self {
        self.giveup_time_secs = giveup.map(|d| d.as_secs_f64());
        self
    }

    /// Builder: set the root seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builder: choose grasp and placement ordering.
    #[must_use]
    pub const fn with_randomization(mut self, random_grasps: bool, random_placement: bool) -> Self {
        self.random_grasps = random_grasps;
        self.random_placement = random_placement;
        self
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}

fn check_positive_secs(field: &str, secs: Option<f64>) -> Result<(), ConfigError> {
    match secs {
        Some(s) if !s.is_finite() || s <= 0.0 => Err(invalid(field, "must be finite and > 0")),
        Some(s) => Duration::try_from_secs_f64(s)
            .map(|_| ())
            .map_err(|err| invalid(field, &err.to_string())),
        None => Ok(()),
    }
}

/// `None` for values `validate` rejects.
fn secs_to_duration(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs).ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
