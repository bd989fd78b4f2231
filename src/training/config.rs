//! Training configuration with builder pattern.
//!
//! [`TrainingConfig`] collects every knob of a growth run and is validated
//! when built.
//!
//! ```
//! use ultratree::training::{InfeasiblePolicy, TrainingConfig};
//! use ultratree::Parallelism;
//!
//! let config = TrainingConfig::builder()
//!     .exemplar_trials(200)
//!     .cost_trials(200)
//!     .context_length(4)
//!     .parallelism(Parallelism::Parallel)
//!     .infeasible(InfeasiblePolicy::Fail)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.split_trials, 100);
//! ```

use bon::Builder;

use crate::utils::Parallelism;

use super::exemplar::ExemplarParams;
use super::logger::Verbosity;
use super::split::SplitParams;

// =============================================================================
// ConfigError
// =============================================================================

/// Errors that can occur during configuration validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A trial count was zero.
    InvalidTrialCount { field: &'static str },
    /// The context window must hold at least one value.
    InvalidContextLength,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTrialCount { field } => write!(f, "{} must be at least 1", field),
            Self::InvalidContextLength => write!(f, "context_length must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {}

// =============================================================================
// InfeasiblePolicy
// =============================================================================

/// What the scheduler does with a leaf that cannot be split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InfeasiblePolicy {
    /// Leave the node a leaf and do not select it again during this run.
    #[default]
    Skip,
    /// Stop with [`TrainError::NoFeasibleSplit`](super::TrainError::NoFeasibleSplit).
    Fail,
}

// =============================================================================
// TrainingConfig
// =============================================================================

/// Configuration of a training run.
#[derive(Debug, Clone, Builder)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
pub struct TrainingConfig {
    // === Monte-Carlo search ===
    /// Candidate exemplars drawn per search. Default: 1000.
    #[builder(default = 1000)]
    pub exemplar_trials: usize,

    /// Cost samples drawn per candidate exemplar. Default: 1000.
    #[builder(default = 1000)]
    pub cost_trials: usize,

    /// Context positions drawn per split. Default: 100.
    #[builder(default = 100)]
    pub split_trials: usize,

    /// Regions drawn per context position. Default: 10.
    #[builder(default = 10)]
    pub circles_per_split: usize,

    // === Data shape ===
    /// Width of the context window. Default: 16.
    #[builder(default = 16)]
    pub context_length: usize,

    // === Scheduling ===
    /// Leaves holding fewer examples are never split. Default: 1.
    #[builder(default = 1)]
    pub min_node_size: usize,

    /// Handling of unsplittable leaves. Default: `Skip`.
    #[builder(default)]
    pub infeasible: InfeasiblePolicy,

    // === Reproducibility ===
    /// Random seed. Default: 1.
    #[builder(default = 1)]
    pub seed: u64,

    // === Resources ===
    /// Whether split trials may run on the rayon pool. Default: `Sequential`.
    #[builder(default)]
    pub parallelism: Parallelism,

    // === Logging ===
    /// Verbosity level. Default: `Silent`.
    #[builder(default)]
    pub verbosity: Verbosity,
}

impl<S: training_config_builder::IsComplete> TrainingConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a trial count or the context length is zero.
    pub fn build(self) -> Result<TrainingConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl TrainingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("exemplar_trials", self.exemplar_trials),
            ("cost_trials", self.cost_trials),
            ("split_trials", self.split_trials),
            ("circles_per_split", self.circles_per_split),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidTrialCount { field });
            }
        }
        if self.context_length == 0 {
            return Err(ConfigError::InvalidContextLength);
        }
        Ok(())
    }

    /// Parameters of one exemplar search.
    pub fn exemplar_params(&self) -> ExemplarParams {
        ExemplarParams {
            exemplar_trials: self.exemplar_trials,
            cost_trials: self.cost_trials,
        }
    }

    /// Parameters of one split search.
    pub fn split_params(&self) -> SplitParams {
        SplitParams {
            split_trials: self.split_trials,
            circles_per_split: self.circles_per_split,
            context_length: self.context_length,
            exemplar: self.exemplar_params(),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            exemplar_trials: 1000,
            cost_trials: 1000,
            split_trials: 100,
            circles_per_split: 10,
            context_length: 16,
            min_node_size: 1,
            infeasible: InfeasiblePolicy::Skip,
            seed: 1,
            parallelism: Parallelism::Sequential,
            verbosity: Verbosity::Silent,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
