use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainingError};

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    Srn,
    #[default]
    Lstm,
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellKind::Srn => f.write_str("srn"),
            CellKind::Lstm => f.write_str("lstm"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ModelConfig {
    #[serde(default)]
    pub cell: CellKind,
    pub hidden_size: usize,
    /// Overrides the tokenizer size when set.
    #[serde(default)]
    pub vocabulary_size: Option<usize>,
    #[serde(default = "default_init_range")]
    pub init_range: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TrainingHyperparameters {
    #[serde(alias = "num_gpus")]
    pub num_towers: usize,
    pub batch_size: usize,
    pub num_training_unfoldings: usize,
    pub num_validation_unfoldings: usize,
    pub optimization_frequency: usize,
    pub num_epochs: usize,
    #[serde(default = "default_summary_frequency")]
    pub summary_frequency: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Stop with `NumericInstability` once a reported cost is not finite.
    #[serde(default)]
    pub halt_on_non_finite_cost: bool,
}

impl TrainingHyperparameters {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("num_towers", self.num_towers),
            ("batch_size", self.batch_size),
            ("num_training_unfoldings", self.num_training_unfoldings),
            ("num_validation_unfoldings", self.num_validation_unfoldings),
            ("optimization_frequency", self.optimization_frequency),
            ("summary_frequency", self.summary_frequency),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(TrainingError::config(format!("{name} must be positive")));
            }
        }

        if !self
            .num_training_unfoldings
            .is_multiple_of(self.optimization_frequency)
        {
            return Err(TrainingError::config(format!(
                "optimization_frequency {} does not divide num_training_unfoldings {}",
                self.optimization_frequency, self.num_training_unfoldings
            )));
        }

        Ok(())
    }

    /// Optimizer calls per training batch.
    pub fn windows_per_batch(&self) -> usize {
        self.num_training_unfoldings / self.optimization_frequency.max(1)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct OptimizerConfig {
    pub learning_rate: f64,
    #[serde(default = "default_learning_decay")]
    pub learning_decay: f64,
    #[serde(default = "default_momentum")]
    pub momentum: f64,
    #[serde(default = "default_clip_norm")]
    pub clip_norm: f64,
}

impl OptimizerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(TrainingError::config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.clip_norm.is_finite() && self.clip_norm > 0.0) {
            return Err(TrainingError::config(format!(
                "clip_norm must be positive, got {}",
                self.clip_norm
            )));
        }
        if !(0.0..=1.0).contains(&self.learning_decay) || self.learning_decay == 0.0 {
            return Err(TrainingError::config(format!(
                "learning_decay must lie in (0, 1], got {}",
                self.learning_decay
            )));
        }
        if !(0.0..1.0).contains(&self.momentum) {
            return Err(TrainingError::config(format!(
                "momentum must lie in [0, 1), got {}",
                self.momentum
            )));
        }
        Ok(())
    }
}

fn default_init_range() -> f64 {
    0.1
}

fn default_summary_frequency() -> usize {
    100
}

fn default_seed() -> u64 {
    1337
}

fn default_learning_decay() -> f64 {
    0.5
}

fn default_momentum() -> f64 {
    0.9
}

fn default_clip_norm() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hyperparameters() -> TrainingHyperparameters {
        TrainingHyperparameters {
            num_towers: 2,
            batch_size: 4,
            num_training_unfoldings: 10,
            num_validation_unfoldings: 5,
            optimization_frequency: 5,
            num_epochs: 1,
            summary_frequency: 1,
            seed: 0,
            halt_on_non_finite_cost: false,
        }
    }

    #[test]
    fn optimization_frequency_must_divide_unfoldings() {
        let mut training = hyperparameters();
        assert!(training.validate().is_ok());
        assert_eq!(training.windows_per_batch(), 2);

        training.optimization_frequency = 3;
        let err = training.validate().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("does not divide"));
    }

    #[test]
    fn zero_towers_rejected() {
        let mut training = hyperparameters();
        training.num_towers = 0;
        assert!(training.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn num_gpus_alias_is_accepted() {
        let parsed: TrainingHyperparameters = toml::from_str(
            r#"
            num_gpus = 3
            batch_size = 8
            num_training_unfoldings = 6
            num_validation_unfoldings = 6
            optimization_frequency = 3
            num_epochs = 2
            "#,
        )
        .expect("parse hyperparameters");
        assert_eq!(parsed.num_towers, 3);
        assert_eq!(parsed.summary_frequency, 100);
        assert!(!parsed.halt_on_non_finite_cost);
    }

    #[test]
    fn optimizer_bounds() {
        let optimizer = OptimizerConfig {
            learning_rate: 1.0,
            learning_decay: 0.5,
            momentum: 0.9,
            clip_norm: 1.25,
        };
        assert!(optimizer.validate().is_ok());

        let bad = OptimizerConfig {
            clip_norm: 0.0,
            ..optimizer.clone()
        };
        assert!(bad.validate().is_err());

        let bad = OptimizerConfig {
            momentum: 1.0,
            ..optimizer
        };
        assert!(bad.validate().is_err());
    }
}
