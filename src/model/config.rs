use crate::config::{CellKind, ModelConfig};
use crate::error::{Result, TrainingError};

#[derive(Clone, Debug, PartialEq)]
pub struct RecurrentLmConfig {
    pub cell: CellKind,
    pub vocab_size: usize,
    pub hidden_size: usize,
    pub init_range: f64,
}

impl Default for RecurrentLmConfig {
    fn default() -> Self {
        Self {
            cell: CellKind::Lstm,
            vocab_size: 64,
            hidden_size: 64,
            init_range: 0.1,
        }
    }
}

impl RecurrentLmConfig {
    pub fn validate(&self) -> Result<()> {
        if self.vocab_size == 0 || self.hidden_size == 0 {
            return Err(TrainingError::config(format!(
                "vocab_size ({}) and hidden_size ({}) must be positive",
                self.vocab_size, self.hidden_size
            )));
        }
        if !(self.init_range.is_finite() && self.init_range > 0.0) {
            return Err(TrainingError::config(format!(
                "init_range must be positive, got {}",
                self.init_range
            )));
        }
        Ok(())
    }

    /// Only the gated cell projects with a bias; the SRN output is `h·U`.
    pub fn projection_bias(&self) -> bool {
        matches!(self.cell, CellKind::Lstm)
    }
}

/// Resolve the file-level model section against the tokenizer's size.
pub fn build_model_config(model: &ModelConfig, tokenizer_len: usize) -> RecurrentLmConfig {
    RecurrentLmConfig {
        cell: model.cell,
        vocab_size: model.vocabulary_size.unwrap_or(tokenizer_len),
        hidden_size: model.hidden_size,
        init_range: model.init_range,
    }
}
