pub mod core;
pub mod train;

pub use core::{CellKind, ModelConfig, OptimizerConfig, TrainingHyperparameters};
pub use train::{DatasetConfig, DatasetSourceConfig, TrainingConfig, load_training_config};
