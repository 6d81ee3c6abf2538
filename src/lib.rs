#![recursion_limit = "256"]

pub mod config;
pub mod dataset;
pub mod error;
pub mod model;
pub mod tokenizer;
pub mod train;
#[cfg(feature = "wgpu")]
pub mod wgpu;

pub use config::{
    CellKind, DatasetConfig, DatasetSourceConfig, ModelConfig, OptimizerConfig, TrainingConfig,
    TrainingHyperparameters, load_training_config,
};
pub use dataset::{Batch, BatchGenerator, DatasetSplit, TowerCorpora, load_corpus};
pub use error::{Result, TrainingError};
pub use model::{
    Cell, RecurrentCell, RecurrentLm, RecurrentLmConfig, RecurrentState, build_model_config,
    language_model_loss,
};
pub use tokenizer::CharVocab;
pub use train::{
    EpochReport, TracingReporter, Trainer, TrainerConfig, TrainerPhase, TrainingOutcome,
    TrainingReport, TrainingReporter,
};
