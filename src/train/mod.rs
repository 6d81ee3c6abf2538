mod clip;
mod report;
mod schedule;
mod tower;
mod trainer;

pub use clip::{ClipOutcome, clip_by_global_norm, clip_scale, global_grad_norm};
pub use report::{BatchSummary, EpochReport, TracingReporter, TrainingReport, TrainingReporter};
pub use schedule::{EpochState, LearningRatePolicy, PerplexityAccumulator, perplexity};
pub use tower::{
    Phase, StateTable, TowerRunner, TowerValidation, TowerWindow, parallel_towers,
};
pub use trainer::{Trainer, TrainerConfig, TrainerPhase, TrainingOutcome};
