use tracing::{info, warn};

use super::clip::ClipOutcome;
use super::trainer::TrainerPhase;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BatchSummary {
    pub epoch: usize,
    pub total_batches: usize,
    pub batch: usize,
    pub cost: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpochReport {
    pub epoch: usize,
    pub learning_rate: f64,
    pub mean_cost: f64,
    pub perplexity: f64,
    pub batches: usize,
    pub windows: usize,
    pub unstable_windows: usize,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainingReport {
    pub epochs: Vec<EpochReport>,
}

impl TrainingReport {
    pub fn last(&self) -> Option<&EpochReport> {
        self.epochs.last()
    }

    pub fn perplexities(&self) -> Vec<f64> {
        self.epochs.iter().map(|epoch| epoch.perplexity).collect()
    }

    pub fn learning_rates(&self) -> Vec<f64> {
        self.epochs.iter().map(|epoch| epoch.learning_rate).collect()
    }
}

/// Observer of the training loop. Every hook has a no-op default.
pub trait TrainingReporter: Send {
    fn on_phase(&mut self, _phase: TrainerPhase) {}

    fn on_epoch_start(&mut self, _epoch: usize, _learning_rate: f64) {}

    fn on_batch(&mut self, _summary: &BatchSummary) {}

    /// Called for a window whose global gradient norm was not finite.
    fn on_gradient_norm_overflow(&mut self, _epoch: usize, _batch: usize, _window: usize, _clip: &ClipOutcome) {}

    fn on_validation(&mut self, _epoch: usize, _perplexity: f64) {}
}

/// Writes progress through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReporter;

impl TrainingReporter for TracingReporter {
    fn on_phase(&mut self, phase: TrainerPhase) {
        tracing::debug!("trainer phase: {phase:?}");
    }

    fn on_epoch_start(&mut self, epoch: usize, learning_rate: f64) {
        info!("Epoch: {epoch}  Learning Rate: {learning_rate:.2}");
    }

    fn on_batch(&mut self, summary: &BatchSummary) {
        info!(
            "Total Batches: {}  Current Batch: {}  Cost: {:.2}",
            summary.total_batches, summary.batch, summary.cost
        );
    }

    fn on_gradient_norm_overflow(&mut self, epoch: usize, batch: usize, window: usize, clip: &ClipOutcome) {
        warn!(
            "non-finite gradient norm {} at epoch {epoch}, batch {batch}, window {window}",
            clip.global_norm
        );
    }

    fn on_validation(&mut self, epoch: usize, perplexity: f64) {
        info!("Epoch: {epoch}  Validation Set Perplexity: {perplexity:.2}");
    }
}
