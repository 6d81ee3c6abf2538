use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use burn::module::AutodiffModule;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::momentum::MomentumConfig;
use burn::optim::{GradientsParams, Optimizer, Sgd, SgdConfig};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{ElementConversion, Tensor};

use super::clip::clip_by_global_norm;
use super::report::{BatchSummary, EpochReport, TracingReporter, TrainingReport, TrainingReporter};
use super::schedule::{EpochState, LearningRatePolicy, PerplexityAccumulator};
use super::tower::{Phase, StateTable, TowerRunner, parallel_towers};
use crate::config::{OptimizerConfig, TrainingConfig, TrainingHyperparameters};
use crate::dataset::{Batch, BatchGenerator, DatasetSplit, TowerCorpora, one_hot_rows};
use crate::error::{Result, TrainingError};
use crate::model::{RecurrentLm, language_model_loss, log2_likelihood};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrainerPhase {
    Idle,
    Training,
    Validation,
    Done,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrainerConfig {
    pub training: TrainingHyperparameters,
    pub optimizer: OptimizerConfig,
}

impl TrainerConfig {
    pub fn new(training: TrainingHyperparameters, optimizer: OptimizerConfig) -> Self {
        Self {
            training,
            optimizer,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.training.validate()?;
        self.optimizer.validate()
    }
}

impl From<&TrainingConfig> for TrainerConfig {
    fn from(config: &TrainingConfig) -> Self {
        Self::new(config.training.clone(), config.optimizer.clone())
    }
}

pub struct TrainingOutcome<B: AutodiffBackend> {
    pub model: RecurrentLm<B>,
    pub report: TrainingReport,
}

type MomentumSgd<B> = OptimizerAdaptor<Sgd<<B as AutodiffBackend>::InnerBackend>, RecurrentLm<B>, B>;

struct EpochTotals {
    batches: usize,
    windows: usize,
    unstable_windows: usize,
    cost_sum: f64,
}

/// Synchronous multi-tower trainer: one shared model, one optimizer step per
/// window over the concatenated outputs of every tower.
pub struct Trainer<B: AutodiffBackend> {
    config: TrainerConfig,
    model: RecurrentLm<B>,
    optimizer: MomentumSgd<B>,
    device: B::Device,
    reporter: Box<dyn TrainingReporter>,
    cancel: Option<Arc<AtomicBool>>,
    total_batches: usize,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(config: TrainerConfig, model: RecurrentLm<B>, device: B::Device) -> Result<Self> {
        config.validate()?;
        let momentum = MomentumConfig::new()
            .with_momentum(config.optimizer.momentum)
            .with_dampening(0.0);
        let optimizer = SgdConfig::new().with_momentum(Some(momentum)).init();

        Ok(Self {
            config,
            model,
            optimizer,
            device,
            reporter: Box::new(TracingReporter),
            cancel: None,
            total_batches: 0,
        })
    }

    pub fn with_reporter(mut self, reporter: impl TrainingReporter + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn fit(mut self, corpora: &TowerCorpora) -> Result<TrainingOutcome<B>> {
        let hyper = self.config.training.clone();
        corpora.ensure_towers(hyper.num_towers)?;

        let vocab_size = self.model.vocab_size();
        let mut training_generators = build_generators(
            corpora.streams(DatasetSplit::Train),
            hyper.batch_size,
            hyper.num_training_unfoldings,
            vocab_size,
        )?;
        let mut validation_generators = build_generators(
            corpora.streams(DatasetSplit::Val),
            1,
            hyper.num_validation_unfoldings,
            vocab_size,
        )?;

        let runners: Vec<TowerRunner> = (0..hyper.num_towers)
            .map(|tower| TowerRunner::new(tower, hyper.optimization_frequency, vocab_size))
            .collect();
        let mut training_states =
            StateTable::<B>::new(Phase::Training, hyper.num_towers, hyper.batch_size);
        let mut validation_states =
            StateTable::<B::InnerBackend>::new(Phase::Validation, hyper.num_towers, 1);

        let policy = LearningRatePolicy::new(self.config.optimizer.learning_decay);
        let mut epoch_state = EpochState::initial(self.config.optimizer.learning_rate);
        let mut report = TrainingReport::default();

        tracing::info!(
            "training {} cell: towers={}, batches/epoch={}, windows/batch={}",
            self.model.kind(),
            hyper.num_towers,
            training_generators[0].num_batches(),
            hyper.windows_per_batch()
        );

        while epoch_state.epoch <= hyper.num_epochs {
            let epoch = epoch_state.epoch;
            let learning_rate = epoch_state.learning_rate;
            self.reporter.on_epoch_start(epoch, learning_rate);

            self.enter(TrainerPhase::Training);
            let totals = self.training_phase(
                epoch,
                learning_rate,
                &mut training_generators,
                &mut training_states,
                &runners,
            )?;

            self.enter(TrainerPhase::Validation);
            let perplexity =
                self.validation_phase(&mut validation_generators, &mut validation_states, &runners)?;
            self.reporter.on_validation(epoch, perplexity);

            report.epochs.push(EpochReport {
                epoch,
                learning_rate,
                mean_cost: totals.cost_sum / totals.windows.max(1) as f64,
                perplexity,
                batches: totals.batches,
                windows: totals.windows,
                unstable_windows: totals.unstable_windows,
            });
            epoch_state = epoch_state.advance(perplexity, &policy);
        }

        self.enter(TrainerPhase::Done);
        Ok(TrainingOutcome {
            model: self.model,
            report,
        })
    }

    fn training_phase(
        &mut self,
        epoch: usize,
        learning_rate: f64,
        generators: &mut [BatchGenerator],
        states: &mut StateTable<B>,
        runners: &[TowerRunner],
    ) -> Result<EpochTotals> {
        generators.iter_mut().for_each(BatchGenerator::reset);
        states.reset(self.model.cell(), &self.device);

        let num_batches = generators[0].num_batches();
        let windows_per_batch = self.config.training.windows_per_batch();
        let summary_frequency = self.config.training.summary_frequency;
        let mut totals = EpochTotals {
            batches: 0,
            windows: 0,
            unstable_windows: 0,
            cost_sum: 0.0,
        };

        for batch in 1..=num_batches {
            self.check_cancelled()?;
            let inputs: Vec<Vec<Tensor<B, 2>>> = generators
                .iter_mut()
                .map(|generator| generator.next_batch().one_hot::<B>(&self.device))
                .collect();
            self.total_batches += 1;
            totals.batches += 1;

            let mut cost = 0.0;
            for window in 0..windows_per_batch {
                let (window_cost, stable) =
                    self.train_window(epoch, batch, window, learning_rate, &inputs, states, runners)?;
                cost = window_cost;
                totals.cost_sum += window_cost;
                totals.windows += 1;
                if !stable {
                    totals.unstable_windows += 1;
                }
            }

            if batch.is_multiple_of(summary_frequency) {
                self.reporter.on_batch(&BatchSummary {
                    epoch,
                    total_batches: self.total_batches,
                    batch,
                    cost,
                });
                if !cost.is_finite() && self.config.training.halt_on_non_finite_cost {
                    return Err(TrainingError::NumericInstability { epoch, batch, cost });
                }
            }
        }

        Ok(totals)
    }

    /// Returns the window cost and whether the gradient norm was finite.
    #[allow(clippy::too_many_arguments)]
    fn train_window(
        &mut self,
        epoch: usize,
        batch: usize,
        window: usize,
        learning_rate: f64,
        inputs: &[Vec<Tensor<B, 2>>],
        states: &mut StateTable<B>,
        runners: &[TowerRunner],
    ) -> Result<(f64, bool)> {
        let mut jobs = Vec::with_capacity(runners.len());
        for (tower, steps) in inputs.iter().enumerate() {
            jobs.push((self.model.clone(), steps.clone(), states.take(tower)?));
        }

        let windows = parallel_towers(jobs, |tower, (model, steps, state)| {
            runners[tower].run_training_window(model.cell(), model.projection(), &steps, window, state)
        })?;

        let f = self.config.training.optimization_frequency;
        let mut outputs = Vec::with_capacity(runners.len() * f);
        let mut labels = Vec::with_capacity(runners.len() * f);
        for (tower, result) in windows.into_iter().enumerate() {
            outputs.extend(result.outputs);
            labels.extend(result.labels);
            states.put(tower, result.state)?;
        }

        let loss = language_model_loss(Tensor::cat(outputs, 0), Tensor::cat(labels, 0));
        let cost = loss.clone().into_scalar().elem::<f64>();
        let grads = GradientsParams::from_grads(loss.backward(), &self.model);
        let (grads, clip) = clip_by_global_norm::<B, _>(&self.model, grads, self.config.optimizer.clip_norm);
        if !clip.is_finite() {
            self.reporter
                .on_gradient_norm_overflow(epoch, batch, window, &clip);
        }

        self.model = self.optimizer.step(learning_rate, self.model.clone(), grads);
        Ok((cost, clip.is_finite()))
    }

    fn validation_phase(
        &mut self,
        generators: &mut [BatchGenerator],
        states: &mut StateTable<B::InnerBackend>,
        runners: &[TowerRunner],
    ) -> Result<f64> {
        let model = self.model.valid();
        generators.iter_mut().for_each(BatchGenerator::reset);
        states.reset(model.cell(), &self.device);

        let num_batches = generators[0].num_batches();
        let mut accumulator = PerplexityAccumulator::default();
        for _ in 0..num_batches {
            self.check_cancelled()?;
            let batches: Vec<Batch> = generators.iter_mut().map(BatchGenerator::next_batch).collect();

            let mut jobs = Vec::with_capacity(batches.len());
            for (tower, batch) in batches.iter().enumerate() {
                let steps = batch.one_hot::<B::InnerBackend>(&self.device);
                jobs.push((model.clone(), steps, states.take(tower)?));
            }
            let results = parallel_towers(jobs, |tower, (model, steps, state)| {
                runners[tower].run_validation(model.cell(), model.projection(), &steps, state)
            })?;

            for (tower, (result, batch)) in results.into_iter().zip(&batches).enumerate() {
                let observations = result.logits.len() * batch.rows();
                let label_tokens: Vec<u32> = batch.steps()[1..].iter().flatten().copied().collect();
                let labels = one_hot_rows::<B::InnerBackend>(&label_tokens, batch.vocab_size(), &self.device);
                let log2_sum = log2_likelihood(Tensor::cat(result.logits, 0), labels)
                    .into_scalar()
                    .elem::<f64>();
                accumulator.add(log2_sum, observations);
                states.put(tower, result.state)?;
            }
        }

        accumulator
            .perplexity()
            .ok_or_else(|| TrainingError::config("validation produced no observations"))
    }

    fn enter(&mut self, phase: TrainerPhase) {
        self.reporter.on_phase(phase);
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(TrainingError::Cancelled),
            _ => Ok(()),
        }
    }
}

fn build_generators(
    streams: &[Vec<u32>],
    rows: usize,
    num_unfoldings: usize,
    vocab_size: usize,
) -> Result<Vec<BatchGenerator>> {
    streams
        .iter()
        .enumerate()
        .map(|(tower, tokens)| {
            BatchGenerator::new(tower, tokens.clone(), rows, num_unfoldings, vocab_size)
        })
        .collect()
}
