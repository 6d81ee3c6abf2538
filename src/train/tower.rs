use std::thread;

use burn::tensor::Tensor;
use burn::tensor::backend::Backend;

use crate::error::{Result, TrainingError};
use crate::model::{Projection, RecurrentCell, RecurrentState};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Training,
    Validation,
}

/// Persisted recurrent state for every tower of one phase.
///
/// Slots are moved out for a tower's call and moved back afterwards, so a
/// tower never observes another tower's tensors.
#[derive(Debug)]
pub struct StateTable<B: Backend> {
    phase: Phase,
    rows: usize,
    slots: Vec<Option<RecurrentState<B>>>,
}

impl<B: Backend> StateTable<B> {
    pub fn new(phase: Phase, num_towers: usize, rows: usize) -> Self {
        Self {
            phase,
            rows,
            slots: (0..num_towers).map(|_| None).collect(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn num_towers(&self) -> usize {
        self.slots.len()
    }

    pub fn reset<C: RecurrentCell<B>>(&mut self, cell: &C, device: &B::Device) {
        for slot in &mut self.slots {
            *slot = Some(cell.zero_state(self.rows, device));
        }
    }

    pub fn get(&self, tower: usize) -> Option<&RecurrentState<B>> {
        self.slots.get(tower).and_then(Option::as_ref)
    }

    pub fn take(&mut self, tower: usize) -> Result<RecurrentState<B>> {
        self.slots
            .get_mut(tower)
            .and_then(Option::take)
            .ok_or(TrainingError::TowerFailed { tower })
    }

    pub fn put(&mut self, tower: usize, state: RecurrentState<B>) -> Result<()> {
        if state.rows() != self.rows {
            return Err(TrainingError::shape(
                format!("{:?} state of tower {tower}", self.phase),
                &[self.rows],
                &[state.rows()],
            ));
        }
        let slot = self
            .slots
            .get_mut(tower)
            .ok_or(TrainingError::TowerFailed { tower })?;
        *slot = Some(state);
        Ok(())
    }

    /// True when every slot is present and holds only zeros.
    pub fn is_zeroed(&self) -> bool {
        self.slots
            .iter()
            .all(|slot| slot.as_ref().is_some_and(RecurrentState::is_zeroed))
    }
}

/// Outputs of one tower over one optimization window.
#[derive(Debug)]
pub struct TowerWindow<B: Backend> {
    pub outputs: Vec<Tensor<B, 2>>,
    pub labels: Vec<Tensor<B, 2>>,
    pub state: RecurrentState<B>,
}

#[derive(Debug)]
pub struct TowerValidation<B: Backend> {
    pub logits: Vec<Tensor<B, 2>>,
    pub state: RecurrentState<B>,
}

/// Unrolls a cell over one tower's batch.
#[derive(Clone, Copy, Debug)]
pub struct TowerRunner {
    tower: usize,
    optimization_frequency: usize,
    vocab_size: usize,
}

impl TowerRunner {
    pub fn new(tower: usize, optimization_frequency: usize, vocab_size: usize) -> Self {
        Self {
            tower,
            optimization_frequency,
            vocab_size,
        }
    }

    /// Steps `window * f .. window * f + f` of `batch`, each paired with the
    /// following step as its label. The returned state is detached.
    pub fn run_training_window<B, C>(
        &self,
        cell: &C,
        projection: &Projection<B>,
        batch: &[Tensor<B, 2>],
        window: usize,
        state: RecurrentState<B>,
    ) -> Result<TowerWindow<B>>
    where
        B: Backend,
        C: RecurrentCell<B>,
    {
        let start = window * self.optimization_frequency;
        let needed = start + self.optimization_frequency + 1;
        if batch.len() < needed {
            return Err(TrainingError::shape(
                format!("tower {} window {window}", self.tower),
                &[needed],
                &[batch.len()],
            ));
        }

        let rows = state.rows();
        let mut state = state;
        let mut outputs = Vec::with_capacity(self.optimization_frequency);
        let mut labels = Vec::with_capacity(self.optimization_frequency);
        for step in start..start + self.optimization_frequency {
            self.check_step(&batch[step], step, rows)?;
            self.check_step(&batch[step + 1], step + 1, rows)?;

            let (hidden, next) = cell.step(batch[step].clone(), state);
            state = next;
            outputs.push(projection.forward(hidden));
            labels.push(batch[step + 1].clone());
        }

        Ok(TowerWindow {
            outputs,
            labels,
            state: state.detach(),
        })
    }

    /// Every input step of a validation batch (all but the trailing label step).
    pub fn run_validation<B, C>(
        &self,
        cell: &C,
        projection: &Projection<B>,
        batch: &[Tensor<B, 2>],
        state: RecurrentState<B>,
    ) -> Result<TowerValidation<B>>
    where
        B: Backend,
        C: RecurrentCell<B>,
    {
        if batch.len() < 2 {
            return Err(TrainingError::shape(
                format!("tower {} validation batch", self.tower),
                &[2],
                &[batch.len()],
            ));
        }

        let rows = state.rows();
        let mut state = state;
        let mut logits = Vec::with_capacity(batch.len() - 1);
        for (step, input) in batch[..batch.len() - 1].iter().enumerate() {
            self.check_step(input, step, rows)?;
            let (hidden, next) = cell.step(input.clone(), state);
            state = next;
            logits.push(projection.forward(hidden));
        }

        Ok(TowerValidation { logits, state })
    }

    fn check_step<B: Backend>(&self, tensor: &Tensor<B, 2>, step: usize, rows: usize) -> Result<()> {
        let dims = tensor.dims();
        if dims != [rows, self.vocab_size] {
            return Err(TrainingError::shape(
                format!("tower {} step {step}", self.tower),
                &[rows, self.vocab_size],
                &dims,
            ));
        }
        Ok(())
    }
}

/// Run one job per tower on its own thread and join them all before
/// returning. Results keep tower order.
pub fn parallel_towers<T, R, F>(jobs: Vec<T>, run: F) -> Result<Vec<R>>
where
    T: Send,
    R: Send,
    F: Fn(usize, T) -> Result<R> + Sync,
{
    thread::scope(|scope| {
        let run = &run;
        let handles: Vec<_> = jobs
            .into_iter()
            .enumerate()
            .map(|(tower, job)| scope.spawn(move || run(tower, job)))
            .collect();

        handles
            .into_iter()
            .enumerate()
            .map(|(tower, handle)| {
                handle
                    .join()
                    .map_err(|_| TrainingError::TowerFailed { tower })?
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallel_towers_preserves_order() {
        let results = parallel_towers(vec![10, 20, 30], |tower, value| Ok(tower * 100 + value))
            .expect("all towers succeed");
        assert_eq!(results, vec![10, 120, 230]);
    }

    #[test]
    fn first_failing_tower_is_reported() {
        let err = parallel_towers(vec![(), (), ()], |tower, _| {
            if tower == 1 {
                Err(TrainingError::config("tower one misconfigured"))
            } else {
                Ok(tower)
            }
        })
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn panicking_tower_maps_to_tower_failed() {
        let err = parallel_towers(vec![0usize, 1], |tower, _| {
            if tower == 1 {
                panic!("device lost");
            }
            Ok(tower)
        })
        .unwrap_err();
        assert_eq!(err, TrainingError::TowerFailed { tower: 1 });
    }
}
