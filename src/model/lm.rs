use burn::module::Module;
use burn::tensor::Tensor;
use burn::tensor::backend::Backend;

use super::cell::{Cell, RecurrentCell};
use super::config::RecurrentLmConfig;
use super::projection::Projection;
use super::state::RecurrentState;
use crate::config::CellKind;

/// Recurrent cell plus vocabulary projection. A single instance is shared by
/// every tower.
#[derive(Module, Debug)]
pub struct RecurrentLm<B: Backend> {
    cell: Cell<B>,
    projection: Projection<B>,
}

impl<B: Backend> RecurrentLm<B> {
    pub fn new(config: RecurrentLmConfig, device: &B::Device) -> Self {
        let cell = Cell::new(
            config.cell,
            config.vocab_size,
            config.hidden_size,
            config.init_range,
            device,
        );
        let projection = Projection::new(
            config.hidden_size,
            config.vocab_size,
            config.projection_bias(),
            config.init_range,
            device,
        );
        Self { cell, projection }
    }

    pub fn cell(&self) -> &Cell<B> {
        &self.cell
    }

    pub fn projection(&self) -> &Projection<B> {
        &self.projection
    }

    pub fn kind(&self) -> CellKind {
        self.cell.kind()
    }

    pub fn vocab_size(&self) -> usize {
        self.cell.input_size()
    }

    pub fn hidden_size(&self) -> usize {
        self.cell.hidden_size()
    }

    pub fn zero_state(&self, rows: usize, device: &B::Device) -> RecurrentState<B> {
        self.cell.zero_state(rows, device)
    }

    /// One unfolding followed by the projection; returns logits.
    pub fn step_logits(
        &self,
        input: Tensor<B, 2>,
        state: RecurrentState<B>,
    ) -> (Tensor<B, 2>, RecurrentState<B>) {
        let (hidden, state) = self.cell.step(input, state);
        (self.projection.forward(hidden), state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::one_hot_rows;
    use burn::module::Module;
    use burn_ndarray::NdArray;

    type Backend = NdArray<f32>;

    #[test]
    fn parameter_counts_follow_cell_kind() {
        let device = Default::default();
        let vocab = 10;
        let hidden = 4;

        let srn = RecurrentLm::<Backend>::new(
            RecurrentLmConfig {
                cell: CellKind::Srn,
                vocab_size: vocab,
                hidden_size: hidden,
                init_range: 0.1,
            },
            &device,
        );
        assert!(!srn.projection().has_bias());
        assert_eq!(
            srn.num_params(),
            vocab * hidden + hidden * hidden + hidden * vocab
        );

        let lstm = RecurrentLm::<Backend>::new(
            RecurrentLmConfig {
                cell: CellKind::Lstm,
                vocab_size: vocab,
                hidden_size: hidden,
                init_range: 0.1,
            },
            &device,
        );
        assert!(lstm.projection().has_bias());
        assert_eq!(
            lstm.num_params(),
            4 * (vocab * hidden + hidden * hidden + hidden) + hidden * vocab + vocab
        );
    }

    #[test]
    fn step_logits_span_the_vocabulary() {
        let device = Default::default();
        let model = RecurrentLm::<Backend>::new(RecurrentLmConfig::default(), &device);
        let state = model.zero_state(2, &device);
        let input = one_hot_rows::<Backend>(&[3, 7], model.vocab_size(), &device);
        let (logits, state) = model.step_logits(input, state);
        assert_eq!(logits.dims(), [2, 64]);
        assert_eq!(state.rows(), 2);
    }
}
