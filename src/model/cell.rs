use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::{Distribution, Tensor};

use super::lstm::LstmCell;
use super::srn::SrnCell;
use super::state::RecurrentState;
use crate::config::CellKind;

/// Single-step recurrent transition.
///
/// `step` maps a `(rows, input_size)` input and the previous state to a
/// `(rows, hidden_size)` representation and the next state. Projection to
/// vocabulary space is not part of the cell.
pub trait RecurrentCell<B: Backend> {
    fn kind(&self) -> CellKind;

    fn input_size(&self) -> usize;

    fn hidden_size(&self) -> usize;

    fn zero_state(&self, rows: usize, device: &B::Device) -> RecurrentState<B>;

    fn step(&self, input: Tensor<B, 2>, state: RecurrentState<B>) -> (Tensor<B, 2>, RecurrentState<B>);
}

#[derive(Module, Debug)]
pub enum Cell<B: Backend> {
    Srn(SrnCell<B>),
    Lstm(LstmCell<B>),
}

impl<B: Backend> Cell<B> {
    pub fn new(
        kind: CellKind,
        input_size: usize,
        hidden_size: usize,
        init_range: f64,
        device: &B::Device,
    ) -> Self {
        match kind {
            CellKind::Srn => Cell::Srn(SrnCell::new(input_size, hidden_size, init_range, device)),
            CellKind::Lstm => {
                Cell::Lstm(LstmCell::new(input_size, hidden_size, init_range, device))
            }
        }
    }
}

impl<B: Backend> RecurrentCell<B> for Cell<B> {
    fn kind(&self) -> CellKind {
        match self {
            Cell::Srn(cell) => cell.kind(),
            Cell::Lstm(cell) => cell.kind(),
        }
    }

    fn input_size(&self) -> usize {
        match self {
            Cell::Srn(cell) => cell.input_size(),
            Cell::Lstm(cell) => cell.input_size(),
        }
    }

    fn hidden_size(&self) -> usize {
        match self {
            Cell::Srn(cell) => cell.hidden_size(),
            Cell::Lstm(cell) => cell.hidden_size(),
        }
    }

    fn zero_state(&self, rows: usize, device: &B::Device) -> RecurrentState<B> {
        match self {
            Cell::Srn(cell) => cell.zero_state(rows, device),
            Cell::Lstm(cell) => cell.zero_state(rows, device),
        }
    }

    fn step(&self, input: Tensor<B, 2>, state: RecurrentState<B>) -> (Tensor<B, 2>, RecurrentState<B>) {
        match self {
            Cell::Srn(cell) => cell.step(input, state),
            Cell::Lstm(cell) => cell.step(input, state),
        }
    }
}

pub(crate) fn uniform_weight<B: Backend>(
    shape: [usize; 2],
    range: f64,
    device: &B::Device,
) -> Tensor<B, 2> {
    Tensor::random(shape, Distribution::Uniform(-range, range), device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::one_hot_rows;
    use burn::tensor::ElementConversion;
    use burn_ndarray::NdArray;

    type Backend = NdArray<f32>;

    #[test]
    fn weights_stay_within_init_range() {
        let device = Default::default();
        let weight = uniform_weight::<Backend>([16, 8], 0.1, &device);
        let max = weight.abs().max().into_scalar().elem::<f32>();
        assert!(max <= 0.1 + f32::EPSILON);
    }

    #[test]
    fn srn_step_keeps_single_state_tensor() {
        let device = Default::default();
        let cell = Cell::<Backend>::new(CellKind::Srn, 6, 4, 0.1, &device);
        let state = cell.zero_state(3, &device);
        assert_eq!(state.num_tensors(), 1);

        let input = one_hot_rows::<Backend>(&[0, 2, 5], 6, &device);
        let (hidden, next) = cell.step(input, state);
        assert_eq!(hidden.dims(), [3, 4]);
        assert_eq!(next.num_tensors(), 1);
        let values = hidden.into_data().into_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| *v > 0.0 && *v < 1.0));
    }

    #[test]
    fn lstm_step_carries_hidden_and_cell() {
        let device = Default::default();
        let cell = Cell::<Backend>::new(CellKind::Lstm, 6, 4, 0.1, &device);
        assert_eq!(cell.kind(), CellKind::Lstm);
        assert_eq!(cell.input_size(), 6);
        assert_eq!(cell.hidden_size(), 4);

        let state = cell.zero_state(2, &device);
        assert_eq!(state.num_tensors(), 2);
        let input = one_hot_rows::<Backend>(&[1, 3], 6, &device);
        let (hidden, next) = cell.step(input, state);
        assert_eq!(hidden.dims(), [2, 4]);
        assert_eq!(next.cell.as_ref().map(|c| c.dims()), Some([2, 4]));

        // h = o * tanh(c) with o in (0, 1)
        let max_hidden = hidden.abs().max().into_scalar().elem::<f32>();
        assert!(max_hidden < 1.0);
    }
}
