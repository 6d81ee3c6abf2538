use burn::module::{Module, Param};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, activation};

use super::cell::{RecurrentCell, uniform_weight};
use super::state::RecurrentState;
use crate::config::CellKind;

/// Simple recurrent network: `h' = sigmoid(x·A + h·R)`.
#[derive(Module, Debug)]
pub struct SrnCell<B: Backend> {
    input_size: usize,
    hidden_size: usize,
    input: Param<Tensor<B, 2>>,
    recurrent: Param<Tensor<B, 2>>,
}

impl<B: Backend> SrnCell<B> {
    pub fn new(input_size: usize, hidden_size: usize, init_range: f64, device: &B::Device) -> Self {
        Self {
            input_size,
            hidden_size,
            input: Param::from_tensor(uniform_weight([input_size, hidden_size], init_range, device)),
            recurrent: Param::from_tensor(uniform_weight(
                [hidden_size, hidden_size],
                init_range,
                device,
            )),
        }
    }
}

impl<B: Backend> RecurrentCell<B> for SrnCell<B> {
    fn kind(&self) -> CellKind {
        CellKind::Srn
    }

    fn input_size(&self) -> usize {
        self.input_size
    }

    fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    fn zero_state(&self, rows: usize, device: &B::Device) -> RecurrentState<B> {
        RecurrentState::zeros(rows, self.hidden_size, false, device)
    }

    fn step(&self, input: Tensor<B, 2>, state: RecurrentState<B>) -> (Tensor<B, 2>, RecurrentState<B>) {
        let hidden = activation::sigmoid(
            input.matmul(self.input.val()) + state.hidden.matmul(self.recurrent.val()),
        );
        (hidden.clone(), RecurrentState::hidden_only(hidden))
    }
}
