use burn::module::{Module, Param};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, activation};

use super::cell::{RecurrentCell, uniform_weight};
use super::state::RecurrentState;
use crate::config::CellKind;

/// One LSTM gate: `x·W + h·U + b`, activation applied by the caller.
#[derive(Module, Debug)]
pub struct LstmGate<B: Backend> {
    input: Param<Tensor<B, 2>>,
    recurrent: Param<Tensor<B, 2>>,
    bias: Param<Tensor<B, 1>>,
}

impl<B: Backend> LstmGate<B> {
    fn new(input_size: usize, hidden_size: usize, init_range: f64, device: &B::Device) -> Self {
        Self {
            input: Param::from_tensor(uniform_weight([input_size, hidden_size], init_range, device)),
            recurrent: Param::from_tensor(uniform_weight(
                [hidden_size, hidden_size],
                init_range,
                device,
            )),
            bias: Param::from_tensor(Tensor::zeros([hidden_size], device)),
        }
    }

    fn pre_activation(&self, input: Tensor<B, 2>, hidden: Tensor<B, 2>) -> Tensor<B, 2> {
        input.matmul(self.input.val())
            + hidden.matmul(self.recurrent.val())
            + self.bias.val().unsqueeze_dim::<2>(0)
    }
}

#[derive(Module, Debug)]
pub struct LstmCell<B: Backend> {
    input_size: usize,
    hidden_size: usize,
    forget: LstmGate<B>,
    input_gate: LstmGate<B>,
    output: LstmGate<B>,
    update: LstmGate<B>,
}

impl<B: Backend> LstmCell<B> {
    pub fn new(input_size: usize, hidden_size: usize, init_range: f64, device: &B::Device) -> Self {
        let gate = || LstmGate::new(input_size, hidden_size, init_range, device);
        Self {
            input_size,
            hidden_size,
            forget: gate(),
            input_gate: gate(),
            output: gate(),
            update: gate(),
        }
    }
}

impl<B: Backend> RecurrentCell<B> for LstmCell<B> {
    fn kind(&self) -> CellKind {
        CellKind::Lstm
    }

    fn input_size(&self) -> usize {
        self.input_size
    }

    fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    fn zero_state(&self, rows: usize, device: &B::Device) -> RecurrentState<B> {
        RecurrentState::zeros(rows, self.hidden_size, true, device)
    }

    fn step(&self, input: Tensor<B, 2>, state: RecurrentState<B>) -> (Tensor<B, 2>, RecurrentState<B>) {
        let RecurrentState { hidden, cell } = state;
        let cell = cell.unwrap_or_else(|| hidden.zeros_like());

        let forget = activation::sigmoid(self.forget.pre_activation(input.clone(), hidden.clone()));
        let input_gate =
            activation::sigmoid(self.input_gate.pre_activation(input.clone(), hidden.clone()));
        let output = activation::sigmoid(self.output.pre_activation(input.clone(), hidden.clone()));
        let update = self.update.pre_activation(input, hidden).tanh();

        let cell = forget * cell + input_gate * update;
        let hidden = output * cell.clone().tanh();
        (hidden.clone(), RecurrentState::with_cell(hidden, cell))
    }
}
