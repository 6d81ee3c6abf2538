use burn::module::{Module, Param};
use burn::tensor::Tensor;
use burn::tensor::backend::Backend;

use super::cell::uniform_weight;

/// Hidden-to-vocabulary projection, `h·W (+ b)`.
#[derive(Module, Debug)]
pub struct Projection<B: Backend> {
    weight: Param<Tensor<B, 2>>,
    bias: Option<Param<Tensor<B, 1>>>,
}

impl<B: Backend> Projection<B> {
    pub fn new(
        hidden_size: usize,
        vocab_size: usize,
        with_bias: bool,
        init_range: f64,
        device: &B::Device,
    ) -> Self {
        Self {
            weight: Param::from_tensor(uniform_weight([hidden_size, vocab_size], init_range, device)),
            bias: with_bias.then(|| Param::from_tensor(Tensor::zeros([vocab_size], device))),
        }
    }

    pub fn vocab_size(&self) -> usize {
        self.weight.val().dims()[1]
    }

    pub fn has_bias(&self) -> bool {
        self.bias.is_some()
    }

    pub fn forward(&self, hidden: Tensor<B, 2>) -> Tensor<B, 2> {
        let logits = hidden.matmul(self.weight.val());
        match &self.bias {
            Some(bias) => logits + bias.val().unsqueeze_dim::<2>(0),
            None => logits,
        }
    }
}
