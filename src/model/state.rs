use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};

/// Persisted recurrent state: the hidden tensor plus, for gated cells, the
/// cell tensor. Both are `(rows, hidden_size)`.
#[derive(Debug, Clone)]
pub struct RecurrentState<B: Backend> {
    pub hidden: Tensor<B, 2>,
    pub cell: Option<Tensor<B, 2>>,
}

impl<B: Backend> RecurrentState<B> {
    pub fn hidden_only(hidden: Tensor<B, 2>) -> Self {
        Self { hidden, cell: None }
    }

    pub fn with_cell(hidden: Tensor<B, 2>, cell: Tensor<B, 2>) -> Self {
        Self {
            hidden,
            cell: Some(cell),
        }
    }

    pub fn zeros(rows: usize, hidden_size: usize, gated: bool, device: &B::Device) -> Self {
        let hidden = Tensor::zeros([rows, hidden_size], device);
        let cell = gated.then(|| Tensor::zeros([rows, hidden_size], device));
        Self { hidden, cell }
    }

    pub fn rows(&self) -> usize {
        self.hidden.dims()[0]
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden.dims()[1]
    }

    pub fn num_tensors(&self) -> usize {
        1 + usize::from(self.cell.is_some())
    }

    /// Cut the autodiff graph so the next window starts from a constant.
    pub fn detach(self) -> Self {
        Self {
            hidden: self.hidden.detach(),
            cell: self.cell.map(Tensor::detach),
        }
    }

    pub fn max_abs(&self) -> f32 {
        let mut max = self.hidden.clone().abs().max().into_scalar().elem::<f32>();
        if let Some(cell) = &self.cell {
            max = max.max(cell.clone().abs().max().into_scalar().elem::<f32>());
        }
        max
    }

    pub fn is_zeroed(&self) -> bool {
        self.max_abs() == 0.0
    }
}
