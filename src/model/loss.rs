use std::f64::consts::LN_2;

use burn::tensor::Tensor;
use burn::tensor::activation::log_softmax;
use burn::tensor::backend::Backend;

/// Mean softmax cross-entropy of `(rows, V)` logits against one-hot labels.
pub fn language_model_loss<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 2>) -> Tensor<B, 1> {
    let log_probs = log_softmax(logits, 1);
    (log_probs * labels).sum_dim(1).mean().neg()
}

/// `Σ log2 p(label)` over all rows, computed through `log_softmax` so tiny
/// probabilities do not collapse to `-inf`.
pub fn log2_likelihood<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 2>) -> Tensor<B, 1> {
    (log_softmax(logits, 1) * labels).sum().div_scalar(LN_2)
}
