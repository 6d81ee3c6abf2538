use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};

use crate::error::{Result, TrainingError};

/// Cyclic source of one-hot windows over one tower's token stream.
///
/// The stream is cut into `batch_size` equal segments (the remainder is
/// dropped). Row `k` of every emitted step reads from segment `k`, and each
/// segment keeps its own cursor that wraps back to the segment start.
///
/// A batch holds `num_unfoldings + 1` steps: step 0 repeats the final step of
/// the previous batch, so step `i + 1` is always the label of step `i` and
/// consecutive batches advance the stream by exactly `num_unfoldings`.
#[derive(Debug, Clone)]
pub struct BatchGenerator {
    tokens: Vec<u32>,
    batch_size: usize,
    num_unfoldings: usize,
    vocab_size: usize,
    segment_len: usize,
    cursors: Vec<usize>,
    carried: Vec<u32>,
}

impl BatchGenerator {
    pub fn new(
        tower: usize,
        tokens: Vec<u32>,
        batch_size: usize,
        num_unfoldings: usize,
        vocab_size: usize,
    ) -> Result<Self> {
        if batch_size == 0 || num_unfoldings == 0 {
            return Err(TrainingError::config(format!(
                "tower {tower}: batch_size and num_unfoldings must be positive"
            )));
        }
        if batch_size > tokens.len() {
            return Err(TrainingError::config(format!(
                "tower {tower}: batch_size {batch_size} exceeds stream length {}",
                tokens.len()
            )));
        }
        if let Some(&token) = tokens.iter().find(|&&token| token as usize >= vocab_size) {
            return Err(TrainingError::config(format!(
                "tower {tower}: token id {token} outside vocabulary of size {vocab_size}"
            )));
        }

        let segment_len = tokens.len() / batch_size;
        if segment_len < num_unfoldings {
            return Err(TrainingError::config(format!(
                "tower {tower}: segment length {segment_len} is shorter than one window of \
                 {num_unfoldings} unfoldings"
            )));
        }

        let mut generator = Self {
            tokens,
            batch_size,
            num_unfoldings,
            vocab_size,
            segment_len,
            cursors: Vec::new(),
            carried: Vec::new(),
        };
        generator.reset();
        Ok(generator)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn num_unfoldings(&self) -> usize {
        self.num_unfoldings
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn segment_len(&self) -> usize {
        self.segment_len
    }

    /// Absolute stream offsets currently under each segment cursor.
    pub fn cursors(&self) -> &[usize] {
        &self.cursors
    }

    /// Batches per full pass over every segment.
    pub fn num_batches(&self) -> usize {
        self.segment_len / self.num_unfoldings
    }

    pub fn reset(&mut self) {
        self.cursors = (0..self.batch_size)
            .map(|segment| segment * self.segment_len)
            .collect();
        self.carried = self.current_tokens();
    }

    pub fn next_batch(&mut self) -> Batch {
        let mut steps = Vec::with_capacity(self.num_unfoldings + 1);
        steps.push(std::mem::take(&mut self.carried));
        for _ in 0..self.num_unfoldings {
            self.advance();
            steps.push(self.current_tokens());
        }
        self.carried = steps[self.num_unfoldings].clone();

        Batch {
            steps,
            vocab_size: self.vocab_size,
        }
    }

    fn current_tokens(&self) -> Vec<u32> {
        self.cursors.iter().map(|&cursor| self.tokens[cursor]).collect()
    }

    fn advance(&mut self) {
        for (segment, cursor) in self.cursors.iter_mut().enumerate() {
            let start = segment * self.segment_len;
            *cursor = start + (*cursor - start + 1) % self.segment_len;
        }
    }
}

/// Token ids of one batch, `steps[step][row]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    steps: Vec<Vec<u32>>,
    vocab_size: usize,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn rows(&self) -> usize {
        self.steps.first().map(Vec::len).unwrap_or(0)
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn tokens(&self, step: usize) -> &[u32] {
        &self.steps[step]
    }

    pub fn steps(&self) -> &[Vec<u32>] {
        &self.steps
    }

    pub fn one_hot<B: Backend>(&self, device: &B::Device) -> Vec<Tensor<B, 2>> {
        self.steps
            .iter()
            .map(|tokens| one_hot_rows::<B>(tokens, self.vocab_size, device))
            .collect()
    }
}

/// `(tokens.len(), vocab_size)` matrix with a single 1.0 per row.
pub fn one_hot_rows<B: Backend>(
    tokens: &[u32],
    vocab_size: usize,
    device: &B::Device,
) -> Tensor<B, 2> {
    let mut values = vec![0.0f32; tokens.len() * vocab_size];
    for (row, &token) in tokens.iter().enumerate() {
        values[row * vocab_size + token as usize] = 1.0;
    }
    Tensor::from_data(TensorData::new(values, [tokens.len(), vocab_size]), device)
}
