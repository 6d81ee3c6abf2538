use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrainingError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("numeric instability at epoch {epoch}, batch {batch}: cost {cost}")]
    NumericInstability { epoch: usize, batch: usize, cost: f64 },

    #[error("tower {tower} failed during its forward pass")]
    TowerFailed { tower: usize },

    #[error("training cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, TrainingError>;

impl TrainingError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn shape(context: impl Into<String>, expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            context: context.into(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
