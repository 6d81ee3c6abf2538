/// `2^(-log2_sum / observations)`.
pub fn perplexity(log2_sum: f64, observations: usize) -> f64 {
    (-log2_sum / observations as f64).exp2()
}

/// Running `Σ log2 p(label)` over a validation pass.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PerplexityAccumulator {
    log2_sum: f64,
    observations: usize,
}

impl PerplexityAccumulator {
    pub fn add(&mut self, log2_sum: f64, observations: usize) {
        self.log2_sum += log2_sum;
        self.observations += observations;
    }

    pub fn log2_sum(&self) -> f64 {
        self.log2_sum
    }

    pub fn observations(&self) -> usize {
        self.observations
    }

    pub fn perplexity(&self) -> Option<f64> {
        (self.observations > 0).then(|| perplexity(self.log2_sum, self.observations))
    }
}

/// Multiplicative decay applied when validation perplexity regresses.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LearningRatePolicy {
    decay: f64,
}

impl LearningRatePolicy {
    pub fn new(decay: f64) -> Self {
        Self { decay }
    }

    pub fn next(&self, learning_rate: f64, previous: Option<f64>, current: f64) -> f64 {
        match previous {
            Some(previous) if current > previous => learning_rate * self.decay,
            _ => learning_rate,
        }
    }
}

/// What one epoch hands to the next.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpochState {
    pub epoch: usize,
    pub learning_rate: f64,
    pub previous_perplexity: Option<f64>,
}

impl EpochState {
    pub fn initial(learning_rate: f64) -> Self {
        Self {
            epoch: 1,
            learning_rate,
            previous_perplexity: None,
        }
    }

    pub fn advance(self, perplexity: f64, policy: &LearningRatePolicy) -> Self {
        Self {
            epoch: self.epoch + 1,
            learning_rate: policy.next(self.learning_rate, self.previous_perplexity, perplexity),
            previous_perplexity: Some(perplexity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perplexity_from_log2_sum() {
        let mut acc = PerplexityAccumulator::default();
        assert_eq!(acc.perplexity(), None);
        acc.add(-60.0, 30);
        acc.add(-40.0, 20);
        assert_eq!(acc.observations(), 50);
        assert!((acc.perplexity().unwrap() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn decays_only_when_perplexity_rises() {
        let policy = LearningRatePolicy::new(0.5);
        let mut state = EpochState::initial(1.0);
        let mut rates = Vec::new();
        for perplexity in [40.0, 50.0, 45.0] {
            state = state.advance(perplexity, &policy);
            rates.push(state.learning_rate);
        }
        assert_eq!(rates, vec![1.0, 0.5, 0.5]);
        assert_eq!(state.epoch, 4);
        assert_eq!(state.previous_perplexity, Some(45.0));
    }

    #[test]
    fn equal_perplexity_keeps_rate() {
        let policy = LearningRatePolicy::new(0.1);
        assert_eq!(policy.next(0.3, Some(12.0), 12.0), 0.3);
        assert_eq!(policy.next(0.3, None, 1e9), 0.3);
    }
}
