use crate::error::{Result, TrainingError};
use crate::tokenizer::CharVocab;

use super::DatasetSplit;

/// Independent token streams per tower for both splits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TowerCorpora {
    training: Vec<Vec<u32>>,
    validation: Vec<Vec<u32>>,
    vocab_size: usize,
}

impl TowerCorpora {
    pub fn new(
        training: Vec<Vec<u32>>,
        validation: Vec<Vec<u32>>,
        vocab_size: usize,
    ) -> Result<Self> {
        if vocab_size == 0 {
            return Err(TrainingError::config("vocabulary size must be positive"));
        }
        if training.len() != validation.len() {
            return Err(TrainingError::config(format!(
                "{} training streams but {} validation streams",
                training.len(),
                validation.len()
            )));
        }
        Ok(Self {
            training,
            validation,
            vocab_size,
        })
    }

    /// Encode `text`, hold out the trailing `validation_fraction` for
    /// validation, and cut each split into `num_towers` contiguous shards.
    pub fn from_text(
        text: &str,
        vocab: &CharVocab,
        num_towers: usize,
        validation_fraction: f64,
    ) -> Result<Self> {
        if num_towers == 0 {
            return Err(TrainingError::config("num_towers must be positive"));
        }
        let tokens = vocab.encode(text);
        let validation_len = ((tokens.len() as f64) * validation_fraction.clamp(0.0, 1.0)) as usize;
        let train_len = tokens.len() - validation_len;
        if train_len < num_towers || validation_len < num_towers {
            return Err(TrainingError::config(format!(
                "corpus of {} tokens is too small to shard across {num_towers} towers",
                tokens.len()
            )));
        }

        let (train, valid) = tokens.split_at(train_len);
        Self::new(
            shard(train, num_towers),
            shard(valid, num_towers),
            vocab.len(),
        )
    }

    pub fn num_towers(&self) -> usize {
        self.training.len()
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn streams(&self, split: DatasetSplit) -> &[Vec<u32>] {
        match split {
            DatasetSplit::Train => &self.training,
            DatasetSplit::Val => &self.validation,
        }
    }

    pub fn ensure_towers(&self, num_towers: usize) -> Result<()> {
        for split in [DatasetSplit::Train, DatasetSplit::Val] {
            let streams = self.streams(split).len();
            if streams != num_towers {
                return Err(TrainingError::config(format!(
                    "{split:?} corpus has {streams} tower streams but num_towers is {num_towers}"
                )));
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> String {
        let train: usize = self.training.iter().map(Vec::len).sum();
        let valid: usize = self.validation.iter().map(Vec::len).sum();
        format!(
            "corpus: towers={}, vocab={}, train_tokens={train}, validation_tokens={valid}",
            self.num_towers(),
            self.vocab_size
        )
    }
}

fn shard(tokens: &[u32], parts: usize) -> Vec<Vec<u32>> {
    let shard_len = tokens.len() / parts;
    tokens
        .chunks_exact(shard_len)
        .take(parts)
        .map(<[u32]>::to_vec)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shards_are_contiguous_and_equal() {
        let tokens: Vec<u32> = (0..10).collect();
        let shards = shard(&tokens, 3);
        assert_eq!(shards, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7, 8]]);
    }

    #[test]
    fn mismatched_tower_counts_rejected() {
        let corpora = TowerCorpora::new(vec![vec![0, 1]; 2], vec![vec![0]; 2], 2).unwrap();
        assert!(corpora.ensure_towers(2).is_ok());
        assert!(corpora.ensure_towers(3).unwrap_err().is_configuration());

        let err = TowerCorpora::new(vec![vec![0]; 2], vec![vec![0]; 1], 2).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn from_text_splits_train_then_validation() {
        let text = "abcdefghij".repeat(10);
        let vocab = CharVocab::fit(std::iter::once(text.as_str())).unwrap();
        let corpora = TowerCorpora::from_text(&text, &vocab, 2, 0.2).unwrap();
        assert_eq!(corpora.num_towers(), 2);
        assert_eq!(corpora.streams(DatasetSplit::Train)[0].len(), 40);
        assert_eq!(corpora.streams(DatasetSplit::Val)[1].len(), 10);
        assert_eq!(corpora.vocab_size(), vocab.len());
    }
}
