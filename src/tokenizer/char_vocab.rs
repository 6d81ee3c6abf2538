use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

const UNK_CHAR: char = '\u{0003}';

/// Character vocabulary. Id 0 is reserved for unknown characters so every
/// encoded corpus stays within `0..len()`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CharVocab {
    id2ch: Vec<char>,
    ch2id: HashMap<char, u32>,
    unk: u32,
}

impl CharVocab {
    pub fn fit<'a, I>(texts: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut chars = IndexSet::new();
        chars.insert(UNK_CHAR);
        for text in texts {
            chars.extend(text.chars());
        }
        Self::from_chars(chars.into_iter().collect())
    }

    fn from_chars(chars: Vec<char>) -> Result<Self> {
        if chars.first() != Some(&UNK_CHAR) {
            return Err(anyhow!("vocabulary must start with the unknown character"));
        }

        let mut ch2id = HashMap::with_capacity(chars.len());
        for (idx, ch) in chars.iter().enumerate() {
            if ch2id.insert(*ch, idx as u32).is_some() {
                return Err(anyhow!("duplicate character {ch:?}"));
            }
        }

        Ok(Self {
            id2ch: chars,
            ch2id,
            unk: 0,
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let record = CharVocabRecord {
            chars: self.id2ch.clone(),
        };
        let json =
            serde_json::to_string_pretty(&record).context("failed to serialize vocabulary")?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read vocabulary {}", path.display()))?;
        let record: CharVocabRecord = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse vocabulary {}", path.display()))?;
        Self::from_chars(record.chars)
    }

    pub fn encode(&self, text: &str) -> Vec<u32> {
        text.chars()
            .map(|ch| self.ch2id.get(&ch).copied().unwrap_or(self.unk))
            .collect()
    }

    pub fn decode(&self, ids: &[u32]) -> String {
        ids.iter()
            .map(|&id| match self.id2ch.get(id as usize) {
                Some(_) if id == self.unk => '?',
                Some(&ch) => ch,
                None => '?',
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.id2ch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id2ch.is_empty()
    }

    pub fn contains(&self, ch: char) -> bool {
        self.ch2id.contains_key(&ch)
    }

    pub fn unk(&self) -> u32 {
        self.unk
    }
}

#[derive(Serialize, Deserialize)]
struct CharVocabRecord {
    chars: Vec<char>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use tempfile::tempdir;

    #[test]
    fn fit_encode_decode() {
        let vocab = CharVocab::fit(["hello", "world"].into_iter()).expect("fit");
        // unk + h e l o w r d
        assert_eq!(vocab.len(), 8);
        let encoded = vocab.encode("hello");
        assert_eq!(encoded.len(), 5);
        assert!(encoded.iter().all(|&id| (id as usize) < vocab.len()));
        assert_eq!(vocab.decode(&encoded), "hello");
    }

    #[test]
    fn unknown_characters_map_to_unk() {
        let vocab = CharVocab::fit(["ab"].into_iter()).expect("fit");
        let tokens = vocab.encode("ac");
        assert_eq!(tokens, vec![vocab.ch2id[&'a'], vocab.unk()]);
        assert_eq!(vocab.decode(&tokens), "a?");
    }

    #[test]
    fn save_and_load_preserves_vocab() -> io::Result<()> {
        let vocab = CharVocab::fit(["abc"].into_iter()).expect("fit");
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("vocab.json");
        vocab.save(&path).expect("save vocab");
        let loaded = CharVocab::load(&path).expect("load vocab");
        assert_eq!(vocab, loaded);
        Ok(())
    }
}
