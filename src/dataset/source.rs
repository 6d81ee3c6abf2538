use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::config::{DatasetConfig, DatasetSourceConfig};
use crate::tokenizer::CharVocab;

use super::TowerCorpora;

const SHAKESPEARE_URL: &str =
    "https://raw.githubusercontent.com/karpathy/char-rnn/master/data/tinyshakespeare/input.txt";

/// Read the configured corpus, fit or reload the vocabulary, and shard it.
pub fn load_corpus(config: &DatasetConfig, num_towers: usize) -> Result<(CharVocab, TowerCorpora)> {
    let text = read_corpus_text(config)?;
    let vocab = load_or_fit_vocab(&config.cache_dir, &text)?;
    let corpora = TowerCorpora::from_text(&text, &vocab, num_towers, config.validation_fraction)?;
    Ok((vocab, corpora))
}

pub fn read_corpus_text(config: &DatasetConfig) -> Result<String> {
    let path = match &config.source {
        DatasetSourceConfig::File { path } => path.clone(),
        DatasetSourceConfig::Shakespeare => {
            cached_download(&config.cache_dir, "tinyshakespeare.txt", SHAKESPEARE_URL)?
        }
        DatasetSourceConfig::Url { url } => cached_download(&config.cache_dir, "corpus.txt", url)?,
    };
    fs::read_to_string(&path).with_context(|| format!("failed to read corpus {}", path.display()))
}

pub fn vocab_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("vocab.json")
}

fn load_or_fit_vocab(cache_dir: &Path, text: &str) -> Result<CharVocab> {
    let path = vocab_path(cache_dir);
    if path.is_file() {
        let vocab = CharVocab::load(&path)?;
        info!("Loaded vocabulary with {} characters from {}", vocab.len(), path.display());
        return Ok(vocab);
    }

    let vocab = CharVocab::fit(std::iter::once(text))?;
    vocab.save(&path)?;
    info!("Built vocabulary with {} characters at {}", vocab.len(), path.display());
    Ok(vocab)
}

fn cached_download(cache_dir: &Path, file_name: &str, url: &str) -> Result<PathBuf> {
    fs::create_dir_all(cache_dir)
        .with_context(|| format!("failed to create cache directory {}", cache_dir.display()))?;
    let path = cache_dir.join(file_name);
    if path.exists() {
        return Ok(path);
    }

    info!("Downloading corpus from {url}");
    let response = ureq::get(url)
        .call()
        .with_context(|| format!("failed to download {url}"))?;
    let mut contents = Vec::new();
    response.into_reader().read_to_end(&mut contents)?;

    let mut file = File::create(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    file.write_all(&contents)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn cached_shakespeare_is_not_downloaded_again() {
        let dir = tempdir().unwrap();
        let text = "To be, or not to be, that is the question.\n".repeat(16);
        fs::write(dir.path().join("tinyshakespeare.txt"), &text).unwrap();

        let config = DatasetConfig {
            cache_dir: dir.path().to_path_buf(),
            validation_fraction: 0.25,
            source: DatasetSourceConfig::Shakespeare,
        };
        let (vocab, corpora) = load_corpus(&config, 2).unwrap();
        assert_eq!(corpora.num_towers(), 2);
        assert_eq!(corpora.vocab_size(), vocab.len());
        assert!(vocab_path(dir.path()).is_file());

        let (reloaded, _) = load_corpus(&config, 2).unwrap();
        assert_eq!(vocab, reloaded);
    }
}
