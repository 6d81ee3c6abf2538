use std::fs;
use std::path::PathBuf;

use burn_recurrent_towers::dataset::vocab_path;
use burn_recurrent_towers::{
    CellKind, DatasetSourceConfig, DatasetSplit, TrainerConfig, build_model_config, load_corpus,
    load_training_config,
};
use tempfile::tempdir;

const BASE: &str = r#"
[model]
cell = "lstm"
hidden_size = 128

[training]
num_gpus = 2
batch_size = 32
num_training_unfoldings = 50
num_validation_unfoldings = 50
optimization_frequency = 10
num_epochs = 5

[optimizer]
learning_rate = 1.0

[dataset]
cache_dir = "data"
"#;

fn write(dir: &std::path::Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).expect("write config");
    path
}

#[test]
fn overlays_replace_individual_keys() {
    let dir = tempdir().expect("tempdir");
    let base = write(dir.path(), "base.toml", BASE);
    let overlay = write(
        dir.path(),
        "srn.toml",
        r#"
        [model]
        cell = "srn"

        [training]
        num_epochs = 1

        [dataset.source]
        type = "file"
        path = "corpus.txt"
        "#,
    );

    let config = load_training_config(&[base, overlay]).expect("config");
    assert_eq!(config.model.cell, CellKind::Srn);
    assert_eq!(config.model.hidden_size, 128);
    assert_eq!(config.model.init_range, 0.1);
    assert_eq!(config.training.num_towers, 2);
    assert_eq!(config.training.num_epochs, 1);
    assert_eq!(config.training.summary_frequency, 100);
    assert_eq!(config.optimizer.learning_decay, 0.5);
    assert_eq!(config.optimizer.momentum, 0.9);
    assert_eq!(config.optimizer.clip_norm, 1.0);
    assert_eq!(
        config.dataset.source,
        DatasetSourceConfig::File {
            path: PathBuf::from("corpus.txt")
        }
    );

    let trainer = TrainerConfig::from(&config);
    assert_eq!(trainer.training.windows_per_batch(), 5);
    assert_eq!(build_model_config(&config.model, 65).vocab_size, 65);
}

#[test]
fn non_dividing_window_fails_to_load() {
    let dir = tempdir().expect("tempdir");
    let base = write(dir.path(), "base.toml", BASE);
    let overlay = write(dir.path(), "bad.toml", "[training]\noptimization_frequency = 7\n");

    let err = load_training_config(&[base, overlay]).unwrap_err();
    assert!(format!("{err:#}").contains("does not divide"));
}

#[test]
fn missing_file_is_reported_with_its_path() {
    let err = load_training_config(&[PathBuf::from("does/not/exist.toml")]).unwrap_err();
    assert!(format!("{err:#}").contains("does/not/exist.toml"));
}

#[test]
fn file_corpus_is_sharded_and_vocab_cached() {
    let dir = tempdir().expect("tempdir");
    let corpus = dir.path().join("corpus.txt");
    fs::write(&corpus, "to be or not to be, that is the question. ".repeat(40)).expect("corpus");
    let cache = dir.path().join("cache");

    let base = write(dir.path(), "base.toml", BASE);
    let overlay = write(
        dir.path(),
        "file.toml",
        &format!(
            "[dataset]\ncache_dir = {:?}\nvalidation_fraction = 0.25\n\n[dataset.source]\ntype = \"file\"\npath = {:?}\n",
            cache.display().to_string(),
            corpus.display().to_string()
        ),
    );
    let config = load_training_config(&[base, overlay]).expect("config");

    let (vocab, corpora) = load_corpus(&config.dataset, 2).expect("corpus");
    assert!(vocab_path(&cache).is_file());
    assert_eq!(corpora.num_towers(), 2);
    assert_eq!(corpora.vocab_size(), vocab.len());
    assert!(!corpora.streams(DatasetSplit::Val)[0].is_empty());

    let (reloaded, _) = load_corpus(&config.dataset, 2).expect("cached corpus");
    assert_eq!(reloaded, vocab);
}
