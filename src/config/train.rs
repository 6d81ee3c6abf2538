use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use toml::Value;

use super::core::{ModelConfig, OptimizerConfig, TrainingHyperparameters};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TrainingConfig {
    pub model: ModelConfig,
    pub training: TrainingHyperparameters,
    pub optimizer: OptimizerConfig,
    pub dataset: DatasetConfig,
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        self.training.validate()?;
        self.optimizer.validate()?;
        if self.model.hidden_size == 0 {
            return Err(anyhow!("model.hidden_size must be positive"));
        }
        if !(0.0..1.0).contains(&self.dataset.validation_fraction)
            || self.dataset.validation_fraction == 0.0
        {
            return Err(anyhow!(
                "dataset.validation_fraction must lie in (0, 1), got {}",
                self.dataset.validation_fraction
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DatasetConfig {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_validation_fraction")]
    pub validation_fraction: f64,
    #[serde(default)]
    pub source: DatasetSourceConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DatasetSourceConfig {
    #[default]
    Shakespeare,
    File {
        path: PathBuf,
    },
    Url {
        url: String,
    },
}

/// Load and merge TOML files in order; later files override earlier ones key by key.
pub fn load_training_config(paths: &[PathBuf]) -> Result<TrainingConfig> {
    if paths.is_empty() {
        return Err(anyhow!("at least one configuration file is required"));
    }

    let mut merged = Value::Table(Default::default());
    for path in paths {
        let overlay = read_toml(path)?;
        merge_values(&mut merged, overlay);
    }

    let config: TrainingConfig = merged
        .try_into()
        .context("failed to deserialize merged training configuration")?;
    config.validate()?;
    Ok(config)
}

fn read_toml(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("failed to parse config {}", path.display()))
}

fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Table(base_table), Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) if existing.is_table() && value.is_table() => {
                        merge_values(existing, value);
                    }
                    _ => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_validation_fraction() -> f64 {
    0.1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_tables_merge_key_by_key() {
        let mut base: Value = toml::from_str(
            r#"
            [training]
            batch_size = 32
            num_epochs = 10
            "#,
        )
        .unwrap();
        let overlay: Value = toml::from_str(
            r#"
            [training]
            num_epochs = 2
            "#,
        )
        .unwrap();

        merge_values(&mut base, overlay);
        let training = base.get("training").unwrap();
        assert_eq!(training.get("batch_size").unwrap().as_integer(), Some(32));
        assert_eq!(training.get("num_epochs").unwrap().as_integer(), Some(2));
    }

    #[test]
    fn source_variants_deserialize() {
        let dataset: DatasetConfig = toml::from_str(
            r#"
            cache_dir = "cache"
            source = { type = "file", path = "corpus.txt" }
            "#,
        )
        .unwrap();
        assert_eq!(
            dataset.source,
            DatasetSourceConfig::File {
                path: PathBuf::from("corpus.txt")
            }
        );
        assert_eq!(dataset.validation_fraction, 0.1);

        let dataset: DatasetConfig = toml::from_str("").unwrap();
        assert_eq!(dataset.source, DatasetSourceConfig::Shakespeare);
    }
}
