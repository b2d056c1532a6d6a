use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use spendsort_core::VocabularyBuilder;
use spendsort_model::{TrainConfig, Widths};

use crate::state::{ensure_spendsort_home, resolve_in};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsSection,
    pub vocabulary: VocabularySection,
    pub training: TrainingSection,
}

/// Artifact locations. Relative paths live under the spendsort home.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub dataset: String,
    pub metadata: String,
    pub weights: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabularySection {
    /// Trailing tokens per description left out of mining (reference numbers, dates).
    pub exclude_trailing: usize,
    pub min_token_len: usize,
    pub min_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSection {
    pub hidden_size: usize,
    pub epochs: usize,
    pub learning_rate: f32,
    pub train_fraction: f64,
    pub log_every: usize,
    pub seed: u64,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            dataset: "data.csv".to_string(),
            metadata: "meta_data.json".to_string(),
            weights: "model.json".to_string(),
        }
    }
}

impl Default for VocabularySection {
    fn default() -> Self {
        let b = VocabularyBuilder::default();
        Self {
            exclude_trailing: b.exclude_trailing,
            min_token_len: b.min_token_len,
            min_count: b.min_count,
        }
    }
}

impl Default for TrainingSection {
    fn default() -> Self {
        let t = TrainConfig::default();
        Self {
            hidden_size: spendsort_model::DEFAULT_HIDDEN_SIZE,
            epochs: t.epochs,
            learning_rate: t.learning_rate,
            train_fraction: t.train_fraction,
            log_every: t.log_every,
            seed: 42,
        }
    }
}

impl Config {
    pub fn vocabulary_builder(&self) -> VocabularyBuilder {
        VocabularyBuilder::new()
            .exclude_trailing(self.vocabulary.exclude_trailing)
            .min_token_len(self.vocabulary.min_token_len)
            .min_count(self.vocabulary.min_count)
    }

    pub fn train_config(&self) -> TrainConfig {
        TrainConfig {
            epochs: self.training.epochs,
            learning_rate: self.training.learning_rate,
            train_fraction: self.training.train_fraction,
            log_every: self.training.log_every,
        }
    }

    pub fn widths(&self, input: usize, output: usize) -> Widths {
        Widths::new(input, output).with_hidden(self.training.hidden_size)
    }
}

/// Resolved artifact paths for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPaths {
    pub dataset: PathBuf,
    pub metadata: PathBuf,
    pub weights: PathBuf,
}

impl ArtifactPaths {
    pub fn resolve(paths: &PathsSection, home: &Path) -> Self {
        Self {
            dataset: resolve_in(home, &paths.dataset),
            metadata: resolve_in(home, &paths.metadata),
            weights: resolve_in(home, &paths.weights),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_spendsort_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

/// Missing file means defaults.
pub fn load_config_from(p: &Path) -> Result<Config> {
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn save_config_to(cfg: &Config, p: &Path) -> Result<()> {
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config_to(&Config::default(), &p)?;
    println!("Wrote {}", p.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.paths.dataset, "data.csv");
        assert_eq!(cfg.paths.metadata, "meta_data.json");
        assert_eq!(cfg.paths.weights, "model.json");
        assert_eq!(cfg.training.hidden_size, 128);
        assert_eq!(cfg.training.epochs, 1000);
        assert_eq!(cfg.vocabulary.exclude_trailing, 2);
        assert_eq!(cfg.train_config(), TrainConfig::default());
        assert_eq!(cfg.vocabulary_builder(), VocabularyBuilder::default());
    }

    #[test]
    fn test_missing_file_is_default() {
        let temp = tempdir().unwrap();
        let cfg = load_config_from(&temp.path().join("config.toml")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp = tempdir().unwrap();
        let p = temp.path().join("config.toml");
        fs::write(&p, "[training]\nepochs = 50\n\n[vocabulary]\nexclude_trailing = 0\n").unwrap();

        let cfg = load_config_from(&p).unwrap();
        assert_eq!(cfg.training.epochs, 50);
        assert_eq!(cfg.training.hidden_size, 128);
        assert_eq!(cfg.vocabulary.exclude_trailing, 0);
        assert_eq!(cfg.vocabulary.min_count, 2);
        assert_eq!(cfg.paths, PathsSection::default());
    }

    #[test]
    fn test_save_then_load() {
        let temp = tempdir().unwrap();
        let p = temp.path().join("config.toml");
        let mut cfg = Config::default();
        cfg.paths.weights = "/srv/models/spend.json".to_string();
        cfg.training.learning_rate = 0.01;
        save_config_to(&cfg, &p).unwrap();
        assert_eq!(load_config_from(&p).unwrap(), cfg);
    }

    #[test]
    fn test_bad_toml_names_the_file() {
        let temp = tempdir().unwrap();
        let p = temp.path().join("config.toml");
        fs::write(&p, "[training\n").unwrap();
        let err = load_config_from(&p).unwrap_err();
        assert!(format!("{err}").contains("config.toml"));
    }

    #[test]
    fn test_artifact_paths() {
        let mut paths = PathsSection::default();
        paths.weights = "/abs/model.json".to_string();
        let resolved = ArtifactPaths::resolve(&paths, Path::new("/home/u/.spendsort"));
        assert_eq!(resolved.dataset, PathBuf::from("/home/u/.spendsort/data.csv"));
        assert_eq!(resolved.weights, PathBuf::from("/abs/model.json"));
    }
}
