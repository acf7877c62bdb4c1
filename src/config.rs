//! Training configuration.
//!
//! All settings have compiled-in defaults. A TOML file may override any
//! subset of them; fields it leaves out keep their defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tagtune_burn::DevicePlacement;
use tagtune_data::{PipelineConfig, DEFAULT_INPUT_SHAPE, DEFAULT_SHUFFLE_BUFFER};

/// Default location of the dataset, relative to the working directory.
pub const DEFAULT_DATASET_ROOT: &str = "datasets/magnatagatune";

/// Tag vocabulary, in label-column order.
pub const DEFAULT_CLASSES: [&str; 39] = [
    "classical",
    "instrumental",
    "electronica",
    "techno",
    "male voice",
    "rock",
    "ambient",
    "female voice",
    "opera",
    "indian",
    "choir",
    "pop",
    "heavy metal",
    "jazz",
    "new age",
    "dance",
    "country",
    "eastern",
    "baroque",
    "funk",
    "hard rock",
    "trance",
    "folk",
    "oriental",
    "medieval",
    "irish",
    "blues",
    "middle eastern",
    "punk",
    "celtic",
    "arabic",
    "rap",
    "industrial",
    "world",
    "hip hop",
    "disco",
    "soft rock",
    "jungle",
    "reggae",
];

/// Immutable settings for one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainConfig {
    pub dataset_root: PathBuf,
    /// `[frames, bins]` of every spectrogram.
    pub input_shape: [usize; 2],
    pub classes: Vec<String>,
    pub batch_size: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    /// Loader threads. Defaults to the number of CPU cores.
    pub num_workers: usize,
    pub shuffle_buffer: usize,
    /// Ready batches queued ahead of the training loop.
    pub prefetch_batches: usize,
    /// Fixed shuffle seed. Unset means a fresh order every run.
    pub seed: Option<u64>,
    pub device: DevicePlacement,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            dataset_root: PathBuf::from(DEFAULT_DATASET_ROOT),
            input_shape: DEFAULT_INPUT_SHAPE,
            classes: DEFAULT_CLASSES.iter().map(|c| c.to_string()).collect(),
            batch_size: 32,
            epochs: 100,
            learning_rate: 1e-3,
            num_workers: std::thread::available_parallelism().map_or(1, |n| n.get()),
            shuffle_buffer: DEFAULT_SHUFFLE_BUFFER,
            prefetch_batches: 2,
            seed: None,
            device: DevicePlacement::default(),
        }
    }
}

impl TrainConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: TrainConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::Config(msg.to_string()));

        if self.classes.is_empty() {
            return invalid("class list is empty");
        }
        if self.input_shape.contains(&0) {
            return invalid("input_shape dimensions must be non-zero");
        }
        if self.batch_size == 0 {
            return invalid("batch_size must be at least 1");
        }
        if self.epochs == 0 {
            return invalid("epochs must be at least 1");
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return invalid("learning_rate must be positive");
        }
        if self.num_workers == 0 {
            return invalid("num_workers must be at least 1");
        }
        if self.prefetch_batches == 0 {
            return invalid("prefetch_batches must be at least 1");
        }
        Ok(())
    }

    /// Shuffled pipeline settings for the training split.
    pub fn train_pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            shuffle_buffer: Some(self.shuffle_buffer),
            ..self.eval_pipeline()
        }
    }

    /// Unshuffled pipeline settings for accuracy passes over validation data.
    pub fn eval_pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            batch_size: self.batch_size,
            shuffle_buffer: None,
            num_workers: self.num_workers,
            prefetch_batches: self.prefetch_batches,
            input_shape: self.input_shape,
            seed: self.seed,
        }
    }

    pub fn with_dataset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.dataset_root = root.into();
        self
    }

    pub fn with_input_shape(mut self, shape: [usize; 2]) -> Self {
        self.input_shape = shape;
        self
    }

    pub fn with_classes<S: Into<String>>(mut self, classes: impl IntoIterator<Item = S>) -> Self {
        self.classes = classes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_device(mut self, device: DevicePlacement) -> Self {
        self.device = device;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrainConfig::default();
        assert_eq!(config.input_shape, [628, 128]);
        assert_eq!(config.num_classes(), 39);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.epochs, 100);
        assert_eq!(config.learning_rate, 1e-3);
        assert_eq!(config.shuffle_buffer, 10_000);
        assert!(config.num_workers >= 1);
        assert_eq!(config.dataset_root, PathBuf::from("datasets/magnatagatune"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = TrainConfig::from_toml_str(
            r#"
            dataset_root = "/data/mtat"
            epochs = 3
            seed = 42
            device = "cpu"
            "#,
        )
        .unwrap();

        assert_eq!(config.dataset_root, PathBuf::from("/data/mtat"));
        assert_eq!(config.epochs, 3);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.device, DevicePlacement::Cpu);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.num_classes(), 39);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(
            TrainConfig::from_toml_str("bach_size = 4"),
            Err(Error::ConfigParse(_))
        ));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(TrainConfig::from_toml_str("batch_size = 0").is_err());
        assert!(TrainConfig::from_toml_str("learning_rate = -0.1").is_err());
        assert!(TrainConfig::from_toml_str("classes = []").is_err());
        assert!(TrainConfig::from_toml_str("input_shape = [628, 0]").is_err());
    }

    #[test]
    fn test_pipeline_configs() {
        let config = TrainConfig::default().with_batch_size(8).with_seed(1);

        let train = config.train_pipeline();
        assert_eq!(train.batch_size, 8);
        assert_eq!(train.shuffle_buffer, Some(10_000));
        assert_eq!(train.seed, Some(1));

        let eval = config.eval_pipeline();
        assert_eq!(eval.shuffle_buffer, None);
        assert_eq!(eval.input_shape, [628, 128]);
    }
}
