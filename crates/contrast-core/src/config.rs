//! TOML config loading for the contrast CLI.
//!
//! Deserializes a config file with `[training]`, `[sampler]`, and `[dataset]`
//! sections, then merges with CLI overrides.

use std::path::Path;

use embedder::TrainingConfig;
use pairdata::{PairSamplerConfig, SingletonPolicy};
use serde::Deserialize;

/// Top-level structure matching the training config TOML.
#[derive(Debug, Default, Deserialize)]
pub struct TrainToml {
    #[serde(default)]
    pub training: TrainingOverrides,
    #[serde(default)]
    pub sampler: SamplerOverrides,
    /// Synthetic dataset parameters.
    #[serde(default)]
    pub dataset: DatasetToml,
}

/// Optional overrides for [`TrainingConfig`] fields.
///
/// All fields are `Option` so an absent key falls through to the built-in
/// default; CLI flags override both.
#[derive(Debug, Default, Deserialize)]
pub struct TrainingOverrides {
    pub margin: Option<f64>,
    pub batch_size: Option<usize>,
    pub epochs: Option<usize>,
    pub learning_rate: Option<f64>,
    pub lr_step_size: Option<usize>,
    pub lr_gamma: Option<f64>,
    pub top_k: Option<usize>,
    pub eval_interval: Option<usize>,
    pub log_interval: Option<usize>,
    pub seed: Option<u64>,
    pub experiment_name: Option<String>,
    pub checkpoint_dir: Option<String>,
}

/// Optional overrides for the pair sampler.
#[derive(Debug, Default, Deserialize)]
pub struct SamplerOverrides {
    pub positive_ratio: Option<f64>,
    pub singleton_policy: Option<SingletonPolicy>,
}

/// Synthetic cluster dataset parameters.
#[derive(Debug, Deserialize)]
pub struct DatasetToml {
    pub classes: usize,
    pub train_per_class: usize,
    pub val_per_class: usize,
    /// Image shape as `[channels, height, width]`.
    pub dims: [usize; 3],
    pub noise: f32,
    pub seed: u64,
}

impl Default for DatasetToml {
    fn default() -> Self {
        Self {
            classes: 10,
            train_per_class: 100,
            val_per_class: 10,
            dims: [1, 8, 8],
            noise: 0.1,
            seed: 7,
        }
    }
}

/// Load and deserialize a [`TrainToml`] from a TOML file.
pub fn load_train_toml(path: &Path) -> anyhow::Result<TrainToml> {
    let contents = std::fs::read_to_string(path)?;
    let config: TrainToml = toml::from_str(&contents)?;
    tracing::info!(path = %path.display(), "Loaded training config");
    Ok(config)
}

/// CLI flags that override TOML values.
#[derive(Debug, Default)]
pub struct TrainingCliOverrides {
    pub epochs: Option<usize>,
    pub batch_size: Option<usize>,
    pub learning_rate: Option<f64>,
    pub margin: Option<f64>,
    pub top_k: Option<usize>,
    pub seed: Option<u64>,
    pub experiment_name: Option<String>,
    pub checkpoint_dir: Option<String>,
}

/// Build a [`TrainingConfig`] from defaults, TOML overrides, and CLI flags.
///
/// Priority chain: built-in defaults < TOML values < CLI flags.
pub fn build_training_config(
    toml_overrides: &TrainingOverrides,
    cli: &TrainingCliOverrides,
) -> TrainingConfig {
    let mut config = TrainingConfig::new();

    if let Some(v) = toml_overrides.margin {
        config.margin = v;
    }
    if let Some(v) = toml_overrides.batch_size {
        config.batch_size = v;
    }
    if let Some(v) = toml_overrides.epochs {
        config.epochs = v;
    }
    if let Some(v) = toml_overrides.learning_rate {
        config.learning_rate = v;
    }
    if let Some(v) = toml_overrides.lr_step_size {
        config.lr_step_size = v;
    }
    if let Some(v) = toml_overrides.lr_gamma {
        config.lr_gamma = v;
    }
    if let Some(v) = toml_overrides.top_k {
        config.top_k = v;
    }
    if let Some(v) = toml_overrides.eval_interval {
        config.eval_interval = v;
    }
    if let Some(v) = toml_overrides.log_interval {
        config.log_interval = v;
    }
    if let Some(v) = toml_overrides.seed {
        config.seed = v;
    }
    if let Some(v) = &toml_overrides.experiment_name {
        config.experiment_name = v.clone();
    }
    if let Some(v) = &toml_overrides.checkpoint_dir {
        config.checkpoint_dir = v.clone();
    }

    // CLI flags take highest priority
    if let Some(v) = cli.epochs {
        config.epochs = v;
    }
    if let Some(v) = cli.batch_size {
        config.batch_size = v;
    }
    if let Some(v) = cli.learning_rate {
        config.learning_rate = v;
    }
    if let Some(v) = cli.margin {
        config.margin = v;
    }
    if let Some(v) = cli.top_k {
        config.top_k = v;
    }
    if let Some(v) = cli.seed {
        config.seed = v;
    }
    if let Some(v) = &cli.experiment_name {
        config.experiment_name = v.clone();
    }
    if let Some(v) = &cli.checkpoint_dir {
        config.checkpoint_dir = v.clone();
    }

    config
}

/// Build a [`PairSamplerConfig`] from TOML overrides.
pub fn build_sampler_config(overrides: &SamplerOverrides) -> PairSamplerConfig {
    let mut config = PairSamplerConfig::default();
    if let Some(v) = overrides.positive_ratio {
        config.positive_ratio = v;
    }
    if let Some(v) = overrides.singleton_policy {
        config.singleton_policy = v;
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_full_toml() {
        let toml_str = r#"
[training]
margin = 2.0
batch_size = 64
epochs = 10
learning_rate = 5e-4
lr_step_size = 4
lr_gamma = 0.5
top_k = 50
experiment_name = "ablation"

[sampler]
positive_ratio = 0.3
singleton_policy = "force_negative"

[dataset]
classes = 5
train_per_class = 20
val_per_class = 4
dims = [1, 4, 4]
noise = 0.05
seed = 99
"#;
        let config: TrainToml = toml::from_str(toml_str).unwrap();
        assert_eq!(config.training.margin, Some(2.0));
        assert_eq!(config.training.batch_size, Some(64));
        assert_eq!(config.training.experiment_name.as_deref(), Some("ablation"));
        assert_eq!(config.sampler.positive_ratio, Some(0.3));
        assert_eq!(
            config.sampler.singleton_policy,
            Some(SingletonPolicy::ForceNegative)
        );
        assert_eq!(config.dataset.classes, 5);
        assert_eq!(config.dataset.dims, [1, 4, 4]);
    }

    #[test]
    fn test_deserialize_missing_sections_use_defaults() {
        let config: TrainToml = toml::from_str("").unwrap();
        assert!(config.training.margin.is_none());
        assert!(config.sampler.positive_ratio.is_none());
        assert_eq!(config.dataset.classes, 10);
        assert_eq!(config.dataset.dims, [1, 8, 8]);
    }

    #[test]
    fn test_cli_overrides_beat_toml() {
        let toml_overrides = TrainingOverrides {
            epochs: Some(10),
            learning_rate: Some(5e-4),
            ..Default::default()
        };
        let cli = TrainingCliOverrides {
            epochs: Some(3),
            ..Default::default()
        };

        let config = build_training_config(&toml_overrides, &cli);
        assert_eq!(config.epochs, 3);
        assert_eq!(config.learning_rate, 5e-4);
        // Untouched fields keep built-in defaults.
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.lr_step_size, 8);
    }
}
