//! Epoch-based training loop: shuffled pair batches, Adam with step-decay
//! learning rate, periodic retrieval evaluation, and best-mAP checkpointing.

use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use pairdata::{PairDataset, PairMode};

use crate::checkpoint::{save_checkpoint, CheckpointMeta};
use crate::error::TrainError;
use crate::model::bridge::{flags_to_tensor, images_to_tensor, tensor_to_rows};
use crate::model::embed::ImageEmbedder;
use crate::training::loss::ContrastiveLoss;
use crate::training::metrics::{mean_average_precision, RunningLoss};

/// Configuration for contrastive embedding training.
#[derive(Config, Debug)]
pub struct TrainingConfig {
    /// Margin for the contrastive hinge on negative pairs.
    #[config(default = 1.0)]
    pub margin: f64,
    /// Pairs per optimizer step.
    #[config(default = 32)]
    pub batch_size: usize,
    /// Number of passes over the training set. Zero runs evaluation only.
    #[config(default = 30)]
    pub epochs: usize,
    /// Base learning rate for Adam.
    #[config(default = 1e-3)]
    pub learning_rate: f64,
    /// Epochs between learning-rate decays.
    #[config(default = 8)]
    pub lr_step_size: usize,
    /// Multiplicative decay applied every `lr_step_size` epochs.
    #[config(default = 0.1)]
    pub lr_gamma: f64,
    /// Retrieval cutoff for validation mAP.
    #[config(default = 100)]
    pub top_k: usize,
    /// Epochs between validation passes.
    #[config(default = 1)]
    pub eval_interval: usize,
    /// Batches between loss log lines.
    #[config(default = 50)]
    pub log_interval: usize,
    /// Seed for shuffling and pair sampling.
    #[config(default = 42)]
    pub seed: u64,
    /// Name of the checkpoint subdirectory for this run.
    #[config(default = "String::from(\"baseline\")")]
    pub experiment_name: String,
    /// Root directory for checkpoints.
    #[config(default = "String::from(\"checkpoints\")")]
    pub checkpoint_dir: String,
}

impl TrainingConfig {
    /// Reject configurations that cannot train.
    pub fn validate(&self) -> Result<(), TrainError> {
        if !(self.margin > 0.0) || !self.margin.is_finite() {
            return Err(TrainError::InvalidConfig(format!(
                "margin must be > 0, got {}",
                self.margin
            )));
        }
        if self.batch_size == 0 {
            return Err(TrainError::InvalidConfig("batch_size must be > 0".into()));
        }
        if !(self.learning_rate > 0.0) || !self.learning_rate.is_finite() {
            return Err(TrainError::InvalidConfig(format!(
                "learning_rate must be > 0, got {}",
                self.learning_rate
            )));
        }
        if self.lr_step_size == 0 {
            return Err(TrainError::InvalidConfig("lr_step_size must be > 0".into()));
        }
        if !(self.lr_gamma > 0.0 && self.lr_gamma <= 1.0) {
            return Err(TrainError::InvalidConfig(format!(
                "lr_gamma must be in (0, 1], got {}",
                self.lr_gamma
            )));
        }
        if self.top_k == 0 {
            return Err(TrainError::InvalidConfig("top_k must be > 0".into()));
        }
        if self.eval_interval == 0 {
            return Err(TrainError::InvalidConfig(
                "eval_interval must be > 0".into(),
            ));
        }
        if self.experiment_name.is_empty() {
            return Err(TrainError::InvalidConfig(
                "experiment_name must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Learning rate for a 0-based epoch under step decay.
///
/// The base rate holds for the first `step_size` epochs, then decays by
/// `gamma` at every `step_size` boundary.
pub fn lr_schedule(base_lr: f64, step_size: usize, gamma: f64, epoch: usize) -> f64 {
    if step_size == 0 {
        return base_lr;
    }
    base_lr * gamma.powi((epoch / step_size) as i32)
}

/// Tracks the best validation metric seen so far.
///
/// `observe` returns true only on strict improvement; ties and non-finite
/// values never trigger a checkpoint.
#[derive(Debug, Default)]
pub struct BestTracker {
    best: Option<f64>,
}

impl BestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, metric: f64) -> bool {
        if !metric.is_finite() {
            return false;
        }
        match self.best {
            Some(best) if metric <= best => false,
            _ => {
                self.best = Some(metric);
                true
            }
        }
    }

    pub fn best(&self) -> Option<f64> {
        self.best
    }
}

/// Summary of a completed `fit` run.
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    pub epochs_run: usize,
    /// Best validation mAP across all evaluation passes.
    pub best_map: Option<f64>,
    /// mAP from the last evaluation pass.
    pub final_map: Option<f64>,
    pub checkpoints_saved: usize,
}

/// Embed every anchor of a pair dataset in batches, without gradients.
fn embed_anchors<B: Backend, M: ImageEmbedder<B>>(
    model: &M,
    data: &PairDataset,
    batch_size: usize,
    device: &B::Device,
) -> Result<(Vec<Vec<f32>>, Vec<i64>), TrainError> {
    let dims = data.image_dims();
    let mut rows = Vec::with_capacity(data.len());
    let mut labels = Vec::with_capacity(data.len());

    let indices: Vec<usize> = (0..data.len()).collect();
    for (batch_index, chunk) in indices.chunks(batch_size).enumerate() {
        let mut images = Vec::with_capacity(chunk.len());
        for &i in chunk {
            let (image, label) = data.anchor(i)?;
            images.push(image);
            labels.push(label);
        }
        let batch = images_to_tensor::<B>(&images, dims, batch_index, device)?;
        rows.extend(tensor_to_rows(model.embed(batch)));
    }
    Ok((rows, labels))
}

/// Validation mAP: `queries` anchors ranked against `gallery` anchors.
pub fn evaluate_map<B: Backend, M: ImageEmbedder<B>>(
    model: &M,
    queries: &PairDataset,
    gallery: &PairDataset,
    top_k: usize,
    batch_size: usize,
    device: &B::Device,
) -> Result<f64, TrainError> {
    let (query_rows, query_labels) = embed_anchors(model, queries, batch_size, device)?;
    let (gallery_rows, gallery_labels) = embed_anchors(model, gallery, batch_size, device)?;
    mean_average_precision(&query_rows, &query_labels, &gallery_rows, &gallery_labels, top_k)
}

/// Train an embedding model on pair batches drawn from `train`, evaluating
/// retrieval against `val` queries over the `train` gallery.
///
/// Checkpoints are written under `{checkpoint_dir}/{experiment_name}/`
/// whenever validation mAP strictly improves. A checkpoint write failure is
/// logged and training continues. With `epochs == 0` the loop is skipped and
/// a single evaluation pass runs on the initial weights.
pub fn fit<B, M>(
    config: &TrainingConfig,
    mut model: M,
    train: &PairDataset,
    val: &PairDataset,
    device: &B::Device,
) -> Result<(M, FitReport), TrainError>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + ImageEmbedder<B>,
    M::InnerModule: ImageEmbedder<B::InnerBackend>,
{
    config.validate()?;
    if train.mode() != PairMode::Train {
        return Err(TrainError::InvalidConfig(
            "training dataset must be in train mode".into(),
        ));
    }

    let checkpoint_root = std::path::Path::new(&config.checkpoint_dir);
    std::fs::create_dir_all(checkpoint_root)
        .map_err(|e| TrainError::Checkpoint(format!("create {}: {e}", config.checkpoint_dir)))?;

    let loss = ContrastiveLoss::new(config.margin)?;
    let mut optimizer = AdamConfig::new().init();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut tracker = BestTracker::new();
    let dims = train.image_dims();

    tracing::info!(
        experiment = %config.experiment_name,
        epochs = config.epochs,
        batch_size = config.batch_size,
        margin = config.margin,
        lr = config.learning_rate,
        train_items = train.len(),
        val_items = val.len(),
        "starting training"
    );

    let mut final_map = None;
    let mut checkpoints_saved = 0usize;
    let mut indices: Vec<usize> = (0..train.len()).collect();

    for epoch in 1..=config.epochs {
        let lr = lr_schedule(
            config.learning_rate,
            config.lr_step_size,
            config.lr_gamma,
            epoch - 1,
        );
        indices.shuffle(&mut rng);

        let mut running = RunningLoss::new();
        let mut epoch_loss = RunningLoss::new();

        for (batch_index, chunk) in indices.chunks(config.batch_size).enumerate() {
            let mut anchors = Vec::with_capacity(chunk.len());
            let mut partners = Vec::with_capacity(chunk.len());
            let mut flags = Vec::with_capacity(chunk.len());
            for &i in chunk {
                let item = train.get(i, &mut rng)?;
                let partner = item.partner.ok_or_else(|| {
                    TrainError::InvalidConfig("training item has no partner".into())
                })?;
                let is_positive = item.is_positive.ok_or_else(|| {
                    TrainError::InvalidConfig("training item has no pair flag".into())
                })?;
                anchors.push(item.anchor);
                partners.push(partner);
                flags.push(is_positive);
            }

            let anchor_batch = images_to_tensor::<B>(&anchors, dims, batch_index, device)?;
            let partner_batch = images_to_tensor::<B>(&partners, dims, batch_index, device)?;
            let flag_batch = flags_to_tensor::<B>(&flags, device);

            let anchor_emb = model.embed(anchor_batch);
            let partner_emb = model.embed(partner_batch);
            let batch_loss = loss.forward(anchor_emb, partner_emb, flag_batch);
            let loss_val: f32 = batch_loss.clone().into_scalar().elem();

            let grads = GradientsParams::from_grads(batch_loss.backward(), &model);
            model = optimizer.step(lr, model, grads);

            running.update(loss_val as f64);
            epoch_loss.update(loss_val as f64);
            if (batch_index + 1) % config.log_interval == 0 {
                tracing::info!(
                    epoch,
                    batch = batch_index + 1,
                    lr,
                    loss = running.mean(),
                    "train"
                );
                running.reset();
            }
        }

        tracing::info!(epoch, lr, loss = epoch_loss.mean(), "epoch complete");

        if epoch % config.eval_interval == 0 || epoch == config.epochs {
            let map = evaluate_map(
                &model.valid(),
                val,
                train,
                config.top_k,
                config.batch_size,
                device,
            )?;
            final_map = Some(map);
            tracing::info!(epoch, map, "validation");

            if tracker.observe(map) {
                let meta = CheckpointMeta {
                    epoch,
                    best_map: map,
                    experiment_name: config.experiment_name.clone(),
                };
                match save_checkpoint(
                    checkpoint_root,
                    &config.experiment_name,
                    model.clone(),
                    &meta,
                ) {
                    Ok(()) => checkpoints_saved += 1,
                    Err(e) => tracing::error!(epoch, error = %e, "checkpoint save failed"),
                }
            }
        }
    }

    if config.epochs == 0 {
        let map = evaluate_map(
            &model.valid(),
            val,
            train,
            config.top_k,
            config.batch_size,
            device,
        )?;
        final_map = Some(map);
        tracker.observe(map);
        tracing::info!(map, "evaluation-only pass (0 epochs)");
    }

    Ok((
        model,
        FitReport {
            epochs_run: config.epochs,
            best_map: tracker.best(),
            final_map,
            checkpoints_saved,
        },
    ))
}
