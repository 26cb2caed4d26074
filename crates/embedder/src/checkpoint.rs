//! Checkpoint persistence for trained embedding models.
//!
//! A checkpoint is a directory `{dir}/{experiment}/` holding `model.mpk`
//! (named-MessagePack weights) and `meta.json`. Saves write both files into
//! a staging directory and publish it with a single directory rename, so a
//! loader never observes a half-written checkpoint or a weights/metadata
//! pair from different epochs. An interrupted publish leaves the previous
//! checkpoint stashed at `{experiment}.old`, never a torn mix.

use std::fs;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use serde::{Deserialize, Serialize};

use crate::error::TrainError;

/// Sidecar metadata saved next to the model weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// Epoch after which this checkpoint was taken (1-based).
    pub epoch: usize,
    /// Best validation mAP observed so far.
    pub best_map: f64,
    pub experiment_name: String,
}

fn checkpoint_dir(dir: &Path, experiment: &str) -> PathBuf {
    dir.join(experiment)
}

fn ck<E: std::fmt::Display>(context: &str) -> impl Fn(E) -> TrainError + '_ {
    move |e| TrainError::Checkpoint(format!("{context}: {e}"))
}

/// Save model weights and metadata under `{dir}/{experiment}/`.
///
/// The whole checkpoint is published with one directory rename, so weights
/// and metadata always land together. Overwriting stashes the previous
/// checkpoint at `{experiment}.old` for the instant of the swap; leftovers
/// from an interrupted earlier save are cleared first.
pub fn save_checkpoint<B: Backend, M: Module<B>>(
    dir: &Path,
    experiment: &str,
    model: M,
    meta: &CheckpointMeta,
) -> Result<(), TrainError> {
    let target = checkpoint_dir(dir, experiment);
    let staging = dir.join(format!("{experiment}.staging"));
    let previous = dir.join(format!("{experiment}.old"));

    if staging.exists() {
        fs::remove_dir_all(&staging).map_err(ck("clear stale staging dir"))?;
    }
    if previous.exists() {
        fs::remove_dir_all(&previous).map_err(ck("clear stale stashed checkpoint"))?;
    }
    fs::create_dir_all(&staging).map_err(ck("create staging dir"))?;

    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    model
        .save_file(staging.join("model"), &recorder)
        .map_err(ck("save model weights"))?;

    let meta_path = staging.join("meta.json");
    let file = fs::File::create(&meta_path).map_err(ck("create meta.json"))?;
    serde_json::to_writer_pretty(file, meta).map_err(ck("write meta.json"))?;

    if target.exists() {
        fs::rename(&target, &previous).map_err(ck("stash previous checkpoint"))?;
    }
    fs::rename(&staging, &target).map_err(ck("publish checkpoint"))?;
    if previous.exists() {
        fs::remove_dir_all(&previous).map_err(ck("remove previous checkpoint"))?;
    }

    tracing::info!(
        experiment,
        epoch = meta.epoch,
        best_map = meta.best_map,
        "checkpoint saved"
    );
    Ok(())
}

/// Load weights from `{dir}/{experiment}/model.mpk` into a freshly
/// initialized model of the same architecture.
pub fn load_model<B: Backend, M: Module<B>>(
    dir: &Path,
    experiment: &str,
    model: M,
    device: &B::Device,
) -> Result<M, TrainError> {
    let path = checkpoint_dir(dir, experiment).join("model");
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    model
        .load_file(&path, &recorder, device)
        .map_err(|e| TrainError::Checkpoint(format!("load {}: {e}", path.display())))
}

/// Read the metadata sidecar for an experiment.
pub fn load_meta(dir: &Path, experiment: &str) -> Result<CheckpointMeta, TrainError> {
    let path = checkpoint_dir(dir, experiment).join("meta.json");
    let file = fs::File::open(&path)
        .map_err(|e| TrainError::Checkpoint(format!("open {}: {e}", path.display())))?;
    serde_json::from_reader(file)
        .map_err(|e| TrainError::Checkpoint(format!("parse {}: {e}", path.display())))
}

/// Whether a complete checkpoint exists for an experiment.
pub fn checkpoint_exists(dir: &Path, experiment: &str) -> bool {
    let target = checkpoint_dir(dir, experiment);
    target.join("model.mpk").is_file() && target.join("meta.json").is_file()
}
