//! Train and eval pipelines wiring datasets, models, and the training loop.

use std::path::PathBuf;
use std::sync::Arc;

use burn::backend::ndarray::NdArray;
use burn::backend::Autodiff;
use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressStyle};

use embedder::checkpoint::load_meta;
use embedder::{
    fit, mean_average_precision, ConvEmbeddingNetConfig, Embedder, ImageEmbedder,
    MlpEmbeddingNetConfig, TrainingConfig,
};
use pairdata::{cluster_dataset, InMemoryDataset, LabeledDataset, PairDataset, PairMode};

use crate::config::{
    build_sampler_config, build_training_config, load_train_toml, DatasetToml, TrainToml,
    TrainingCliOverrides,
};

type Backend = NdArray<f32>;
type AutodiffBackend = Autodiff<Backend>;

/// Embedding network architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelKind {
    /// Two-layer perceptron over flattened pixels.
    Mlp,
    /// Convolutional network with batch norm and max pooling.
    Conv,
}

pub struct TrainArgs {
    pub config: Option<PathBuf>,
    pub model: ModelKind,
    pub embedding_dim: usize,
    pub overrides: TrainingCliOverrides,
}

pub struct EvalArgs {
    pub config: Option<PathBuf>,
    pub model: ModelKind,
    pub embedding_dim: usize,
    pub experiment_name: String,
    pub checkpoint_dir: String,
    pub top_k: usize,
}

fn load_toml(path: &Option<PathBuf>) -> anyhow::Result<TrainToml> {
    match path {
        Some(p) => load_train_toml(p),
        None => Ok(TrainToml::default()),
    }
}

fn build_datasets(
    dataset: &DatasetToml,
) -> anyhow::Result<(Arc<InMemoryDataset>, Arc<InMemoryDataset>)> {
    let train = cluster_dataset(
        dataset.classes,
        dataset.train_per_class,
        dataset.dims,
        dataset.noise,
        dataset.seed,
    )?;
    let val = cluster_dataset(
        dataset.classes,
        dataset.val_per_class,
        dataset.dims,
        dataset.noise,
        dataset.seed.wrapping_add(1),
    )?;
    tracing::info!(
        classes = dataset.classes,
        train_items = train.len(),
        val_items = val.len(),
        dims = ?dataset.dims,
        "built synthetic cluster datasets"
    );
    Ok((Arc::new(train), Arc::new(val)))
}

fn input_elems(dims: [usize; 3]) -> usize {
    dims[0] * dims[1] * dims[2]
}

/// Train an embedding model and report the best validation mAP.
pub fn run_train(args: TrainArgs) -> anyhow::Result<()> {
    let toml_config = load_toml(&args.config)?;
    let training = build_training_config(&toml_config.training, &args.overrides);
    let sampler = build_sampler_config(&toml_config.sampler);
    let (train_base, val_base) = build_datasets(&toml_config.dataset)?;
    let dims = toml_config.dataset.dims;

    let train_pairs = PairDataset::new(train_base, sampler, PairMode::Train)?;
    let val_pairs = PairDataset::new(val_base, sampler, PairMode::Eval)?;

    let device = Default::default();
    let report = match args.model {
        ModelKind::Mlp => {
            let model = MlpEmbeddingNetConfig::new(input_elems(dims))
                .with_embedding_dim(args.embedding_dim)
                .init::<AutodiffBackend>(&device)?;
            fit(&training, model, &train_pairs, &val_pairs, &device)?.1
        }
        ModelKind::Conv => {
            anyhow::ensure!(
                dims[1] == dims[2],
                "conv model requires square images, got {}x{}",
                dims[1],
                dims[2]
            );
            let model = ConvEmbeddingNetConfig::new(dims[0], dims[1])
                .with_embedding_dim(args.embedding_dim)
                .init::<AutodiffBackend>(&device)?;
            fit(&training, model, &train_pairs, &val_pairs, &device)?.1
        }
    };

    println!("epochs run:        {}", report.epochs_run);
    if let Some(map) = report.best_map {
        println!("best val mAP@{}:   {map:.4}", training.top_k);
    }
    if let Some(map) = report.final_map {
        println!("final val mAP@{}:  {map:.4}", training.top_k);
    }
    println!("checkpoints saved: {}", report.checkpoints_saved);
    println!(
        "checkpoint path:   {}/{}",
        training.checkpoint_dir, training.experiment_name
    );
    Ok(())
}

/// Score a checkpointed model: validation queries against the train gallery.
pub fn run_eval(args: EvalArgs) -> anyhow::Result<()> {
    let toml_config = load_toml(&args.config)?;
    let (train_base, val_base) = build_datasets(&toml_config.dataset)?;
    let dims = toml_config.dataset.dims;
    let checkpoint_dir = std::path::Path::new(&args.checkpoint_dir);

    let meta = load_meta(checkpoint_dir, &args.experiment_name)?;
    tracing::info!(
        experiment = %meta.experiment_name,
        epoch = meta.epoch,
        best_map = meta.best_map,
        "loaded checkpoint metadata"
    );

    let device = Default::default();
    let map = match args.model {
        ModelKind::Mlp => {
            let fresh = MlpEmbeddingNetConfig::new(input_elems(dims))
                .with_embedding_dim(args.embedding_dim)
                .init::<Backend>(&device)?;
            let embedder = Embedder::<Backend, _>::load(
                checkpoint_dir,
                &args.experiment_name,
                fresh,
                device,
            )?;
            score(&embedder, val_base.as_ref(), train_base.as_ref(), args.top_k)?
        }
        ModelKind::Conv => {
            anyhow::ensure!(
                dims[1] == dims[2],
                "conv model requires square images, got {}x{}",
                dims[1],
                dims[2]
            );
            let fresh = ConvEmbeddingNetConfig::new(dims[0], dims[1])
                .with_embedding_dim(args.embedding_dim)
                .init::<Backend>(&device)?;
            let embedder = Embedder::<Backend, _>::load(
                checkpoint_dir,
                &args.experiment_name,
                fresh,
                device,
            )?;
            score(&embedder, val_base.as_ref(), train_base.as_ref(), args.top_k)?
        }
    };

    println!("experiment:      {}", args.experiment_name);
    println!("checkpoint from: epoch {}", meta.epoch);
    println!("mAP@{}:          {map:.4}", args.top_k);
    Ok(())
}

/// Embed queries and gallery with a progress bar, then compute mAP.
fn score<M>(
    embedder: &Embedder<Backend, M>,
    queries: &InMemoryDataset,
    gallery: &InMemoryDataset,
    top_k: usize,
) -> anyhow::Result<f64>
where
    M: ImageEmbedder<Backend> + burn::module::Module<Backend>,
{
    let (query_rows, query_labels) = embed_with_progress(embedder, queries, "queries")?;
    let (gallery_rows, gallery_labels) = embed_with_progress(embedder, gallery, "gallery")?;
    Ok(mean_average_precision(
        &query_rows,
        &query_labels,
        &gallery_rows,
        &gallery_labels,
        top_k,
    )?)
}

fn embed_with_progress<M>(
    embedder: &Embedder<Backend, M>,
    data: &InMemoryDataset,
    what: &str,
) -> anyhow::Result<(Vec<Vec<f32>>, Vec<i64>)>
where
    M: ImageEmbedder<Backend> + burn::module::Module<Backend>,
{
    const CHUNK: usize = 256;
    let dims = data.image_dims();
    let bar = ProgressBar::new(data.len() as u64).with_style(
        ProgressStyle::with_template(&format!(
            "embedding {what} [{{bar:40}}] {{pos}}/{{len}}"
        ))?,
    );

    let mut rows = Vec::with_capacity(data.len());
    let mut labels = Vec::with_capacity(data.len());
    let mut images = Vec::with_capacity(CHUNK);
    for i in 0..data.len() {
        let (image, label) = data
            .get(i)
            .ok_or_else(|| anyhow::anyhow!("dataset index {i} out of bounds"))?;
        images.push(image);
        labels.push(label);
        if images.len() == CHUNK || i + 1 == data.len() {
            rows.extend(embedder.embed_rows(&images, dims)?);
            bar.inc(images.len() as u64);
            images.clear();
        }
    }
    bar.finish_and_clear();
    Ok((rows, labels))
}
