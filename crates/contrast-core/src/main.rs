mod config;
mod pipeline;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::TrainingCliOverrides;
use pipeline::{EvalArgs, ModelKind, TrainArgs};

/// contrast: train and evaluate contrastive image embeddings.
#[derive(Parser)]
#[command(name = "contrast", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands for embedding training and retrieval evaluation.
#[derive(Subcommand)]
enum Command {
    /// Train an embedding model on stratified positive/negative pairs.
    Train {
        /// Path to training config TOML file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Embedding network architecture.
        #[arg(long, value_enum, default_value_t = ModelKind::Conv)]
        model: ModelKind,
        /// Output embedding dimension.
        #[arg(long, default_value_t = 32)]
        embedding_dim: usize,
        /// Override the number of training epochs. Zero evaluates only.
        #[arg(long)]
        epochs: Option<usize>,
        /// Override the batch size.
        #[arg(long)]
        batch_size: Option<usize>,
        /// Override the base learning rate.
        #[arg(long)]
        learning_rate: Option<f64>,
        /// Override the contrastive margin.
        #[arg(long)]
        margin: Option<f64>,
        /// Override the retrieval cutoff for validation mAP.
        #[arg(long)]
        top_k: Option<usize>,
        /// Override the shuffle and sampling seed.
        #[arg(long)]
        seed: Option<u64>,
        /// Name of the checkpoint subdirectory for this run.
        #[arg(long)]
        experiment_name: Option<String>,
        /// Root directory for checkpoints.
        #[arg(long)]
        checkpoint_dir: Option<String>,
    },
    /// Score a checkpointed model: validation queries vs. train gallery.
    Eval {
        /// Path to training config TOML file (for dataset parameters).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Architecture of the checkpointed model.
        #[arg(long, value_enum, default_value_t = ModelKind::Conv)]
        model: ModelKind,
        /// Embedding dimension of the checkpointed model.
        #[arg(long, default_value_t = 32)]
        embedding_dim: usize,
        /// Experiment whose checkpoint to load.
        #[arg(long, default_value = "baseline")]
        experiment_name: String,
        /// Root directory for checkpoints.
        #[arg(long, default_value = "checkpoints")]
        checkpoint_dir: String,
        /// Retrieval cutoff.
        #[arg(long, default_value_t = 100)]
        top_k: usize,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Train {
            config,
            model,
            embedding_dim,
            epochs,
            batch_size,
            learning_rate,
            margin,
            top_k,
            seed,
            experiment_name,
            checkpoint_dir,
        } => pipeline::run_train(TrainArgs {
            config,
            model,
            embedding_dim,
            overrides: TrainingCliOverrides {
                epochs,
                batch_size,
                learning_rate,
                margin,
                top_k,
                seed,
                experiment_name,
                checkpoint_dir,
            },
        }),
        Command::Eval {
            config,
            model,
            embedding_dim,
            experiment_name,
            checkpoint_dir,
            top_k,
        } => pipeline::run_eval(EvalArgs {
            config,
            model,
            embedding_dim,
            experiment_name,
            checkpoint_dir,
            top_k,
        }),
    }
}
