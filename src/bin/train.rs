#![recursion_limit = "256"]

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use burn::module::Module;
use burn::tensor::backend::AutodiffBackend;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "cuda")]
use burn_cuda::Cuda;
#[cfg(feature = "wgpu")]
use burn_wgpu::Wgpu;

use burn_recurrent_towers::{
    RecurrentLm, Trainer, TrainerConfig, TrainingConfig, build_model_config, load_corpus,
    load_training_config,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Train a multi-tower recurrent character language model")]
struct Cli {
    #[command(flatten)]
    train: TrainArgs,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(ClapArgs, Debug)]
struct TrainArgs {
    /// Additional configuration files applied in order (later files override earlier ones).
    #[arg(short = 'c', long = "config", value_name = "PATH", global = true)]
    config: Vec<PathBuf>,
    /// Backend to train on.
    #[arg(long, value_enum, default_value_t = BackendArg::Ndarray)]
    backend: BackendArg,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the character-level vocabulary and exit.
    BuildVocab,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum BackendArg {
    Ndarray,
    Wgpu,
    Cuda,
}

pub fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("burn_recurrent_towers=info".parse()?),
        )
        .init();

    let args = Cli::parse();

    let mut config_paths = vec![PathBuf::from("config/base.toml")];
    config_paths.extend(args.train.config.clone());
    let config = load_training_config(&config_paths)?;

    if matches!(args.command, Some(Command::BuildVocab)) {
        let (vocab, corpora) = load_corpus(&config.dataset, config.training.num_towers)?;
        info!("Vocabulary ready with {} characters", vocab.len());
        info!("{}", corpora.summary());
        return Ok(());
    }

    match args.train.backend {
        BackendArg::Ndarray => {
            train_backend::<Autodiff<NdArray<f32>>, _>(&config, "ndarray", |_| {})
        }
        BackendArg::Wgpu => {
            #[cfg(feature = "wgpu")]
            {
                train_backend::<Autodiff<Wgpu<f32>>, _>(
                    &config,
                    "wgpu",
                    burn_recurrent_towers::wgpu::init_runtime,
                )
            }
            #[cfg(not(feature = "wgpu"))]
            {
                Err(anyhow!(
                    "wgpu backend selected but this build lacks `wgpu` feature; rebuild with `--features wgpu`"
                ))
            }
        }
        BackendArg::Cuda => {
            #[cfg(feature = "cuda")]
            {
                train_backend::<Autodiff<Cuda<f32>>, _>(&config, "cuda", |_| {})
            }
            #[cfg(not(feature = "cuda"))]
            {
                Err(anyhow!(
                    "cuda backend selected but this build lacks `cuda` feature; rebuild with `--features cuda`"
                ))
            }
        }
    }
}

fn train_backend<B, Init>(
    config: &TrainingConfig,
    backend_name: &str,
    init_backend: Init,
) -> Result<()>
where
    B: AutodiffBackend,
    Init: Fn(&B::Device),
{
    let device = B::Device::default();
    B::seed(&device, config.training.seed);
    init_backend(&device);

    let (vocab, corpora) = load_corpus(&config.dataset, config.training.num_towers)?;
    info!("{}", corpora.summary());

    let model_config = build_model_config(&config.model, vocab.len());
    model_config.validate()?;
    let model = RecurrentLm::<B>::new(model_config, &device);
    info!(
        "[train:{backend_name}] {} cell, hidden={}, vocab={}, params={}",
        model.kind(),
        model.hidden_size(),
        model.vocab_size(),
        model.num_params()
    );

    let outcome = Trainer::new(TrainerConfig::from(config), model, device)?.fit(&corpora)?;
    match outcome.report.last() {
        Some(last) => info!(
            "Training complete on {backend_name}: {} epochs, final perplexity {:.2}",
            last.epoch, last.perplexity
        ),
        None => info!("Training complete on {backend_name}: no epochs configured"),
    }
    Ok(())
}
