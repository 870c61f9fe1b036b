//! DDR — distributional density regression
//!
//! Builds a network (or loads one from a checkpoint), evaluates it on feature
//! rows given on the command line, and prints each row's predictive
//! histogram with summary statistics.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use ddr::model::{Ddr, DdrConfig};
use ddr::nn::device::detect_device;
use ddr::nn::{ModeControl, Parameters, Placement};
use ddr::runtime::{configure_threads, current_threads};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// DDR predictive-distribution CLI.
#[derive(Parser, Debug)]
#[command(
    name = "ddr",
    about = "DDR — predict histogram distributions over fixed cutpoints",
    version
)]
struct Cli {
    /// Input feature dimension.
    #[arg(short = 'p', long, default_value_t = 1)]
    features: usize,

    /// Comma-separated, strictly increasing bin edges.
    #[arg(
        short,
        long,
        value_delimiter = ',',
        allow_hyphen_values = true,
        default_values_t = vec![0.0, 1.0, 2.0, 3.0, 4.0]
    )]
    cutpoints: Vec<f32>,

    /// Number of hidden blocks.
    #[arg(long, default_value_t = ddr::config::DEFAULT_NUM_HIDDEN_LAYERS)]
    num_hidden_layers: usize,

    /// Hidden width.
    #[arg(long, default_value_t = ddr::config::DEFAULT_HIDDEN_SIZE)]
    hidden_size: usize,

    /// Dropout probability (active only with --train-mode).
    #[arg(long, default_value_t = ddr::config::DEFAULT_DROPOUT_RATE)]
    dropout_rate: f32,

    /// Seed for initialisation, dropout, demo rows, and sampling.
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// Worker pool size.
    #[arg(short, long, default_value_t = ddr::config::DEFAULT_NUM_THREADS)]
    threads: usize,

    /// Load parameters from this checkpoint instead of initialising.
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Write the model's checkpoint here after evaluation.
    #[arg(long)]
    save: Option<PathBuf>,

    /// Keep dropout active while predicting.
    #[arg(long, default_value_t = false)]
    train_mode: bool,

    /// Draws to print per row.
    #[arg(long, default_value_t = 0)]
    samples: usize,

    /// Standard-normal rows to evaluate when no rows are given.
    #[arg(long, default_value_t = 4)]
    demo_rows: usize,

    /// Feature rows, each a comma-separated list of `features` numbers.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    rows: Vec<String>,
}

fn parse_rows(rows: &[String], p: usize) -> Result<Array2<f32>> {
    let mut values = Vec::with_capacity(rows.len() * p);
    for (i, row) in rows.iter().enumerate() {
        let parsed = row
            .split(',')
            .map(|s| s.trim().parse::<f32>())
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("row {}: {:?} is not a list of numbers", i, row))?;
        if parsed.len() != p {
            bail!("row {} has {} features, model expects {}", i, parsed.len(), p);
        }
        values.extend(parsed);
    }
    Ok(Array2::from_shape_vec((rows.len(), p), values)?)
}

fn format_row(values: impl Iterator<Item = f32>) -> String {
    values
        .map(|v| format!("{:.4}", v))
        .collect::<Vec<_>>()
        .join(", ")
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    tracing::info!("DDR v{}", env!("CARGO_PKG_VERSION"));
    configure_threads(cli.threads).context("configuring worker pool")?;
    tracing::info!("Workers: {}", current_threads());

    let mut model = match &cli.checkpoint {
        Some(path) => {
            tracing::info!("Checkpoint: {}", path.display());
            Ddr::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => {
            let config = DdrConfig {
                p: cli.features,
                num_hidden_layers: cli.num_hidden_layers,
                hidden_size: cli.hidden_size,
                dropout_rate: cli.dropout_rate,
                seed: cli.seed,
            };
            Ddr::with_cutpoints(config, cli.cutpoints.clone()).context("building model")?
        }
    };

    let device = detect_device();
    model
        .to_device(device)
        .with_context(|| format!("placing model on {}", device))?;

    if cli.train_mode {
        model.train();
    } else {
        model.eval();
    }

    tracing::info!(
        "Model: p={}, {} hidden layer(s) x {}, {} bins on [{}, {}], {} parameters, mode {:?}, device {}",
        model.p(),
        model.config().num_hidden_layers,
        model.config().hidden_size,
        model.num_bins(),
        model.cutpoints().lower(),
        model.cutpoints().upper(),
        model.num_parameters(),
        model.mode(),
        model.device(),
    );

    let mut rng = StdRng::seed_from_u64(cli.seed);
    let x = if cli.rows.is_empty() {
        tracing::warn!("No rows provided. Evaluating {} standard-normal rows.", cli.demo_rows);
        Array2::from_shape_fn((cli.demo_rows, model.p()), |_| {
            rng.sample::<f32, _>(StandardNormal)
        })
    } else {
        parse_rows(&cli.rows, model.p())?
    };

    let dists = model.distributions(&x).context("evaluating model")?;
    let mean = dists.mean();
    let stddev = dists.stddev();
    let median = dists.quantile(0.5)?;

    for (i, (features, probs)) in x.rows().into_iter().zip(dists.probs().rows()).enumerate() {
        println!("row {}: x = [{}]", i, format_row(features.iter().copied()));
        println!("  probs  = [{}]", format_row(probs.iter().copied()));
        println!(
            "  mean = {:.4}  sd = {:.4}  median = {:.4}",
            mean[i], stddev[i], median[i]
        );
    }

    if cli.samples > 0 {
        let draws = dists.sample_n(cli.samples, &mut rng)?;
        for (i, column) in draws.columns().into_iter().enumerate() {
            println!("row {} samples: [{}]", i, format_row(column.iter().copied()));
        }
    }

    if let Some(path) = &cli.save {
        model
            .save(path)
            .with_context(|| format!("saving {}", path.display()))?;
        tracing::info!("Saved checkpoint to {}", path.display());
    }

    tracing::info!("Done.");
    Ok(())
}
