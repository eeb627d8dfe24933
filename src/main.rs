//! Steel Defect Classification CLI
//!
//! Classifies steel surface images, benchmarks the pipeline and prepares the
//! configuration and weight files the server loads.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{info, Level};

use steel_defect::backend::{backend_name, default_device, DefaultBackend};
use steel_defect::inference::benchmark::{run_benchmark, BenchmarkConfig};
use steel_defect::utils::format_confidence_bar;
use steel_defect::utils::logging::{init_logging, LogConfig};
use steel_defect::{Classifier, PipelineConfig, Predictor};

/// Steel Surface Defect Classification
///
/// Ranks the six NEU steel surface defect classes for an image using a
/// ResNet classifier running on the Burn framework.
#[derive(Parser, Debug)]
#[command(name = "steel_defect")]
#[command(version)]
#[command(about = "Steel surface defect classification with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long)]
    log_level: Option<Level>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify one or more images
    Predict {
        /// Image files to classify
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Pipeline configuration (JSON)
        #[arg(short, long, env = "STEEL_DEFECT_CONFIG")]
        config: Option<PathBuf>,

        /// Weight artifact, overriding the configuration
        #[arg(short, long, env = "STEEL_DEFECT_WEIGHTS")]
        weights: Option<PathBuf>,

        /// Number of ranked classes to show
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Print the response body as JSON instead of a table
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Benchmark end-to-end prediction latency
    Benchmark {
        /// Image to classify repeatedly
        image: PathBuf,

        /// Pipeline configuration (JSON)
        #[arg(short, long, env = "STEEL_DEFECT_CONFIG")]
        config: Option<PathBuf>,

        /// Weight artifact, overriding the configuration
        #[arg(short, long, env = "STEEL_DEFECT_WEIGHTS")]
        weights: Option<PathBuf>,

        /// Number of measured iterations
        #[arg(short, long, default_value = "100")]
        iterations: usize,

        /// Number of warmup iterations
        #[arg(long, default_value = "10")]
        warmup: usize,

        /// Output JSON file for benchmark results
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a randomly initialized weight artifact (for smoke tests)
    InitWeights {
        /// Where to write the artifact (extension becomes .mpk)
        #[arg(short, long, default_value = "model/defect_classifier.mpk")]
        output: PathBuf,

        /// Pipeline configuration providing the labels and network layout
        #[arg(short, long, env = "STEEL_DEFECT_CONFIG")]
        config: Option<PathBuf>,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Convert a PyTorch checkpoint into the compact weight artifact
    ImportWeights {
        /// torchvision-style ResNet state_dict (.pth)
        input: PathBuf,

        /// Where to write the artifact (extension becomes .mpk)
        #[arg(short, long, default_value = "model/defect_classifier.mpk")]
        output: PathBuf,

        /// Pipeline configuration providing the labels and network layout
        #[arg(short, long, env = "STEEL_DEFECT_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Write the default pipeline configuration
    InitConfig {
        /// Output file
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,

        /// Replace an existing file
        #[arg(long, default_value = "false")]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    if let Some(level) = cli.log_level {
        log_config = log_config.with_level(level);
    }

    let _ = init_logging(&log_config);

    match cli.command {
        Commands::Predict {
            images,
            config,
            weights,
            top_k,
            json,
        } => {
            cmd_predict(&images, config.as_deref(), weights, top_k, json)?;
        }

        Commands::Benchmark {
            image,
            config,
            weights,
            iterations,
            warmup,
            output,
        } => {
            let bench_config = BenchmarkConfig {
                warmup_iterations: warmup,
                iterations,
                verbose: cli.verbose,
            };
            cmd_benchmark(&image, config.as_deref(), weights, bench_config, output.as_deref())?;
        }

        Commands::InitWeights {
            output,
            config,
            seed,
        } => {
            cmd_init_weights(&output, config.as_deref(), seed)?;
        }

        Commands::ImportWeights {
            input,
            output,
            config,
        } => {
            cmd_import_weights(&input, &output, config.as_deref())?;
        }

        Commands::InitConfig { output, force } => {
            cmd_init_config(&output, force)?;
        }
    }

    Ok(())
}

/// Load the configuration file if one is given, then apply the weights override
fn load_config(path: Option<&Path>, weights: Option<PathBuf>) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            PipelineConfig::load(path)
                .with_context(|| format!("cannot use configuration {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };

    if let Some(weights) = weights {
        config.model.weights = weights;
    }

    Ok(config)
}

fn load_predictor(config: &PipelineConfig) -> Result<Predictor<DefaultBackend>> {
    let device = default_device();
    info!("Using backend: {}", backend_name());

    Predictor::<DefaultBackend>::from_config(config, &device).with_context(|| {
        format!(
            "cannot load classifier from {}",
            config.model.weights.display()
        )
    })
}

fn cmd_predict(
    images: &[PathBuf],
    config: Option<&Path>,
    weights: Option<PathBuf>,
    top_k: Option<usize>,
    json: bool,
) -> Result<()> {
    let config = load_config(config, weights)?;
    let predictor = load_predictor(&config)?;
    let k = top_k.unwrap_or(config.top_k);
    let mut failed = 0;

    for path in images {
        let detailed = match std::fs::read(path)
            .map_err(anyhow::Error::from)
            .and_then(|bytes| Ok(predictor.predict_detailed(&bytes, k)?))
        {
            Ok(detailed) => detailed,
            Err(e) => {
                eprintln!("{} {}: {}", "Error:".red(), path.display(), e);
                failed += 1;
                continue;
            }
        };

        if json {
            println!("{}", serde_json::to_string(&detailed.result_set())?);
            continue;
        }

        println!();
        println!("{} {}", "Image:".cyan().bold(), path.display());
        for (rank, prediction) in detailed.results.iter().enumerate() {
            let line = format!(
                "  {}. {:<16} {}",
                rank + 1,
                prediction.label,
                format_confidence_bar(prediction.confidence, 30)
            );
            if rank == 0 {
                println!("{}", line.green().bold());
            } else {
                println!("{}", line);
            }
        }
        println!(
            "  {} entropy {:.3}, margin {:.3}, {:.1} ms",
            "Stats:".dimmed(),
            detailed.entropy(),
            detailed.margin(),
            detailed.inference_time_ms
        );
    }

    if failed > 0 {
        anyhow::bail!("{} of {} images could not be classified", failed, images.len());
    }

    Ok(())
}

fn cmd_benchmark(
    image: &Path,
    config: Option<&Path>,
    weights: Option<PathBuf>,
    bench_config: BenchmarkConfig,
    output: Option<&Path>,
) -> Result<()> {
    let config = load_config(config, weights)?;
    let predictor = load_predictor(&config)?;
    let bytes = std::fs::read(image).with_context(|| format!("cannot read {}", image.display()))?;

    println!("{}", "Running benchmark...".green().bold());
    println!("  Backend: {}", backend_name());
    println!("  Warmup iterations: {}", bench_config.warmup_iterations);
    println!("  Benchmark iterations: {}", bench_config.iterations);
    println!();

    let result = run_benchmark(&predictor, &bytes, bench_config, backend_name())?;
    println!("{}", result);

    if let Some(output) = output {
        result.save(output)?;
        println!("{} {}", "Results saved to".green(), output.display());
    }

    Ok(())
}

fn cmd_init_weights(output: &Path, config: Option<&Path>, seed: u64) -> Result<()> {
    let config = load_config(config, None)?;
    config.validate()?;

    let device = default_device();
    let classifier = Classifier::<DefaultBackend>::seeded(&config.resnet_config(), seed, &device)?;
    let written = classifier.save(output)?;

    println!(
        "{} {} (seed {}, layers {:?}, base width {})",
        "Wrote random weights to".green(),
        written.display(),
        seed,
        config.model.layers,
        config.model.base_width
    );
    println!(
        "{}",
        "These weights are untrained; use them only to exercise the pipeline.".yellow()
    );

    Ok(())
}

fn cmd_import_weights(input: &Path, output: &Path, config: Option<&Path>) -> Result<()> {
    let config = load_config(config, None)?;
    config.validate()?;

    let device = default_device();
    let classifier =
        Classifier::<DefaultBackend>::import_pytorch(input, &config.resnet_config(), &device)
            .with_context(|| format!("cannot import {}", input.display()))?;
    let written = classifier.save(output)?;

    println!(
        "{} {} -> {}",
        "Imported".green(),
        input.display(),
        written.display()
    );

    Ok(())
}

fn cmd_init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists (pass --force to replace it)",
            output.display()
        );
    }

    PipelineConfig::default().save(output)?;
    println!("{} {}", "Wrote configuration to".green(), output.display());

    Ok(())
}
