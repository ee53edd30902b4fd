//! flowguard - network flow anomaly detection

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use flowguard::config::{ConfigLoader, FlowGuardConfig};
use flowguard::detection::{fit, ModelBundle, Scorer};
use flowguard::ingest::{load_corpus, LogTailer, TailOptions};
use flowguard::logging::{init_logging, LogConfig};
use flowguard::sink::AnomalySink;
use flowguard::summary::AnomalySummary;
use flowguard::StreamProcessor;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "flowguard")]
#[command(version, about = "Streaming anomaly detection for network flow logs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "FLOWGUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Log level or filter directive (overrides config)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit console logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit the scaler and Isolation Forest on a JSONL corpus
    Train {
        /// Training corpus (JSONL)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output path of the model bundle
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Expected share of anomalies, in (0, 1)
        #[arg(long)]
        contamination: Option<f64>,

        /// Number of trees
        #[arg(long)]
        n_estimators: Option<usize>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Maximum number of lines to read from the corpus
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Tail a flow log and persist anomalies
    Stream {
        /// Log file to follow
        #[arg(short, long)]
        log_file: Option<PathBuf>,

        /// Model bundle produced by `train`
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Structured anomaly output (JSONL)
        #[arg(long)]
        anomalies_jsonl: Option<PathBuf>,

        /// Tabular anomaly output (CSV)
        #[arg(long)]
        anomalies_csv: Option<PathBuf>,

        /// Poll interval at end of file, in milliseconds
        #[arg(long)]
        poll_interval_ms: Option<u64>,
    },

    /// Summarize the anomaly CSV
    Summary {
        /// Anomaly CSV (defaults to stream.anomalies_csv)
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Trailing window for the recent count, in minutes
        #[arg(short, long, default_value = "10")]
        window_minutes: i64,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a sample configuration file
    SampleConfig {
        /// Write to this path instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::SampleConfig { output } = &cli.command {
        return sample_config(output.as_ref());
    }

    let mut config = ConfigLoader::new()
        .load_from_file(cli.config.clone())
        .load_from_env()
        .build()?;

    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.json_logs {
        config.logging.json = true;
    }
    let _guard = init_logging(&LogConfig::from(&config.logging))?;

    info!("Starting flowguard v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Train {
            input,
            model,
            contamination,
            n_estimators,
            seed,
            limit,
        } => {
            let training = &mut config.training;
            if let Some(input) = input {
                training.input = input;
            }
            if let Some(model) = model {
                training.model_path = model;
            }
            if let Some(contamination) = contamination {
                training.contamination = contamination;
            }
            if let Some(n_estimators) = n_estimators {
                training.n_estimators = n_estimators;
            }
            if let Some(seed) = seed {
                training.seed = seed;
            }
            if limit.is_some() {
                training.limit = limit;
            }
            config.validate()?;
            train(&config)
        }

        Commands::Stream {
            log_file,
            model,
            anomalies_jsonl,
            anomalies_csv,
            poll_interval_ms,
        } => {
            let stream = &mut config.stream;
            if let Some(log_file) = log_file {
                stream.log_file = log_file;
            }
            if let Some(model) = model {
                stream.model_path = model;
            }
            if let Some(path) = anomalies_jsonl {
                stream.anomalies_jsonl = path;
            }
            if let Some(path) = anomalies_csv {
                stream.anomalies_csv = path;
            }
            if let Some(ms) = poll_interval_ms {
                stream.poll_interval_ms = ms;
            }
            config.validate()?;
            run_stream(&config).await
        }

        Commands::Summary {
            csv,
            window_minutes,
            json,
        } => {
            let path = csv.unwrap_or_else(|| config.stream.anomalies_csv.clone());
            summarize(path, window_minutes, json)
        }

        Commands::SampleConfig { .. } => Ok(()),
    }
}

fn train(config: &FlowGuardConfig) -> Result<()> {
    let training = &config.training;
    info!("🧠 Training on {}", training.input.display());

    let corpus = load_corpus(&training.input, training.limit)
        .with_context(|| format!("Failed to load corpus {}", training.input.display()))?;
    let bundle = fit(&corpus, &training.params())?;
    bundle
        .save(&training.model_path)
        .with_context(|| format!("Failed to save bundle {}", training.model_path.display()))?;

    info!(
        "✅ Model saved to {} ({} trees, {} samples, contamination {})",
        training.model_path.display(),
        bundle.model.n_trees(),
        bundle.training_samples,
        bundle.contamination()
    );
    Ok(())
}

async fn run_stream(config: &FlowGuardConfig) -> Result<()> {
    let stream = &config.stream;

    // バンドルの読み込みに失敗した場合は追跡を始めない
    let bundle = ModelBundle::load(&stream.model_path).map_err(|e| {
        error!("Cannot start scorer: {}", e);
        e
    })?;
    let scorer = Scorer::new(Arc::new(bundle));

    let sink = AnomalySink::open(&stream.anomalies_jsonl, &stream.anomalies_csv)?;

    let cancel = CancellationToken::new();
    let options = TailOptions {
        poll_interval: stream.poll_interval(),
        cancel: cancel.clone(),
    };
    let tailer = LogTailer::open(&stream.log_file, options)
        .await
        .with_context(|| format!("Failed to open log file {}", stream.log_file.display()))?;

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("🛑 Shutdown signal received");
            cancel.cancel();
        }
    });

    let mut processor = StreamProcessor::new(scorer, sink);
    let stats = processor.run(tailer.into_stream()).await?;
    info!("👋 Stream stopped after {} lines", stats.lines_seen);
    Ok(())
}

fn summarize(path: PathBuf, window_minutes: i64, json: bool) -> Result<()> {
    let now = Utc::now().naive_utc();
    let summary = AnomalySummary::from_csv(&path, chrono::Duration::minutes(window_minutes), now)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Anomalies in {}", path.display());
    println!("  total:            {}", summary.total);
    println!("  last {:>3} min:     {}", window_minutes, summary.recent);
    println!("  distinct sources: {}", summary.distinct_src_ips);
    println!("  top destination ports:");
    for entry in summary.top_ports(10) {
        println!("    {:>5}  {}", entry.port, entry.count);
    }
    Ok(())
}

fn sample_config(output: Option<&PathBuf>) -> Result<()> {
    let sample = FlowGuardConfig::sample_toml()?;
    match output {
        Some(path) => {
            std::fs::write(path, sample)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Sample configuration written to {}", path.display());
        }
        None => print!("{}", sample),
    }
    Ok(())
}
