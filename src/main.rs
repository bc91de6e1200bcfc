use anyhow::{Context, Result};
use clap::Parser;
use longscribe::audio::{Waveform, read_wav_file, read_wav_stdin};
use longscribe::chunking::{BatchScheduler, Segmenter};
use longscribe::cli::{ChunkingArgs, Cli, Commands, ConfigAction, TranscribeArgs, is_stdin};
use longscribe::config::Config;
use longscribe::defaults;
use longscribe::output::render;
use longscribe::pipeline::ChunkedPipeline;
use longscribe::stt::{ChunkTranscriber, WhisperTranscriber};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet)?;

    match cli.command {
        Commands::Transcribe(args) => {
            let config = load_config(cli.config.as_deref())?;
            run_transcribe(config, args).await?;
        }
        Commands::Plan { input, chunking } => {
            let config = load_config(cli.config.as_deref())?;
            run_plan(config, &input, &chunking)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let config = load_config(cli.config.as_deref())?;
                print!("{}", toml::to_string_pretty(&config)?);
            }
            ConfigAction::Path => {
                let path = cli
                    .config
                    .or_else(Config::default_path)
                    .context("Could not determine config directory")?;
                println!("{}", path.display());
            }
        },
    }

    Ok(())
}

/// Logs go to stderr; `RUST_LOG` wins over the verbosity flags.
fn init_logging(verbose: u8, quiet: bool) -> Result<()> {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("longscribe={level},warn")));

    let subscriber = tracing_subscriber::Registry::default().with(filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false),
    );
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;
    Ok(())
}

fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        // Load from custom path
        Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?
    } else if let Some(default_path) = Config::default_path() {
        // Try default path, fall back to defaults
        Config::load_or_default(&default_path)?
    } else {
        Config::default()
    };

    // Apply environment variable overrides
    Ok(config.with_env_overrides())
}

fn read_input(input: &Path) -> Result<Waveform> {
    let waveform = if is_stdin(input) {
        read_wav_stdin(defaults::SAMPLE_RATE)?
    } else {
        read_wav_file(input, defaults::SAMPLE_RATE)
            .with_context(|| format!("Failed to read {}", input.display()))?
    };
    Ok(waveform)
}

async fn run_transcribe(mut config: Config, args: TranscribeArgs) -> Result<()> {
    args.apply(&mut config);
    config.validate()?;

    let waveform = read_input(&args.input)?;

    let transcriber: Arc<dyn ChunkTranscriber> =
        Arc::new(WhisperTranscriber::new(config.whisper_config())?);
    if !transcriber.is_ready() {
        tracing::warn!(model = transcriber.model_name(), "transcriber is not ready");
    }

    let pipeline = ChunkedPipeline::new(transcriber, config.pipeline_config())?;
    let transcript = pipeline.transcribe(&waveform).await?;
    let rendered = render(&transcript, config.output.format)?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "transcript written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn run_plan(mut config: Config, input: &Path, chunking: &ChunkingArgs) -> Result<()> {
    chunking.apply(&mut config);
    config.validate()?;

    let waveform = read_input(input)?;
    let pipeline_config = config.pipeline_config();
    let segmenter = Segmenter::new(pipeline_config.segmenter, waveform.sample_rate())?;
    let scheduler = BatchScheduler::new(pipeline_config.batch_size)?;
    let windows = segmenter.segment(&waveform)?;
    let rate = waveform.sample_rate();

    println!(
        "{:.2}s of audio, {} window(s) of {:.2}s with {:.2}s overlap, {} batch(es) of up to {}",
        waveform.duration_s(),
        windows.len(),
        pipeline_config.segmenter.chunk_length_s,
        pipeline_config.segmenter.overlap_s,
        scheduler.batch_count(windows.len()),
        scheduler.batch_size()
    );
    for (batch_idx, batch) in scheduler.batches(&windows).enumerate() {
        println!("batch {}", batch_idx);
        for window in batch {
            println!(
                "  #{:<4} {:>9.2}s - {:>9.2}s  ({:.2}s)",
                window.index,
                window.start_s(rate),
                window.end_s(rate),
                window.duration_s(rate)
            );
        }
    }
    Ok(())
}
