use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use transcript_harvester::audio::AudioFallback;
use transcript_harvester::captions::YoutubeCaptions;
use transcript_harvester::input::{parse_line, read_list};
use transcript_harvester::output::{failures_csv, summary_json, summary_text};
use transcript_harvester::transcribe::{watch_interrupts, BatchObserver};
use transcript_harvester::utils::{self, format_duration};
use transcript_harvester::{
    AcquisitionEngine, Batch, BatchReport, Cli, Commands, Config, HarvestError, Outcome, VideoReference,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match cli.command {
        Commands::Run {
            list,
            out,
            limit,
            audio,
            no_audio,
            config,
        } => {
            let mut config = Config::load(config.as_deref())?;
            config.apply_overrides(out, limit, Commands::audio_override(audio, no_audio));
            config.validate()?;

            run(&list, &config, cli.quiet).await?;
        }
        Commands::Config { show, config } => {
            let loaded = Config::load(config.as_deref())?;
            if show {
                loaded.display();
            } else {
                let path = match config {
                    Some(path) => path,
                    None => Config::config_path()?,
                };
                println!("Configuration file: {}", path.display());
                println!("Edit it to change output, pacing, retry and audio settings.");
            }
        }
        Commands::Check { config } => {
            let config = Config::load(config.as_deref())?;
            check(&config).await;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("transcript_harvester=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("transcript_harvester=info"))
    };

    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

async fn run(list: &Path, config: &Config, quiet: bool) -> Result<()> {
    let lines = read_list(list)?;
    let total_in_list = lines.len();
    let limit = config.pipeline.batch_limit.unwrap_or(usize::MAX);
    let references: Vec<VideoReference> = lines.iter().take(limit).map(|line| parse_line(line)).collect();

    let output_dir = &config.pipeline.output_dir;
    fs_err::create_dir_all(output_dir).context("Failed to create output directory")?;

    tracing::info!(
        "Processing {} of {} videos into {}",
        references.len(),
        total_in_list,
        output_dir.display()
    );

    let captions = YoutubeCaptions::new(
        config.captions.base_url.clone(),
        Duration::from_secs(config.captions.request_timeout_secs),
    )?;
    let mut engine = AcquisitionEngine::new(Arc::new(captions), config.backoff(), output_dir);
    if config.audio.enabled {
        engine = engine.with_audio(build_audio_fallback(config).await?);
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if watch_interrupts(ctrl_c, tokio::signal::ctrl_c).await {
            eprintln!("Aborted");
            std::process::exit(130);
        }
    });

    let started = Instant::now();
    let mut progress = ProgressObserver::new(references.len(), quiet);
    let report = Batch::new(engine, config.pacing())
        .run(&references, total_in_list, &cancel, &mut progress)
        .await;
    progress.finish();

    write_reports(config, &report)?;

    println!(
        "{} Transcripts: {}   {} Failed: {}   {} Skipped existing: {}   ({})",
        style("✔").green().bold(),
        report.ok,
        style("✖").red().bold(),
        report.failed,
        style("↻").cyan().bold(),
        report.skipped,
        format_duration(started.elapsed().as_secs_f64()),
    );
    println!("Summary: {}", config.reports.summary_txt.display());

    if cancel.is_cancelled() {
        println!("{}", style("Stopped early; rerun to pick up the remaining videos.").yellow());
    }

    Ok(())
}

#[cfg(feature = "whisper")]
async fn build_audio_fallback(config: &Config) -> Result<AudioFallback> {
    use transcript_harvester::audio::whisper::WhisperEngine;
    use transcript_harvester::audio::YtDlp;

    let missing = utils::check_dependencies(&config.audio.yt_dlp_path, &config.audio.ffmpeg_path).await;
    if !missing.is_empty() {
        return Err(HarvestError::MissingDependency(missing.join("; ")).into());
    }

    let audio = config.audio.clone();
    let engine = tokio::task::spawn_blocking(move || {
        WhisperEngine::load(
            &audio.model_path,
            &audio.vad_model_path,
            audio.threads,
            audio.ffmpeg_path,
        )
    })
    .await
    .context("Model loading task panicked")??;

    Ok(AudioFallback::new(
        Arc::new(YtDlp::new(config.audio.yt_dlp_path.clone())),
        Arc::new(engine),
        config.audio.audio_dir.clone(),
        config.stt_request(),
    ))
}

#[cfg(not(feature = "whisper"))]
async fn build_audio_fallback(_config: &Config) -> Result<AudioFallback> {
    Err(HarvestError::AudioUnsupported.into())
}

async fn check(config: &Config) {
    let missing = utils::check_dependencies(&config.audio.yt_dlp_path, &config.audio.ffmpeg_path).await;

    if missing.is_empty() {
        println!("{} yt-dlp and ffmpeg are available", style("✔").green().bold());
    } else {
        println!("{} Missing tools:", style("⚠").yellow().bold());
        for dep in &missing {
            println!("   • {}", dep);
        }
        println!("   (Only needed for the speech-to-text fallback)");
    }

    if cfg!(feature = "whisper") {
        for (label, model) in [("Whisper", &config.audio.model_path), ("VAD", &config.audio.vad_model_path)] {
            if model.is_file() {
                println!("{} {} model found at {}", style("✔").green().bold(), label, model.display());
            } else {
                println!("{} {} model not found at {}", style("⚠").yellow().bold(), label, model.display());
            }
        }
    } else {
        println!("{} Built without speech-to-text support (feature `whisper`)", style("ℹ").cyan());
    }
}

fn write_reports(config: &Config, report: &BatchReport) -> Result<()> {
    let reports = &config.reports;

    fs_err::write(&reports.summary_json, summary_json(report, &reports.failures_csv)?)
        .context("Failed to write JSON summary")?;
    fs_err::write(&reports.summary_txt, summary_text(report, &reports.failures_csv))
        .context("Failed to write text summary")?;

    if report.failed > 0 {
        fs_err::write(&reports.failures_csv, failures_csv(report)).context("Failed to write failure list")?;
    }

    Ok(())
}

/// Drives the progress bar from batch events
struct ProgressObserver {
    bar: Option<ProgressBar>,
}

impl ProgressObserver {
    fn new(len: usize, quiet: bool) -> Self {
        let bar = (!quiet).then(|| {
            let bar = ProgressBar::new(len as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=>-"),
            );
            bar
        });

        Self { bar }
    }

    fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message("Done");
        }
    }
}

impl BatchObserver for ProgressObserver {
    fn on_start(&mut self, _index: usize, reference: &VideoReference) {
        if let Some(bar) = &self.bar {
            bar.set_message(reference.title.clone());
        }
    }

    fn on_outcome(&mut self, _index: usize, outcome: &Outcome) {
        let Some(bar) = &self.bar else {
            return;
        };

        if let Outcome::Failed(record) = outcome {
            bar.println(format!(
                "{} {} ({})",
                style("✖").red(),
                record.title,
                record.reason_label()
            ));
        }
        bar.inc(1);
    }
}
