use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::{SttRequest, SttTask};
use crate::captions::youtube::DEFAULT_BASE_URL;
use crate::transcribe::{Backoff, Pacing};
use crate::{HarvestError, Result};

/// Name of the per-project configuration file
pub const LOCAL_CONFIG: &str = "harvest.yaml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Batch behavior
    pub pipeline: PipelineConfig,

    /// Captions provider settings
    pub captions: CaptionsConfig,

    /// Audio speech-to-text fallback
    pub audio: AudioConfig,

    /// Report file names
    pub reports: ReportsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory receiving one `.txt` artifact per video
    pub output_dir: PathBuf,

    /// Only process the first N references of the list
    pub batch_limit: Option<usize>,

    /// Pause after each success (milliseconds)
    pub pacing_ms: u64,

    /// Extra random pause bounds added to `pacing_ms`
    pub pacing_jitter_ms: [u64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionsConfig {
    pub base_url: String,

    /// Retries spent on rate-limit signals before giving up on a video
    pub max_retries: u32,

    /// Backoff base; retry `n` waits `2^n * cooldown_ms` plus jitter
    pub cooldown_ms: u64,

    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Fall back to speech-to-text when no captions exist
    pub enabled: bool,

    /// Scratch directory for downloaded audio
    pub audio_dir: PathBuf,

    pub yt_dlp_path: String,
    pub ffmpeg_path: String,

    /// ggml whisper model
    pub model_path: PathBuf,

    /// Silero VAD model; speech-to-text always runs with VAD
    pub vad_model_path: PathBuf,

    pub min_silence_ms: u32,
    pub beam_size: u32,

    /// Inference threads, all cores when unset
    pub threads: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportsConfig {
    pub summary_json: PathBuf,
    pub summary_txt: PathBuf,
    pub failures_csv: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("t"),
            batch_limit: None,
            pacing_ms: 400,
            pacing_jitter_ms: [50, 200],
        }
    }
}

impl Default for CaptionsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_retries: 6,
            cooldown_ms: 800,
            request_timeout_secs: 30,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            audio_dir: PathBuf::from("a"),
            yt_dlp_path: "yt-dlp".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            model_path: PathBuf::from("models/ggml-small.bin"),
            vad_model_path: PathBuf::from("models/ggml-silero-v5.1.2.bin"),
            min_silence_ms: 500,
            beam_size: 5,
            threads: None,
        }
    }
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            summary_json: PathBuf::from("transcript_report_summary.json"),
            summary_txt: PathBuf::from("transcript_report_summary.txt"),
            failures_csv: PathBuf::from("transcript_failures.csv"),
        }
    }
}

impl Config {
    /// Load configuration, creating the user-level file with defaults when
    /// nothing exists yet.
    ///
    /// An explicit path must exist; otherwise `./harvest.yaml` wins over the
    /// user configuration directory.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save_to(&config_path)?;
            tracing::info!("Wrote default configuration to {}", config_path.display());
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read config file")?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from(LOCAL_CONFIG);
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("transcript-harvester").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.output_dir.as_os_str().is_empty() {
            return Err(HarvestError::InvalidConfig("pipeline.output_dir must not be empty".to_string()).into());
        }

        let [low, high] = self.pipeline.pacing_jitter_ms;
        if low > high {
            return Err(HarvestError::InvalidConfig(format!(
                "pipeline.pacing_jitter_ms bounds are inverted: [{low}, {high}]"
            ))
            .into());
        }

        if self.audio.beam_size == 0 {
            return Err(HarvestError::InvalidConfig("audio.beam_size must be at least 1".to_string()).into());
        }

        if self.audio.enabled && self.audio.vad_model_path.as_os_str().is_empty() {
            return Err(HarvestError::InvalidConfig(
                "audio.vad_model_path is required when the audio fallback is enabled".to_string(),
            )
            .into());
        }

        if self.audio.audio_dir.as_os_str().is_empty() {
            return Err(HarvestError::InvalidConfig("audio.audio_dir must not be empty".to_string()).into());
        }

        url::Url::parse(&self.captions.base_url)
            .map_err(|e| HarvestError::InvalidConfig(format!("captions.base_url: {e}")))?;

        Ok(())
    }

    /// Apply command-line overrides on top of the file values
    pub fn apply_overrides(&mut self, output_dir: Option<PathBuf>, limit: Option<usize>, audio: Option<bool>) {
        if let Some(dir) = output_dir {
            self.pipeline.output_dir = dir;
        }
        if limit.is_some() {
            self.pipeline.batch_limit = limit;
        }
        if let Some(enabled) = audio {
            self.audio.enabled = enabled;
        }
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(Duration::from_millis(self.captions.cooldown_ms), self.captions.max_retries)
    }

    pub fn pacing(&self) -> Pacing {
        let [low, high] = self.pipeline.pacing_jitter_ms;
        Pacing::new(
            Duration::from_millis(self.pipeline.pacing_ms),
            Duration::from_millis(low),
            Duration::from_millis(high),
        )
    }

    pub fn stt_request(&self) -> SttRequest {
        SttRequest {
            task: SttTask::Translate,
            vad_min_silence_ms: Some(self.audio.min_silence_ms),
            beam_size: self.audio.beam_size,
        }
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Output Dir: {}", self.pipeline.output_dir.display());
        match self.pipeline.batch_limit {
            Some(limit) => println!("  Batch Limit: {}", limit),
            None => println!("  Batch Limit: none"),
        }
        println!(
            "  Pacing: {} ms + {}-{} ms",
            self.pipeline.pacing_ms, self.pipeline.pacing_jitter_ms[0], self.pipeline.pacing_jitter_ms[1]
        );
        println!("  Captions: {}", self.captions.base_url);
        println!(
            "  Rate-limit Retries: {} (cooldown {} ms)",
            self.captions.max_retries, self.captions.cooldown_ms
        );
        println!("  Audio Fallback: {}", if self.audio.enabled { "enabled" } else { "disabled" });
        if self.audio.enabled {
            println!("  Audio Dir: {}", self.audio.audio_dir.display());
            println!("  Model: {}", self.audio.model_path.display());
            println!(
                "  VAD Model: {} (min silence {} ms)",
                self.audio.vad_model_path.display(),
                self.audio.min_silence_ms
            );
            println!("  Beam Size: {}", self.audio.beam_size);
        }
    }
}
