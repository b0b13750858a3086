//! Local speech-to-text through whisper.cpp.
//!
//! The model is loaded once; each call decodes the downloaded container to
//! 16 kHz mono PCM with ffmpeg, then runs inference on a blocking thread.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{ensure, Context};
use async_trait::async_trait;
use hound::WavReader;
use tokio::process::Command;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, WhisperVadParams};

use super::{SpeechSegment, SpeechToText, SttRequest, SttTask};
use crate::Result;

pub const SAMPLE_RATE: u32 = 16_000;

pub struct WhisperEngine {
    ctx: Arc<WhisperContext>,
    vad_model_path: String,
    threads: i32,
    ffmpeg_path: String,
}

impl WhisperEngine {
    pub fn load(
        model_path: &Path,
        vad_model_path: &Path,
        threads: Option<usize>,
        ffmpeg_path: impl Into<String>,
    ) -> Result<Self> {
        ensure!(model_path.is_file(), "Whisper model not found at '{}'", model_path.display());
        ensure!(
            vad_model_path.is_file(),
            "VAD model not found at '{}'",
            vad_model_path.display()
        );

        let model = model_path.to_string_lossy();
        let ctx = WhisperContext::new_with_params(&model, WhisperContextParameters::default())
            .with_context(|| format!("failed to load model from path: {model}"))?;

        let threads = threads
            .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(4);

        tracing::info!(model = %model, threads, "Loaded whisper model");

        Ok(Self {
            ctx: Arc::new(ctx),
            vad_model_path: vad_model_path.to_string_lossy().into_owned(),
            threads: threads as i32,
            ffmpeg_path: ffmpeg_path.into(),
        })
    }

    /// Convert any container ffmpeg understands to a 16 kHz mono WAV file
    async fn decode_to_wav(&self, input: &Path, output: &Path) -> Result<()> {
        let result = Command::new(&self.ffmpeg_path)
            .args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
            .arg(input)
            .args(["-vn", "-ac", "1", "-ar", "16000", "-c:a", "pcm_s16le", "-f", "wav"])
            .arg(output)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("failed to launch ffmpeg")?;

        if !result.status.success() {
            let error = String::from_utf8_lossy(&result.stderr);
            anyhow::bail!("ffmpeg failed: {}", error.trim());
        }

        Ok(())
    }
}

fn read_samples(path: &Path) -> Result<Vec<f32>> {
    let reader = WavReader::open(path).context("failed to read WAV data")?;
    let spec = reader.spec();

    ensure!(spec.channels == 1, "expected mono WAV, got {} channels", spec.channels);
    ensure!(
        spec.sample_rate == SAMPLE_RATE,
        "expected {} Hz sample rate, got {} Hz",
        SAMPLE_RATE,
        spec.sample_rate
    );

    reader
        .into_samples::<i16>()
        .map(|sample| Ok(sample? as f32 / i16::MAX as f32))
        .collect()
}

fn run_inference(
    ctx: &WhisperContext,
    samples: &[f32],
    request: &SttRequest,
    vad_model_path: &str,
    threads: i32,
) -> Result<Vec<SpeechSegment>> {
    let mut params = FullParams::new(SamplingStrategy::BeamSearch {
        beam_size: request.beam_size as i32,
        patience: 1.0,
    });

    params.set_n_threads(threads);
    params.set_translate(request.task == SttTask::Translate);
    params.set_language(Some("auto"));
    params.set_no_context(true);
    params.set_print_progress(false);
    params.set_print_special(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);

    let mut vad = WhisperVadParams::new();
    if let Some(min_silence) = request.vad_min_silence_ms {
        vad.set_min_silence_duration(min_silence as i32);
    }
    params.enable_vad(true);
    params.set_vad_model_path(Some(vad_model_path));
    params.set_vad_params(vad);

    let mut state = ctx.create_state().context("failed to create whisper state")?;
    state.full(params, samples).context("failed to run whisper full()")?;

    let mut segments = Vec::new();
    for segment in state.as_iter() {
        let text = segment.to_str().context("failed to get segment text")?;
        // Timestamps are in 10 ms units
        segments.push(SpeechSegment {
            start: segment.start_timestamp() as f64 / 100.0,
            end: segment.end_timestamp() as f64 / 100.0,
            text: text.to_owned(),
        });
    }

    Ok(segments)
}

#[async_trait]
impl SpeechToText for WhisperEngine {
    async fn transcribe(&self, audio: &Path, request: &SttRequest) -> Result<Vec<SpeechSegment>> {
        let parent = audio.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        let wav = tempfile::Builder::new()
            .prefix(".pcm-")
            .suffix(".wav")
            .tempfile_in(&parent)?;

        self.decode_to_wav(audio, wav.path()).await?;

        let wav_path = wav.path().to_path_buf();
        let ctx = Arc::clone(&self.ctx);
        let request = request.clone();
        let vad_model_path = self.vad_model_path.clone();
        let threads = self.threads;

        let segments = tokio::task::spawn_blocking(move || {
            let samples = read_samples(&wav_path)?;
            tracing::debug!(samples = samples.len(), "Running whisper inference");
            run_inference(&ctx, &samples, &request, &vad_model_path, threads)
        })
        .await
        .context("whisper task panicked")??;

        drop(wav);
        Ok(segments)
    }
}
