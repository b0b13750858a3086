use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::audio::{AudioFallback, AudioFallbackError};
use crate::captions::{CaptionChain, CaptionError, CaptionSource, ChainOutcome};
use crate::input::VideoReference;
use crate::output::{FailureReason, FailureRecord};
use crate::utils::{artifact_path, truncate_chars};

pub mod backoff;
pub mod batch;
pub mod resume;

pub use backoff::Backoff;
pub use batch::{watch_interrupts, Batch, BatchObserver, Pacing};

/// Longest diagnostic kept on a failure record
pub const MAX_DETAIL_LEN: usize = 200;

/// Strategy that produced a transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Human-made English captions
    ManualEn,

    /// Machine-generated English captions
    GeneratedEn,

    /// A translatable track machine-translated to English
    Translated,

    /// Any track in its original language
    AnyOriginal,

    /// Local speech-to-text over the downloaded audio
    AudioStt,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::ManualEn => "manual_en",
            Tier::GeneratedEn => "generated_en",
            Tier::Translated => "translated",
            Tier::AnyOriginal => "any_original",
            Tier::AudioStt => "audio_stt",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transcript text together with the tier that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptResult {
    /// Non-empty, newline-joined segment text
    pub text: String,
    pub tier: Tier,
}

/// Terminal state of one reference within a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded {
        reference: VideoReference,
        tier: Tier,
        path: PathBuf,
    },
    Skipped {
        reference: VideoReference,
        path: PathBuf,
    },
    Failed(FailureRecord),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded { .. })
    }
}

/// Drives a single reference through the caption tiers and the optional
/// audio fallback, then persists the transcript.
pub struct AcquisitionEngine {
    chain: CaptionChain,
    audio: Option<AudioFallback>,
    backoff: Backoff,
    output_dir: PathBuf,
}

impl AcquisitionEngine {
    pub fn new(captions: Arc<dyn CaptionSource>, backoff: Backoff, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            chain: CaptionChain::new(captions),
            audio: None,
            backoff,
            output_dir: output_dir.into(),
        }
    }

    /// Enable the audio tier for references the captions cannot serve
    pub fn with_audio(mut self, audio: AudioFallback) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    /// Process one reference to its terminal outcome. Never fails: every
    /// error is classified into a [`FailureRecord`].
    pub async fn process(&self, reference: &VideoReference) -> Outcome {
        if !reference.is_parseable() {
            warn!(url = %reference.url, "No video id in input line");
            return self.failed(reference, FailureReason::ParseError, "no video id could be derived");
        }

        let path = artifact_path(&self.output_dir, &reference.title);
        if resume::is_done(&path) {
            info!(video_id = %reference.id, path = %path.display(), "Already transcribed, skipping");
            return Outcome::Skipped {
                reference: reference.clone(),
                path,
            };
        }

        let result = match self.acquire(reference).await {
            Ok(result) => result,
            Err((reason, detail)) => {
                warn!(video_id = %reference.id, %reason, detail = %detail, "Acquisition failed");
                return self.failed(reference, reason, &detail);
            }
        };

        if let Err(e) = resume::write_artifact(&path, reference, &result.text) {
            warn!(video_id = %reference.id, path = %path.display(), "Failed to write transcript: {:#}", e);
            return self.failed(reference, FailureReason::WriteError, &format!("{e:#}"));
        }

        info!(video_id = %reference.id, tier = %result.tier, path = %path.display(), "Transcript saved");
        Outcome::Succeeded {
            reference: reference.clone(),
            tier: result.tier,
            path,
        }
    }

    async fn acquire(&self, reference: &VideoReference) -> Result<TranscriptResult, (FailureReason, String)> {
        let chain = &self.chain;
        let video_id = reference.id.as_str();

        let outcome = self
            .backoff
            .retry(video_id, move || chain.acquire(video_id))
            .await
            .map_err(classify_caption_error)?;

        if let ChainOutcome::Found(result) = outcome {
            return Ok(result);
        }

        let Some(audio) = &self.audio else {
            return Err((FailureReason::NoCaptionsAvailable, String::new()));
        };

        debug!(video_id, "Caption tiers exhausted, falling back to audio");
        match audio.transcribe(reference).await {
            Ok(text) => Ok(TranscriptResult {
                text,
                tier: Tier::AudioStt,
            }),
            Err(e) => Err(classify_audio_error(e)),
        }
    }

    fn failed(&self, reference: &VideoReference, reason: FailureReason, detail: &str) -> Outcome {
        Outcome::Failed(FailureRecord {
            video_id: reference.id.clone(),
            title: reference.title.clone(),
            url: reference.url.clone(),
            reason,
            detail: truncate_chars(detail, MAX_DETAIL_LEN),
        })
    }
}

/// Map a reference-level caption error to its failure reason and diagnostic
pub fn classify_caption_error(err: CaptionError) -> (FailureReason, String) {
    match err {
        CaptionError::TranscriptsDisabled => (FailureReason::TranscriptsDisabled, String::new()),
        CaptionError::VideoUnavailable(reason) => (FailureReason::VideoUnavailable, reason),
        CaptionError::RateLimited(reason) => (FailureReason::RateLimited, reason),
        other => {
            let detail = format!("{}:{}", other.kind_name(), other);
            (FailureReason::UnknownError, truncate_chars(&detail, MAX_DETAIL_LEN))
        }
    }
}

/// Map an audio fallback error to its failure reason and diagnostic
pub fn classify_audio_error(err: AudioFallbackError) -> (FailureReason, String) {
    match err {
        AudioFallbackError::Fetch(message) => (FailureReason::AudioFetchError, message),
        AudioFallbackError::Stt(message) => (FailureReason::SttError, message),
        AudioFallbackError::NoSpeech => (FailureReason::NoCaptionsAvailable, "no speech recognized".to_string()),
    }
}
