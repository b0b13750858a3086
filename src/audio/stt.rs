use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// What the speech-to-text engine should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SttTask {
    /// Verbatim text in the spoken language
    Transcribe,

    /// English text regardless of the spoken language
    Translate,
}

/// Parameters of a single speech-to-text run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SttRequest {
    pub task: SttTask,

    /// Skip silences at least this long (milliseconds); `None` disables VAD
    pub vad_min_silence_ms: Option<u32>,

    /// Beam width used while decoding
    pub beam_size: u32,
}

impl Default for SttRequest {
    fn default() -> Self {
        Self {
            task: SttTask::Translate,
            vad_min_silence_ms: Some(500),
            beam_size: 5,
        }
    }
}

/// One recognized span of speech
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechSegment {
    /// Start offset in seconds
    pub start: f64,

    /// End offset in seconds
    pub end: f64,

    pub text: String,
}

/// Local speech-to-text engine.
///
/// Implementations are constructed once per run and shared by every
/// reference that reaches the audio tier.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: &Path, request: &SttRequest) -> Result<Vec<SpeechSegment>>;
}
