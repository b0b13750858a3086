use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod fallback;
pub mod stt;
#[cfg(feature = "whisper")]
pub mod whisper;
pub mod ytdlp;

pub use fallback::{AudioFallback, AudioFallbackError};
pub use stt::{SpeechSegment, SpeechToText, SttRequest, SttTask};
pub use ytdlp::YtDlp;

use crate::Result;

/// Containers tried in order when picking an audio stream
pub const PREFERRED_CONTAINERS: [&str; 2] = ["m4a", "webm"];

/// An audio-only stream offered for a video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioStream {
    /// Provider format identifier, passed back when downloading
    pub format_id: String,

    /// Container extension (m4a, webm, ...)
    pub ext: String,

    /// Average bitrate in kbit/s if known
    pub abr: Option<f64>,

    /// Audio codec name if known
    pub acodec: Option<String>,
}

/// Source of downloadable audio for a video URL
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// List the audio-only streams available for `url`
    async fn list_streams(&self, url: &str) -> Result<Vec<AudioStream>>;

    /// Download `stream` into `dir` as `<stem>.<ext>` and return the file path
    async fn download(&self, url: &str, stream: &AudioStream, dir: &Path, stem: &str) -> Result<PathBuf>;
}

/// Pick the best audio-only stream: m4a first, then webm, then anything,
/// taking the highest bitrate within the chosen container.
pub fn select_best_stream(streams: &[AudioStream]) -> Option<&AudioStream> {
    fn best_of(candidates: Vec<&AudioStream>) -> Option<&AudioStream> {
        candidates.into_iter().max_by(|a, b| {
            a.abr
                .unwrap_or(0.0)
                .partial_cmp(&b.abr.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }

    PREFERRED_CONTAINERS
        .iter()
        .find_map(|ext| best_of(streams.iter().filter(|stream| stream.ext == *ext).collect()))
        .or_else(|| best_of(streams.iter().collect()))
}
