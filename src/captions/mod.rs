use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod chain;
pub mod timedtext;
pub mod youtube;

pub use chain::{CaptionChain, ChainOutcome, TierAttempt};
pub use youtube::YoutubeCaptions;

/// Language every caption tier aims for
pub const TARGET_LANGUAGE: &str = "en";

/// English locale codes tried, in order, by the direct English tiers
pub const ENGLISH_CODES: [&str; 3] = ["en", "en-US", "en-GB"];

/// One timed piece of caption text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionSegment {
    pub text: String,

    /// Start offset in seconds
    pub start: f64,

    /// Duration in seconds
    pub duration: f64,
}

impl CaptionSegment {
    pub fn new(text: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            text: text.into(),
            start,
            duration,
        }
    }
}

/// Errors raised by a captions provider
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptionError {
    #[error("Captions are disabled for this video")]
    TranscriptsDisabled,

    #[error("Video is unavailable: {0}")]
    VideoUnavailable(String),

    /// The single throttling signal the engine retries on
    #[error("Rate limited by the captions provider: {0}")]
    RateLimited(String),

    #[error("Captions request failed: {0}")]
    Request(String),

    #[error("Malformed captions response: {0}")]
    Malformed(String),

    #[error("Track cannot be translated to '{0}'")]
    NotTranslatable(String),
}

impl CaptionError {
    /// Whether the error concerns the whole video rather than one track.
    ///
    /// Reference-level errors stop the tier chain immediately; every other
    /// error only makes the current tier unavailable.
    pub fn is_reference_level(&self) -> bool {
        matches!(
            self,
            CaptionError::TranscriptsDisabled
                | CaptionError::VideoUnavailable(_)
                | CaptionError::RateLimited(_)
        )
    }

    /// Variant name, used when reporting uncategorized failures
    pub fn kind_name(&self) -> &'static str {
        match self {
            CaptionError::TranscriptsDisabled => "TranscriptsDisabled",
            CaptionError::VideoUnavailable(_) => "VideoUnavailable",
            CaptionError::RateLimited(_) => "RateLimited",
            CaptionError::Request(_) => "Request",
            CaptionError::Malformed(_) => "Malformed",
            CaptionError::NotTranslatable(_) => "NotTranslatable",
        }
    }
}

/// A single transcript option offered by the captions provider
#[async_trait]
pub trait TranscriptTrack: Send + Sync {
    /// Language code of the track, e.g. `en-US`
    fn language_code(&self) -> &str;

    /// Human-curated (`true`) or machine-generated (`false`)
    fn is_manual(&self) -> bool;

    /// Whether the provider can translate this track
    fn is_translatable(&self) -> bool;

    /// Fetch the ordered segments of the track
    async fn fetch(&self) -> Result<Vec<CaptionSegment>, CaptionError>;

    /// Derive a track that yields this one translated to `target`
    fn translate(&self, target: &str) -> Result<Box<dyn TranscriptTrack>, CaptionError>;
}

/// Query side of a captions provider
#[async_trait]
pub trait CaptionSource: Send + Sync {
    /// List every transcript track available for a video.
    ///
    /// Reports disabled captions, missing videos and throttling as
    /// reference-level [`CaptionError`]s.
    async fn list_tracks(&self, video_id: &str) -> Result<Vec<Box<dyn TranscriptTrack>>, CaptionError>;
}

/// Join trimmed, non-empty segment texts with newlines, in presentation order
pub fn join_segments<'a, I>(texts: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    texts
        .into_iter()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_segments_trims_and_drops_empty() {
        let joined = join_segments(["  hello ", "", "   ", "world\n"]);
        assert_eq!(joined, "hello\nworld");
    }

    #[test]
    fn test_join_segments_all_empty() {
        assert_eq!(join_segments([" ", ""]), "");
    }

    #[test]
    fn test_reference_level_errors() {
        assert!(CaptionError::TranscriptsDisabled.is_reference_level());
        assert!(CaptionError::VideoUnavailable("gone".into()).is_reference_level());
        assert!(CaptionError::RateLimited("429".into()).is_reference_level());
        assert!(!CaptionError::Request("reset".into()).is_reference_level());
        assert!(!CaptionError::Malformed("xml".into()).is_reference_level());
    }
}
