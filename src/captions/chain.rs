use std::sync::Arc;

use tracing::debug;

use super::{join_segments, CaptionError, CaptionSource, TranscriptTrack, ENGLISH_CODES, TARGET_LANGUAGE};
use crate::transcribe::{Tier, TranscriptResult};

/// Result of trying a single caption tier
#[derive(Debug)]
pub enum TierAttempt {
    /// The tier produced a usable transcript
    Found(TranscriptResult),

    /// Nothing usable here, the next tier should be tried
    Unavailable,

    /// A reference-level failure that must stop the chain
    Hard(CaptionError),
}

/// Result of running the whole chain without a hard failure
#[derive(Debug)]
pub enum ChainOutcome {
    Found(TranscriptResult),
    Exhausted,
}

/// Caption tiers in the order they are tried
pub const CAPTION_TIERS: [Tier; 4] = [
    Tier::ManualEn,
    Tier::GeneratedEn,
    Tier::Translated,
    Tier::AnyOriginal,
];

/// Ordered fallback across the caption tiers of one provider
pub struct CaptionChain {
    source: Arc<dyn CaptionSource>,
}

impl CaptionChain {
    pub fn new(source: Arc<dyn CaptionSource>) -> Self {
        Self { source }
    }

    /// Return the first usable transcript, stopping at the first tier that yields one.
    ///
    /// Listing errors and reference-level errors raised inside a tier are
    /// returned as `Err`; `Ok(ChainOutcome::Exhausted)` means every tier was
    /// tried and none produced text.
    pub async fn acquire(&self, video_id: &str) -> Result<ChainOutcome, CaptionError> {
        let tracks = self.source.list_tracks(video_id).await?;
        debug!(video_id, tracks = tracks.len(), "Listed caption tracks");

        for tier in CAPTION_TIERS {
            match attempt_tier(tier, &tracks).await {
                TierAttempt::Found(result) => {
                    debug!(video_id, %tier, "Caption tier succeeded");
                    return Ok(ChainOutcome::Found(result));
                }
                TierAttempt::Unavailable => debug!(video_id, %tier, "Caption tier unavailable"),
                TierAttempt::Hard(err) => return Err(err),
            }
        }

        Ok(ChainOutcome::Exhausted)
    }
}

async fn attempt_tier(tier: Tier, tracks: &[Box<dyn TranscriptTrack>]) -> TierAttempt {
    match tier {
        Tier::ManualEn => english_track(tracks, true, tier).await,
        Tier::GeneratedEn => english_track(tracks, false, tier).await,
        Tier::Translated => translated_track(tracks).await,
        Tier::AnyOriginal => any_track(tracks).await,
        Tier::AudioStt => TierAttempt::Unavailable,
    }
}

async fn english_track(tracks: &[Box<dyn TranscriptTrack>], manual: bool, tier: Tier) -> TierAttempt {
    for code in ENGLISH_CODES {
        let Some(track) = tracks
            .iter()
            .find(|track| track.is_manual() == manual && track.language_code() == code)
        else {
            continue;
        };

        match fetch_text(track.as_ref(), tier).await {
            TierAttempt::Unavailable => continue,
            decided => return decided,
        }
    }

    TierAttempt::Unavailable
}

/// Exactly one translation attempt, preferring a manually created source track
async fn translated_track(tracks: &[Box<dyn TranscriptTrack>]) -> TierAttempt {
    let candidate = tracks
        .iter()
        .find(|track| track.is_translatable() && track.is_manual())
        .or_else(|| tracks.iter().find(|track| track.is_translatable()));

    let Some(track) = candidate else {
        return TierAttempt::Unavailable;
    };

    match track.translate(TARGET_LANGUAGE) {
        Ok(translated) => fetch_text(translated.as_ref(), Tier::Translated).await,
        Err(err) => tier_error(err, Tier::Translated),
    }
}

async fn any_track(tracks: &[Box<dyn TranscriptTrack>]) -> TierAttempt {
    for track in tracks {
        match fetch_text(track.as_ref(), Tier::AnyOriginal).await {
            TierAttempt::Unavailable => continue,
            decided => return decided,
        }
    }

    TierAttempt::Unavailable
}

async fn fetch_text(track: &dyn TranscriptTrack, tier: Tier) -> TierAttempt {
    match track.fetch().await {
        Ok(segments) => {
            let text = join_segments(segments.iter().map(|segment| segment.text.as_str()));
            if text.is_empty() {
                debug!(%tier, language = track.language_code(), "Track has no text");
                TierAttempt::Unavailable
            } else {
                TierAttempt::Found(TranscriptResult { text, tier })
            }
        }
        Err(err) => tier_error(err, tier),
    }
}

fn tier_error(err: CaptionError, tier: Tier) -> TierAttempt {
    if err.is_reference_level() {
        TierAttempt::Hard(err)
    } else {
        debug!(%tier, error = %err, "Track fetch failed, falling through");
        TierAttempt::Unavailable
    }
}
