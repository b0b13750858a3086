use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::transcribe::Outcome;

pub mod formatters;

pub use formatters::*;

/// Why a reference ended without a transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    ParseError,
    TranscriptsDisabled,
    NoCaptionsAvailable,
    VideoUnavailable,
    RateLimited,
    AudioFetchError,
    SttError,
    WriteError,
    UnknownError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::ParseError => "parse_error",
            FailureReason::TranscriptsDisabled => "transcripts_disabled",
            FailureReason::NoCaptionsAvailable => "no_captions_available",
            FailureReason::VideoUnavailable => "video_unavailable",
            FailureReason::RateLimited => "rate_limited",
            FailureReason::AudioFetchError => "audio_fetch_error",
            FailureReason::SttError => "stt_error",
            FailureReason::WriteError => "write_error",
            FailureReason::UnknownError => "unknown_error",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reference that could not be transcribed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub video_id: String,
    pub title: String,
    pub url: String,
    pub reason: FailureReason,

    /// Short diagnostic, may be empty
    pub detail: String,
}

impl FailureRecord {
    /// `reason` alone, or `reason:detail` when a diagnostic is present
    pub fn reason_label(&self) -> String {
        if self.detail.is_empty() {
            self.reason.to_string()
        } else {
            format!("{}:{}", self.reason, self.detail)
        }
    }
}

/// Failure counts per reason, ordered by descending count then reason name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Breakdown(Vec<(FailureReason, usize)>);

impl Breakdown {
    pub fn from_failures<'a>(failures: impl IntoIterator<Item = &'a FailureRecord>) -> Self {
        let mut counts: BTreeMap<FailureReason, usize> = BTreeMap::new();
        for failure in failures {
            *counts.entry(failure.reason).or_default() += 1;
        }

        let mut entries: Vec<_> = counts.into_iter().collect();
        entries.sort_by(|(a_reason, a_count), (b_reason, b_count)| {
            b_count.cmp(a_count).then_with(|| a_reason.as_str().cmp(b_reason.as_str()))
        });

        Self(entries)
    }

    pub fn entries(&self) -> &[(FailureReason, usize)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, reason: FailureReason) -> usize {
        self.0
            .iter()
            .find(|(r, _)| *r == reason)
            .map_or(0, |(_, count)| *count)
    }
}

impl Serialize for Breakdown {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (reason, count) in &self.0 {
            map.serialize_entry(reason.as_str(), count)?;
        }
        map.end()
    }
}

/// Accounting of one run, derived from its outcomes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub total_in_list: usize,
    pub attempted: usize,
    pub ok: usize,
    pub skipped: usize,
    pub failed: usize,
    pub breakdown: Breakdown,
    pub failures: Vec<FailureRecord>,
    pub output_dir: PathBuf,
    pub generated_at: DateTime<Utc>,
}

impl BatchReport {
    pub fn from_outcomes(outcomes: &[Outcome], total_in_list: usize, output_dir: impl Into<PathBuf>) -> Self {
        let mut ok = 0;
        let mut skipped = 0;
        let mut failures = Vec::new();

        for outcome in outcomes {
            match outcome {
                Outcome::Succeeded { .. } => ok += 1,
                Outcome::Skipped { .. } => skipped += 1,
                Outcome::Failed(record) => failures.push(record.clone()),
            }
        }

        Self {
            total_in_list,
            attempted: outcomes.len(),
            ok,
            skipped,
            failed: failures.len(),
            breakdown: Breakdown::from_failures(&failures),
            failures,
            output_dir: output_dir.into(),
            generated_at: Utc::now(),
        }
    }
}
