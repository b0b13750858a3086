use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use super::{select_best_stream, AudioSource, SpeechToText, SttRequest};
use crate::captions::join_segments;
use crate::input::VideoReference;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioFallbackError {
    #[error("audio fetch failed: {0}")]
    Fetch(String),

    #[error("speech-to-text failed: {0}")]
    Stt(String),

    #[error("no speech recognized")]
    NoSpeech,
}

/// Last-resort transcription: download the best audio stream and run
/// local speech-to-text over it.
pub struct AudioFallback {
    source: Arc<dyn AudioSource>,
    stt: Arc<dyn SpeechToText>,
    audio_dir: PathBuf,
    request: SttRequest,
}

impl AudioFallback {
    pub fn new(
        source: Arc<dyn AudioSource>,
        stt: Arc<dyn SpeechToText>,
        audio_dir: impl Into<PathBuf>,
        request: SttRequest,
    ) -> Self {
        Self {
            source,
            stt,
            audio_dir: audio_dir.into(),
            request,
        }
    }

    /// Produce English text for `reference` from its audio.
    ///
    /// Every file this call downloads into the audio directory is removed
    /// before it returns, whatever the outcome.
    pub async fn transcribe(&self, reference: &VideoReference) -> Result<String, AudioFallbackError> {
        fs_err::create_dir_all(&self.audio_dir).map_err(|e| AudioFallbackError::Fetch(e.to_string()))?;
        let _cleanup = DownloadCleanup::new(&self.audio_dir, &reference.id);

        let streams = self
            .source
            .list_streams(&reference.url)
            .await
            .map_err(|e| AudioFallbackError::Fetch(e.to_string()))?;

        let stream = select_best_stream(&streams)
            .ok_or_else(|| AudioFallbackError::Fetch("no audio-only stream offered".to_string()))?;

        tracing::debug!(video_id = %reference.id, format = %stream.format_id, ext = %stream.ext, "Selected audio stream");

        let audio_path = self
            .source
            .download(&reference.url, stream, &self.audio_dir, &reference.id)
            .await
            .map_err(|e| AudioFallbackError::Fetch(e.to_string()))?;

        let mut segments = self
            .stt
            .transcribe(&audio_path, &self.request)
            .await
            .map_err(|e| AudioFallbackError::Stt(e.to_string()))?;

        segments.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal));

        let text = join_segments(segments.iter().map(|segment| segment.text.as_str()));

        if text.is_empty() {
            return Err(AudioFallbackError::NoSpeech);
        }

        Ok(text)
    }
}

/// Removes `<video_id>.*` from the audio directory when dropped
struct DownloadCleanup {
    dir: PathBuf,
    prefix: String,
}

impl DownloadCleanup {
    fn new(dir: &Path, video_id: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            prefix: format!("{video_id}."),
        }
    }
}

impl Drop for DownloadCleanup {
    fn drop(&mut self) {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return;
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            if name.to_string_lossy().starts_with(&self.prefix) {
                if let Err(e) = std::fs::remove_file(entry.path()) {
                    tracing::warn!("Failed to remove {}: {}", entry.path().display(), e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::stt::MockSpeechToText;
    use crate::audio::{AudioStream, SpeechSegment};
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct FakeAudio {
        streams: Vec<AudioStream>,
    }

    #[async_trait]
    impl AudioSource for FakeAudio {
        async fn list_streams(&self, _url: &str) -> crate::Result<Vec<AudioStream>> {
            Ok(self.streams.clone())
        }

        async fn download(&self, _url: &str, stream: &AudioStream, dir: &Path, stem: &str) -> crate::Result<PathBuf> {
            let path = dir.join(format!("{stem}.{}", stream.ext));
            std::fs::write(&path, b"fake audio")?;
            // Leftover fragment a real downloader might produce
            std::fs::write(dir.join(format!("{stem}.{}.part", stream.ext)), b"")?;
            Ok(path)
        }
    }

    fn m4a() -> AudioStream {
        AudioStream {
            format_id: "140".to_string(),
            ext: "m4a".to_string(),
            abr: Some(128.0),
            acodec: Some("mp4a.40.2".to_string()),
        }
    }

    fn segment(start: f64, text: &str) -> SpeechSegment {
        SpeechSegment {
            start,
            end: start + 1.0,
            text: text.to_string(),
        }
    }

    fn reference() -> VideoReference {
        VideoReference::new("abcDEF12345", "Talk", "https://youtu.be/abcDEF12345")
    }

    fn fallback(dir: &Path, streams: Vec<AudioStream>, stt: MockSpeechToText) -> AudioFallback {
        AudioFallback::new(Arc::new(FakeAudio { streams }), Arc::new(stt), dir, SttRequest::default())
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_transcribe_joins_segments_in_order_and_cleans_up() {
        let temp_dir = TempDir::new().unwrap();
        let audio_dir = temp_dir.path().join("a");

        let mut stt = MockSpeechToText::new();
        stt.expect_transcribe()
            .withf(|path, request| path.ends_with("abcDEF12345.m4a") && request.beam_size == 5)
            .times(1)
            .returning(|_, _| Ok(vec![segment(2.0, " world "), segment(0.0, "hello"), segment(3.0, "  ")]));

        let text = fallback(&audio_dir, vec![m4a()], stt)
            .transcribe(&reference())
            .await
            .unwrap();

        assert_eq!(text, "hello\nworld");
        assert!(dir_is_empty(&audio_dir));
    }

    #[tokio::test]
    async fn test_stt_failure_still_cleans_up() {
        let temp_dir = TempDir::new().unwrap();
        let audio_dir = temp_dir.path().join("a");
        std::fs::create_dir_all(&audio_dir).unwrap();
        std::fs::write(audio_dir.join("other.m4a"), b"keep").unwrap();

        let mut stt = MockSpeechToText::new();
        stt.expect_transcribe()
            .returning(|_, _| Err(anyhow::anyhow!("model crashed")));

        let err = fallback(&audio_dir, vec![m4a()], stt)
            .transcribe(&reference())
            .await
            .unwrap_err();

        assert_eq!(err, AudioFallbackError::Stt("model crashed".to_string()));
        let remaining: Vec<_> = std::fs::read_dir(&audio_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(remaining, vec!["other.m4a"]);
    }

    #[tokio::test]
    async fn test_no_streams_is_fetch_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut stt = MockSpeechToText::new();
        stt.expect_transcribe().never();

        let err = fallback(temp_dir.path(), Vec::new(), stt)
            .transcribe(&reference())
            .await
            .unwrap_err();

        assert!(matches!(err, AudioFallbackError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_empty_recognition_is_no_speech() {
        let temp_dir = TempDir::new().unwrap();
        let mut stt = MockSpeechToText::new();
        stt.expect_transcribe().returning(|_, _| Ok(vec![segment(0.0, " ")]));

        let err = fallback(temp_dir.path(), vec![m4a()], stt)
            .transcribe(&reference())
            .await
            .unwrap_err();

        assert_eq!(err, AudioFallbackError::NoSpeech);
        assert!(dir_is_empty(temp_dir.path()));
    }
}
