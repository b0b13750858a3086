use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use super::{AudioSource, AudioStream};
use crate::Result;

/// Audio source backed by the `yt-dlp` program
pub struct YtDlp {
    yt_dlp_path: String,
}

impl YtDlp {
    pub fn new(yt_dlp_path: impl Into<String>) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.into(),
        }
    }

    /// Check if yt-dlp is available
    pub async fn check_availability(&self) -> bool {
        Command::new(&self.yt_dlp_path)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Get video information using yt-dlp
    async fn get_video_info(&self, url: &str) -> Result<Value> {
        tracing::debug!("Extracting video info for: {}", url);

        let output = Command::new(&self.yt_dlp_path)
            .args(["--dump-single-json", "--no-playlist", "--no-warnings", "--", url])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp failed: {}", error.trim());
        }

        let json_str = String::from_utf8(output.stdout)?;
        let info: Value = serde_json::from_str(&json_str)?;

        Ok(info)
    }
}

/// Audio-only entries of a yt-dlp `formats` array
pub fn audio_only_streams(info: &Value) -> Vec<AudioStream> {
    let Some(formats) = info["formats"].as_array() else {
        return Vec::new();
    };

    formats
        .iter()
        .filter(|format| {
            let acodec = format["acodec"].as_str().unwrap_or("none");
            let vcodec = format["vcodec"].as_str().unwrap_or("none");
            acodec != "none" && vcodec == "none"
        })
        .filter_map(|format| {
            Some(AudioStream {
                format_id: format["format_id"].as_str()?.to_string(),
                ext: format["ext"].as_str().unwrap_or_default().to_string(),
                abr: format["abr"].as_f64(),
                acodec: format["acodec"].as_str().map(str::to_string),
            })
        })
        .collect()
}

#[async_trait]
impl AudioSource for YtDlp {
    async fn list_streams(&self, url: &str) -> Result<Vec<AudioStream>> {
        let info = self.get_video_info(url).await?;
        Ok(audio_only_streams(&info))
    }

    async fn download(&self, url: &str, stream: &AudioStream, dir: &Path, stem: &str) -> Result<PathBuf> {
        tracing::debug!(format = %stream.format_id, ext = %stream.ext, "Downloading audio for: {}", url);

        let template = dir.join(format!("{stem}.%(ext)s"));
        let output = Command::new(&self.yt_dlp_path)
            .arg("--quiet")
            .arg("--no-warnings")
            .arg("--no-playlist")
            // Or else fails when a file from an earlier crash is present
            .arg("--no-continue")
            .args(["--format", &stream.format_id])
            .arg("--output")
            .arg(&template)
            .args(["--print", "after_move:filepath"])
            .arg("--")
            .arg(url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Failed to download audio: {}", error.trim());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let path = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| dir.join(format!("{stem}.{}", stream.ext)));

        if !path.exists() {
            anyhow::bail!("yt-dlp reported success but {} does not exist", path.display());
        }

        Ok(path)
    }
}
