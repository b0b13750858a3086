use std::path::Path;
use std::sync::LazyLock;

use anyhow::Context;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Result;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("valid URL regex"));

static VIDEO_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{6,}$").expect("valid video id regex"));

/// One video to process, as parsed from a line of the input list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoReference {
    /// Provider's opaque video identifier, empty when none could be derived
    pub id: String,

    /// Human title, used to name the output artifact
    pub title: String,

    /// URL exactly as found on the input line
    pub url: String,
}

impl VideoReference {
    pub fn new(id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: url.into(),
        }
    }

    /// A reference without an id or a title cannot be fetched nor named
    pub fn is_parseable(&self) -> bool {
        !self.id.is_empty() && !self.title.is_empty()
    }
}

/// Parse a `Title | URL` or bare `URL` line.
///
/// Never fails: a line without a recoverable video id produces a reference
/// whose `id` is empty, which the engine records as a parse error.
pub fn parse_line(line: &str) -> VideoReference {
    let raw = line.trim();

    let url = URL_RE
        .find(raw)
        .map(|m| m.as_str().trim_matches(|c| c == '\'' || c == '"').to_string())
        .unwrap_or_default();

    let id = extract_video_id(&url).unwrap_or_default();

    let title = match raw.split_once('|') {
        Some((before, _)) => before.trim().to_string(),
        None => {
            let rest = if url.is_empty() { raw.to_string() } else { raw.replace(&url, "") };
            let rest = rest.trim().trim_matches(|c| c == '\'' || c == '"').trim();
            if !rest.is_empty() {
                rest.to_string()
            } else if id.is_empty() {
                "Untitled".to_string()
            } else {
                // Bare URLs still need distinct artifact names
                format!("Untitled_{id}")
            }
        }
    };

    VideoReference { id, title, url }
}

/// Pull the video id out of the common YouTube URL shapes
pub fn extract_video_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.trim_start_matches("www.").trim_start_matches("m.");

    let candidate = if host == "youtu.be" {
        parsed.path_segments()?.next().map(str::to_string)
    } else if host.ends_with("youtube.com") || host.ends_with("youtube-nocookie.com") {
        let from_query = parsed
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned());

        from_query.or_else(|| {
            let mut segments = parsed.path_segments()?;
            match segments.next()? {
                "shorts" | "embed" | "live" | "v" => segments.next().map(str::to_string),
                _ => None,
            }
        })
    } else {
        None
    }?;

    VIDEO_ID_RE.is_match(&candidate).then_some(candidate)
}

/// Read a reference list: one entry per line, blank lines and `#` comments ignored
pub fn read_list(path: &Path) -> Result<Vec<String>> {
    let content = fs_err::read_to_string(path)
        .with_context(|| format!("Failed to read reference list {}", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_titled_line() {
        let reference = parse_line("Talk1 | https://youtu.be/abc123XYZ");
        assert_eq!(reference, VideoReference::new("abc123XYZ", "Talk1", "https://youtu.be/abc123XYZ"));
        assert!(reference.is_parseable());
    }

    #[test]
    fn test_parse_bare_url() {
        let reference = parse_line("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=10s");
        assert_eq!(reference.id, "dQw4w9WgXcQ");
        assert_eq!(reference.title, "Untitled_dQw4w9WgXcQ");
    }

    #[test]
    fn test_bare_urls_get_distinct_titles() {
        let first = parse_line("https://youtu.be/abc123XYZ");
        let second = parse_line("https://youtu.be/def456UVW");
        assert_ne!(first.title, second.title);

        let broken = parse_line("https://example.com/clip");
        assert_eq!(broken.title, "Untitled");
        assert!(!broken.is_parseable());
    }

    #[test]
    fn test_parse_title_without_pipe() {
        let reference = parse_line("My talk 'https://youtu.be/abcdefgh'");
        assert_eq!(reference.url, "https://youtu.be/abcdefgh");
        assert_eq!(reference.title, "My talk");
        assert_eq!(reference.id, "abcdefgh");
    }

    #[test]
    fn test_parse_without_url() {
        let reference = parse_line("Just a title | no link here");
        assert_eq!(reference.id, "");
        assert_eq!(reference.title, "Just a title");
        assert!(!reference.is_parseable());
    }

    #[test]
    fn test_parse_empty_title() {
        let reference = parse_line(" | https://youtu.be/abc123XYZ");
        assert_eq!(reference.id, "abc123XYZ");
        assert!(!reference.is_parseable());
    }

    #[test]
    fn test_extract_video_id_shapes() {
        assert_eq!(extract_video_id("https://youtu.be/abc123XYZ?si=x").as_deref(), Some("abc123XYZ"));
        assert_eq!(extract_video_id("https://m.youtube.com/watch?v=abc123XYZ").as_deref(), Some("abc123XYZ"));
        assert_eq!(extract_video_id("https://www.youtube.com/shorts/abc123XYZ").as_deref(), Some("abc123XYZ"));
        assert_eq!(extract_video_id("https://www.youtube.com/embed/abc123XYZ").as_deref(), Some("abc123XYZ"));
        assert_eq!(extract_video_id("https://www.youtube.com/live/abc123XYZ").as_deref(), Some("abc123XYZ"));
    }

    #[test]
    fn test_extract_video_id_rejects() {
        assert_eq!(extract_video_id("https://example.com/watch?v=abc123XYZ"), None);
        assert_eq!(extract_video_id("https://youtu.be/abc"), None);
        assert_eq!(extract_video_id("https://www.youtube.com/channel/UCxyz1234"), None);
        assert_eq!(extract_video_id("not a url"), None);
    }

    #[test]
    fn test_read_list_skips_blank_and_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.txt");
        fs_err::write(&path, "# header\n\nA | https://youtu.be/abc123XYZ\n   \nhttps://youtu.be/def456UVW\n").unwrap();

        let lines = read_list(&path).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "https://youtu.be/def456UVW");
    }
}
