use std::path::{Path, PathBuf};

/// Longest file stem produced by [`safe_name`]
pub const MAX_NAME_LEN: usize = 80;

/// Longest full artifact path produced by [`clamp_path`]
pub const MAX_PATH_LEN: usize = 230;

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Turn a video title into a short, filesystem-safe file stem.
///
/// Whitespace runs become a single underscore, anything outside ASCII
/// alphanumerics, `_`, `-` and `.` is dropped, and the result is cut to
/// `max_len` characters. An empty result falls back to `"untitled"`.
pub fn safe_name(title: &str, max_len: usize) -> String {
    let mut name = String::with_capacity(title.len());
    let mut in_space = false;

    for c in title.trim().chars() {
        if c.is_whitespace() {
            if !in_space {
                name.push('_');
            }
            in_space = true;
            continue;
        }
        in_space = false;

        if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' {
            name.push(c);
        }
    }

    let name: String = name.chars().take(max_len).collect();
    if name.is_empty() {
        "untitled".to_string()
    } else {
        name
    }
}

/// Shorten the file stem until the whole path fits in `max_total` bytes.
///
/// The stem loses five characters per step and is never cut below ten
/// characters, so a very deep directory can still produce a long path.
pub fn clamp_path(path: PathBuf, max_total: usize) -> PathBuf {
    if path.as_os_str().len() <= max_total {
        return path;
    }

    let ext = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let mut stem: Vec<char> = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().chars().collect())
        .unwrap_or_default();

    let mut clamped = path;
    while clamped.as_os_str().len() > max_total && stem.len() > 10 {
        let keep = stem.len().saturating_sub(5).max(10);
        stem.truncate(keep);
        let name: String = stem.iter().collect();
        clamped.set_file_name(format!("{name}{ext}"));
    }

    clamped
}

/// Expected artifact location for a title inside the output directory
pub fn artifact_path(output_dir: &Path, title: &str) -> PathBuf {
    let file_name = format!("{}.txt", safe_name(title, MAX_NAME_LEN));
    clamp_path(output_dir.join(file_name), MAX_PATH_LEN)
}

/// Cut a diagnostic message to at most `max_chars` characters
pub fn truncate_chars(message: &str, max_chars: usize) -> String {
    message.chars().take(max_chars).collect()
}

/// Check if the current environment has the tools the audio fallback needs
pub async fn check_dependencies(yt_dlp: &str, ffmpeg: &str) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(yt_dlp).await {
        missing.push(format!("{yt_dlp} - required to download audio for the speech-to-text fallback"));
    }

    if !check_command_available(ffmpeg).await {
        missing.push(format!("{ffmpeg} - required to decode audio for the speech-to-text fallback"));
    }

    missing
}

/// ffmpeg only understands `-version`; yt-dlp accepts both spellings
fn version_flag(command: &str) -> &'static str {
    let stem = Path::new(command).file_stem().map(|stem| stem.to_string_lossy().to_ascii_lowercase());
    if stem.as_deref() == Some("ffmpeg") {
        "-version"
    } else {
        "--version"
    }
}

/// Check if a command is available in PATH
pub async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    let flag = version_flag(command);

    Command::new(command)
        .arg(flag)
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30.0), "30s");
        assert_eq!(format_duration(90.0), "1m 30s");
        assert_eq!(format_duration(3661.0), "1h 1m 1s");
    }

    #[test]
    fn test_version_flag() {
        assert_eq!(version_flag("ffmpeg"), "-version");
        assert_eq!(version_flag("ffmpeg.exe"), "-version");
        assert_eq!(version_flag("/opt/tools/FFMPEG.EXE"), "-version");
        assert_eq!(version_flag("/usr/local/bin/ffmpeg"), "-version");
        assert_eq!(version_flag("yt-dlp"), "--version");
        assert_eq!(version_flag("yt-dlp.exe"), "--version");
        assert_eq!(version_flag("not-ffmpeg"), "--version");
    }

    #[test]
    fn test_safe_name() {
        assert_eq!(safe_name("Talk1", MAX_NAME_LEN), "Talk1");
        assert_eq!(safe_name("  Hello   World! ", MAX_NAME_LEN), "Hello_World");
        assert_eq!(safe_name("a/b\\c:d?e", MAX_NAME_LEN), "abcde");
        assert_eq!(safe_name("v1.2 - final", MAX_NAME_LEN), "v1.2_-_final");
        assert_eq!(safe_name("???", MAX_NAME_LEN), "untitled");
        assert_eq!(safe_name("", MAX_NAME_LEN), "untitled");
    }

    #[test]
    fn test_safe_name_truncates() {
        let long = "x".repeat(200);
        assert_eq!(safe_name(&long, MAX_NAME_LEN).len(), MAX_NAME_LEN);
    }

    #[test]
    fn test_clamp_path_short_path_untouched() {
        let path = PathBuf::from("t/Talk1.txt");
        assert_eq!(clamp_path(path.clone(), MAX_PATH_LEN), path);
    }

    #[test]
    fn test_clamp_path_shortens_stem() {
        let dir = "d".repeat(40);
        let path = PathBuf::from(&dir).join(format!("{}.txt", "s".repeat(60)));
        let clamped = clamp_path(path, 70);

        assert!(clamped.as_os_str().len() <= 70);
        assert_eq!(clamped.extension().unwrap(), "txt");
        assert!(clamped.starts_with(&dir));
    }

    #[test]
    fn test_clamp_path_keeps_ten_chars() {
        let dir = "d".repeat(100);
        let path = PathBuf::from(&dir).join(format!("{}.txt", "s".repeat(40)));
        let clamped = clamp_path(path, 50);

        let stem = clamped.file_stem().unwrap().to_string_lossy().to_string();
        assert_eq!(stem.len(), 10);
    }

    #[test]
    fn test_artifact_path() {
        let path = artifact_path(Path::new("out"), "Talk1");
        assert_eq!(path, PathBuf::from("out/Talk1.txt"));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("héllo world", 5), "héllo");
        assert_eq!(truncate_chars("hi", 5), "hi");
    }
}
