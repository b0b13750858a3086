use std::io::Write;
use std::path::Path;

use anyhow::Context;

use crate::input::VideoReference;
use crate::Result;

/// Whether the artifact at `path` marks the reference as already acquired.
///
/// A zero-byte file is what a crash mid-write leaves behind and does not count.
pub fn is_done(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

/// Canonical artifact body: title, url, blank line, transcript
pub fn render_artifact(reference: &VideoReference, text: &str) -> String {
    format!("{}\n{}\n\n{}\n", reference.title, reference.url, text.trim())
}

/// Write the artifact for `reference`.
///
/// The content lands in a temporary file next to `path` and is renamed into
/// place, so a reader never observes a partial artifact. An existing
/// non-empty artifact is never replaced.
pub fn write_artifact(path: &Path, reference: &VideoReference, text: &str) -> Result<()> {
    if is_done(path) {
        anyhow::bail!("{} already exists", path.display());
    }

    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs_err::create_dir_all(dir)?;

    let mut file = tempfile::Builder::new()
        .prefix(".partial-")
        .suffix(".txt")
        .tempfile_in(dir)
        .with_context(|| format!("Failed to create a temporary file in {}", dir.display()))?;

    file.write_all(render_artifact(reference, text).as_bytes())?;
    file.as_file().sync_all()?;
    file.persist(path)
        .with_context(|| format!("Failed to move artifact into {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    fn reference() -> VideoReference {
        VideoReference::new("abc123XYZ", "Talk1", "https://youtu.be/abc123XYZ")
    }

    #[test]
    fn test_is_done() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("Talk1.txt");
        assert!(!is_done(&path));

        std::fs::write(&path, "").unwrap();
        assert!(!is_done(&path));

        std::fs::write(&path, "x").unwrap();
        assert!(is_done(&path));

        assert!(!is_done(temp_dir.path()));
    }

    #[test]
    fn test_write_artifact_format() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("t").join("Talk1.txt");

        assert_ok!(write_artifact(&path, &reference(), "  line one\nline two \n"));

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "Talk1\nhttps://youtu.be/abc123XYZ\n\nline one\nline two\n");

        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_zero_byte_artifact_is_replaced() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("Talk1.txt");
        std::fs::write(&path, "").unwrap();

        write_artifact(&path, &reference(), "text").unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().ends_with("\n\ntext\n"));
    }

    #[test]
    fn test_existing_artifact_is_kept() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("Talk1.txt");
        std::fs::write(&path, "earlier run").unwrap();

        assert_err!(write_artifact(&path, &reference(), "text"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "earlier run");
    }
}
