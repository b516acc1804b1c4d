pub mod desktop;

use std::path::{Path, PathBuf};

use regex::Regex;
use url::Url;

/// Sanitize filename to remove invalid characters
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            _ => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Trim whitespace and drop everything from the first `&`, which strips
/// playlist and timestamp parameters from watch URLs.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed.split('&').next().unwrap_or(trimmed).to_string()
}

/// Whether a URL typed so far is worth probing for formats.
pub fn is_probe_candidate(raw: &str) -> bool {
    let trimmed = raw.trim();
    if !trimmed.starts_with("http") {
        return false;
    }

    Url::parse(trimmed)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

/// Delete the unfinished fragments belonging to `target`: `<stem>.<ext>.part`
/// and the `<stem>.f<format>.<ext>.part` / `.ytdl` siblings left behind by
/// format merging. Files of a longer title (`<stem>.2.mp4.part`) are kept.
///
/// Returns the files that were removed. A missing directory is not an error.
pub async fn remove_partial_files(target: &Path) -> std::io::Result<Vec<PathBuf>> {
    let Some(stem) = target.file_stem().and_then(|s| s.to_str()) else {
        return Ok(Vec::new());
    };
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let pattern = Regex::new(&format!(
        r"^{}\.(?:f[0-9A-Za-z_-]+\.)?[0-9A-Za-z]+\.(?:part|ytdl)$",
        regex::escape(stem)
    ))
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let mut removed = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };

        if !pattern.is_match(name) {
            continue;
        }

        let path = entry.path();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => removed.push(path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("test/file.mp4"), "test_file.mp4");
        assert_eq!(sanitize_filename("normal-name.mp3"), "normal-name.mp3");
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("  https://www.youtube.com/watch?v=abc&list=xyz&t=10 "),
            "https://www.youtube.com/watch?v=abc"
        );
        assert_eq!(normalize_url("https://youtu.be/abc"), "https://youtu.be/abc");
    }

    #[test]
    fn test_is_probe_candidate() {
        assert!(is_probe_candidate("https://www.youtube.com/watch?v=abc"));
        assert!(is_probe_candidate(" http://example.com/video "));
        assert!(!is_probe_candidate("youtube.com/watch?v=abc"));
        assert!(!is_probe_candidate("https://"));
        assert!(!is_probe_candidate(""));
    }

    #[tokio::test]
    async fn test_remove_partial_files() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("Clip.mp4");

        for name in [
            "Clip.mp4.part",
            "Clip.f137.mp4.part",
            "Clip.f251.webm.ytdl",
            "Clip.mp4",
            "Other.mp4.part",
            "Clip.2.mp4.part",
            "Clip (live).mp4.part",
        ] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let removed = remove_partial_files(&target).await.unwrap();
        assert_eq!(removed.len(), 3);

        assert!(!dir.path().join("Clip.mp4.part").exists());
        assert!(!dir.path().join("Clip.f137.mp4.part").exists());
        assert!(!dir.path().join("Clip.f251.webm.ytdl").exists());
        assert!(dir.path().join("Clip.mp4").exists());
        assert!(dir.path().join("Other.mp4.part").exists());
        assert!(dir.path().join("Clip.2.mp4.part").exists());
        assert!(dir.path().join("Clip (live).mp4.part").exists());
    }

    #[tokio::test]
    async fn test_remove_partial_files_with_regex_characters_in_title() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("Clip (1) [x].mp4");
        std::fs::write(dir.path().join("Clip (1) [x].mp4.part"), b"x").unwrap();
        std::fs::write(dir.path().join("Clip (1) [x].f22.mp4.part"), b"x").unwrap();

        let removed = remove_partial_files(&target).await.unwrap();
        assert_eq!(removed.len(), 2);
    }

    #[tokio::test]
    async fn test_remove_partial_files_in_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("gone").join("Clip.mp4");
        assert!(remove_partial_files(&target).await.unwrap().is_empty());
    }
}
