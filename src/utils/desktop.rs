use std::path::{Path, PathBuf};

use tokio::process::Command;

use crate::domain::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealTarget {
    /// Select the file inside its folder (Explorer only).
    SelectFile(PathBuf),
    OpenFolder(PathBuf),
}

/// Decide what "Open Folder" should show. Only Explorer can highlight a file,
/// everywhere else the download folder is opened.
pub fn reveal_target(last_downloaded: Option<&Path>, folder: &Path, select_supported: bool) -> RevealTarget {
    match last_downloaded {
        Some(path) if select_supported && path.exists() => RevealTarget::SelectFile(path.to_path_buf()),
        _ => RevealTarget::OpenFolder(absolute(folder)),
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Show the last download (or the download folder) in the system file browser.
pub async fn reveal(last_downloaded: Option<PathBuf>, folder: PathBuf) -> Result<(), AppError> {
    let target = reveal_target(last_downloaded.as_deref(), &folder, cfg!(target_os = "windows"));
    tracing::debug!(?target, "opening file browser");

    let status = reveal_command(&target)
        .status()
        .await
        .map_err(|e| AppError::Io(format!("Failed to open folder: {}", e)))?;

    // Explorer reports a non-zero status even when it succeeds.
    if !status.success() && !cfg!(target_os = "windows") {
        return Err(AppError::Io(format!("File browser exited with {}", status)));
    }

    Ok(())
}

fn reveal_command(target: &RevealTarget) -> Command {
    match target {
        RevealTarget::SelectFile(path) => {
            // Separate arguments: a quoted "/select,<path>" is not understood
            let mut command = Command::new("explorer");
            command.arg("/select,").arg(path);
            command
        }
        RevealTarget::OpenFolder(path) => {
            let mut command = Command::new(folder_opener());
            command.arg(path);
            command
        }
    }
}

fn folder_opener() -> &'static str {
    if cfg!(target_os = "windows") {
        "explorer"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_existing_file_when_supported() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Clip.mp4");
        std::fs::write(&file, b"x").unwrap();

        assert_eq!(
            reveal_target(Some(file.as_path()), dir.path(), true),
            RevealTarget::SelectFile(file.clone())
        );
        assert!(matches!(
            reveal_target(Some(file.as_path()), dir.path(), false),
            RevealTarget::OpenFolder(_)
        ));
    }

    #[test]
    fn test_select_passes_path_as_its_own_argument() {
        let path = PathBuf::from("out").join("My Clip.mp4");
        let command = reveal_command(&RevealTarget::SelectFile(path.clone()));
        let args: Vec<_> = command.as_std().get_args().collect();

        assert_eq!(command.as_std().get_program(), "explorer");
        assert_eq!(args, vec![std::ffi::OsStr::new("/select,"), path.as_os_str()]);
    }

    #[test]
    fn test_missing_file_opens_absolute_folder() {
        let target = reveal_target(Some(Path::new("nope/Clip.mp4")), Path::new("youtube_output"), true);
        match target {
            RevealTarget::OpenFolder(path) => {
                assert!(path.is_absolute());
                assert!(path.ends_with("youtube_output"));
            }
            other => panic!("unexpected target: {:?}", other),
        }
    }
}
