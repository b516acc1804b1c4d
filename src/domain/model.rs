use std::fmt;
use std::path::PathBuf;

pub const AUDIO_ONLY_LABEL: &str = "Audio only";
pub const DEFAULT_LABEL: &str = "Default";
pub const PLACEHOLDER_LABEL: &str = "Select URL first";

/// What the user picked in the quality dropdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    /// Best video no taller than the given height, merged with best audio.
    Height(u32),
    /// Best audio stream, transcoded to the configured audio format.
    AudioOnly,
    /// Let the extractor pick.
    Default,
}

impl Quality {
    /// Parse a dropdown label such as `"720p"` or `"Audio only"`.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        if label == AUDIO_ONLY_LABEL {
            return Quality::AudioOnly;
        }

        label
            .strip_suffix('p')
            .and_then(|h| h.parse::<u32>().ok())
            .map(Quality::Height)
            .unwrap_or(Quality::Default)
    }

    pub fn is_audio_only(&self) -> bool {
        matches!(self, Quality::AudioOnly)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Height(h) => write!(f, "{}p", h),
            Quality::AudioOnly => f.write_str(AUDIO_ONLY_LABEL),
            Quality::Default => f.write_str(DEFAULT_LABEL),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub quality: Quality,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    Idle,
    Downloading,
    Canceling,
    Completed,
    Canceled,
    Failed,
}

impl DownloadPhase {
    pub fn is_active(&self) -> bool {
        matches!(self, DownloadPhase::Downloading | DownloadPhase::Canceling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_from_label() {
        assert_eq!(Quality::from_label("720p"), Quality::Height(720));
        assert_eq!(Quality::from_label(" 1080p "), Quality::Height(1080));
        assert_eq!(Quality::from_label("Audio only"), Quality::AudioOnly);
        assert_eq!(Quality::from_label("Default"), Quality::Default);
        assert_eq!(Quality::from_label("Select URL first"), Quality::Default);
        assert_eq!(Quality::from_label("p"), Quality::Default);
    }

    #[test]
    fn test_quality_label_matches_dropdown() {
        assert_eq!(Quality::Height(480).to_string(), "480p");
        assert_eq!(Quality::AudioOnly.to_string(), AUDIO_ONLY_LABEL);
    }
}
